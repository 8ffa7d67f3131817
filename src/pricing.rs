use crate::config::{normalize_model_name, PricingOverride};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelPricing {
    pub model: String,
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl ModelPricing {
    /// Capacity cost of one output token relative to one input token.
    pub fn output_weight(&self) -> Result<f64, AppError> {
        price_ratio(self.input_per_1k, self.output_per_1k).map_err(|_| {
            AppError::InvalidConfiguration(format!(
                "input price for '{}' must be positive to derive an output weight",
                self.model
            ))
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PriceEntry {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

/// Pricing file layout: `{"gpt-4.1": {"input_per_1k": 0.002, "output_per_1k": 0.008}}`.
pub type PricingFile = BTreeMap<String, PriceEntry>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PtuPriceOption {
    pub key: &'static str,
    pub label: &'static str,
    pub monthly_usd: f64,
}

pub const DEFAULT_PTU_OPTION: &str = "yearly";

pub const PTU_PRICE_OPTIONS: [PtuPriceOption; 6] = [
    PtuPriceOption {
        key: "monthly",
        label: "Monthly Reservation",
        monthly_usd: 260.0,
    },
    PtuPriceOption {
        key: "yearly",
        label: "Yearly Reservation",
        monthly_usd: 221.0,
    },
    PtuPriceOption {
        key: "hourly-global",
        label: "Hourly - Global ($1/Hour)",
        monthly_usd: 730.0,
    },
    PtuPriceOption {
        key: "hourly-data-zone",
        label: "Hourly - Data Zone ($1.1/Hour)",
        monthly_usd: 803.0,
    },
    PtuPriceOption {
        key: "hourly-regional",
        label: "Hourly - Regional ($2/Hour)",
        monthly_usd: 1461.0,
    },
    PtuPriceOption {
        key: "monthly-commitment",
        label: "Monthly Commitment (Deprecated)",
        monthly_usd: 312.0,
    },
];

pub fn built_in_pricing() -> Vec<ModelPricing> {
    [
        ("gpt-4.1", 0.002, 0.008),
        ("gpt-4.1-mini", 0.0004, 0.0016),
        ("gpt-4.1-nano", 0.0001, 0.0004),
        ("gpt-4o", 0.0025, 0.01),
        ("gpt-4o-mini", 0.00015, 0.0006),
        ("o3-mini", 0.0011, 0.0044),
        ("o4-mini", 0.0011, 0.0044),
    ]
    .into_iter()
    .map(|(model, input_per_1k, output_per_1k)| ModelPricing {
        model: model.into(),
        input_per_1k,
        output_per_1k,
    })
    .collect()
}

pub fn load_pricing_file(path: &Path) -> Result<PricingFile, AppError> {
    let raw = fs::read_to_string(path)?;
    let parsed: PricingFile = serde_json::from_str(&raw)?;
    Ok(parsed
        .into_iter()
        .map(|(model, entry)| (normalize_model_name(&model), entry))
        .collect())
}

/// Looks a model up in config overrides, then the pricing file, then the
/// built-in table.
pub fn resolve_pricing(
    model: &str,
    overrides: &[PricingOverride],
    file: Option<&PricingFile>,
) -> Result<ModelPricing, AppError> {
    let model = normalize_model_name(model);

    let found = if let Some(ov) = overrides.iter().find(|ov| ov.model == model) {
        Some(ModelPricing {
            model: model.clone(),
            input_per_1k: ov.input_per_1k,
            output_per_1k: ov.output_per_1k,
        })
    } else if let Some(entry) = file.and_then(|f| f.get(&model)) {
        Some(ModelPricing {
            model: model.clone(),
            input_per_1k: entry.input_per_1k,
            output_per_1k: entry.output_per_1k,
        })
    } else {
        built_in_pricing().into_iter().find(|p| p.model == model)
    };

    let pricing = found.ok_or_else(|| AppError::PricingNotFound(model.clone()))?;
    validate_prices(&pricing)?;
    Ok(pricing)
}

/// Every model known to the given sources, sorted by name.
pub fn known_models(
    overrides: &[PricingOverride],
    file: Option<&PricingFile>,
) -> Vec<ModelPricing> {
    let mut all: BTreeMap<String, ModelPricing> = built_in_pricing()
        .into_iter()
        .map(|p| (p.model.clone(), p))
        .collect();
    if let Some(file) = file {
        for (model, entry) in file {
            all.insert(
                model.clone(),
                ModelPricing {
                    model: model.clone(),
                    input_per_1k: entry.input_per_1k,
                    output_per_1k: entry.output_per_1k,
                },
            );
        }
    }
    for ov in overrides {
        all.insert(
            ov.model.clone(),
            ModelPricing {
                model: ov.model.clone(),
                input_per_1k: ov.input_per_1k,
                output_per_1k: ov.output_per_1k,
            },
        );
    }
    all.into_values().collect()
}

fn validate_prices(pricing: &ModelPricing) -> Result<(), AppError> {
    let positive = |v: f64| v.is_finite() && v > 0.0;
    if !positive(pricing.input_per_1k) || !positive(pricing.output_per_1k) {
        return Err(AppError::InvalidConfiguration(format!(
            "prices for '{}' must be positive (input {}, output {})",
            pricing.model, pricing.input_per_1k, pricing.output_per_1k
        )));
    }
    Ok(())
}

pub fn price_ratio(input_per_1k: f64, output_per_1k: f64) -> Result<f64, AppError> {
    if !input_per_1k.is_finite() || input_per_1k <= 0.0 {
        return Err(AppError::InvalidConfiguration(
            "input price must be positive to derive an output weight".into(),
        ));
    }
    Ok(output_per_1k / input_per_1k)
}

pub fn ptu_price_option(key: &str) -> Result<PtuPriceOption, AppError> {
    let key = key.trim().to_ascii_lowercase();
    PTU_PRICE_OPTIONS
        .iter()
        .copied()
        .find(|o| o.key == key)
        .ok_or_else(|| {
            let known: Vec<&str> = PTU_PRICE_OPTIONS.iter().map(|o| o.key).collect();
            AppError::InvalidConfiguration(format!(
                "Unknown PTU pricing option '{key}'. Use one of: {}",
                known.join(", ")
            ))
        })
}

/// Final monthly price per PTU after a percentage discount, rounded to cents.
pub fn final_ptu_price(base_monthly_usd: f64, discount_pct: f64) -> Result<f64, AppError> {
    if !base_monthly_usd.is_finite() || base_monthly_usd < 0.0 {
        return Err(AppError::InvalidConfiguration(format!(
            "PTU monthly price must be >= 0, got {base_monthly_usd}"
        )));
    }
    if !(0.0..=100.0).contains(&discount_pct) {
        return Err(AppError::InvalidConfiguration(format!(
            "PTU discount must be between 0 and 100 percent, got {discount_pct}"
        )));
    }
    let price = base_monthly_usd * (1.0 - discount_pct / 100.0);
    Ok((price * 100.0).round() / 100.0)
}

/// Per-unit TPM used when none is configured: 3000 for the gpt-4 family,
/// 1000 otherwise.
pub fn default_capacity_tpm(model: &str) -> f64 {
    if normalize_model_name(model).contains("gpt-4") {
        3000.0
    } else {
        1000.0
    }
}
