use crate::error::AppError;
use crate::pricing::DEFAULT_PTU_OPTION;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "ptu-sim";

pub fn normalize_model_name(model: &str) -> String {
    model.trim().to_ascii_lowercase()
}

fn app_home_dir() -> Result<PathBuf, AppError> {
    if let Ok(custom) = std::env::var("PTU_SIM_HOME") {
        return Ok(PathBuf::from(custom));
    }

    if let Some(dirs) = ProjectDirs::from("com", "ptu-sim", APP_NAME) {
        let candidate = dirs.data_local_dir().to_path_buf();
        if fs::create_dir_all(&candidate).is_ok() {
            return Ok(candidate);
        }
    }

    let cwd = std::env::current_dir()?;
    Ok(cwd.join(".ptu-sim"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub default_model: String,
    pub pricing_file: Option<PathBuf>,
    pub sweep: SweepDefaults,
    pub ptu_pricing: PtuPricingSettings,
    pub pricing_overrides: Vec<PricingOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SweepDefaults {
    pub min_units: u32,
    pub max_units: u32,
    pub step: u32,
    /// Falls back to the model family default when unset.
    pub capacity_tpm_per_unit: Option<f64>,
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PtuPricingSettings {
    pub option: String,
    pub base_monthly_usd: Option<f64>,
    pub discount_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingOverride {
    pub model: String,
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_model: "gpt-4.1".into(),
            pricing_file: None,
            sweep: SweepDefaults::default(),
            ptu_pricing: PtuPricingSettings::default(),
            pricing_overrides: vec![],
        }
    }
}

impl Default for SweepDefaults {
    fn default() -> Self {
        Self {
            min_units: 15,
            max_units: 100,
            step: 5,
            capacity_tpm_per_unit: None,
            workers: 1,
        }
    }
}

impl Default for PtuPricingSettings {
    fn default() -> Self {
        Self {
            option: DEFAULT_PTU_OPTION.into(),
            base_monthly_usd: None,
            discount_pct: 0.0,
        }
    }
}

pub fn config_dir() -> Result<PathBuf, AppError> {
    Ok(app_home_dir()?.join("config"))
}

pub fn config_path() -> Result<PathBuf, AppError> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn ensure_dirs() -> Result<(), AppError> {
    fs::create_dir_all(config_dir()?)?;
    Ok(())
}

fn normalize_config(config: &mut AppConfig) -> bool {
    let mut changed = false;

    let model = normalize_model_name(&config.default_model);
    if model != config.default_model {
        config.default_model = model;
        changed = true;
    }

    // Later overrides win for duplicate models.
    let mut overrides: Vec<PricingOverride> = Vec::new();
    for mut row in std::mem::take(&mut config.pricing_overrides) {
        let normalized = normalize_model_name(&row.model);
        if normalized != row.model {
            row.model = normalized;
            changed = true;
        }
        if let Some(existing) = overrides.iter_mut().find(|o| o.model == row.model) {
            *existing = row;
            changed = true;
        } else {
            overrides.push(row);
        }
    }
    config.pricing_overrides = overrides;

    let option = config.ptu_pricing.option.trim().to_ascii_lowercase();
    if option != config.ptu_pricing.option {
        config.ptu_pricing.option = option;
        changed = true;
    }

    changed
}

pub fn load_config() -> Result<AppConfig, AppError> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> Result<AppConfig, AppError> {
    let raw = fs::read_to_string(path)?;
    let mut parsed: AppConfig = toml::from_str(&raw)?;
    if normalize_config(&mut parsed) {
        tracing::info!(path = %path.display(), "rewriting normalized config");
        fs::write(path, toml::to_string_pretty(&parsed)?)?;
    }
    Ok(parsed)
}

pub fn save_config(config: &AppConfig) -> Result<(), AppError> {
    ensure_dirs()?;
    let path = config_path()?;
    let raw = toml::to_string_pretty(config)?;
    fs::write(path, raw)?;
    Ok(())
}

pub fn ensure_initialized() -> Result<(), AppError> {
    ensure_dirs()?;
    let cfg_path = config_path()?;
    if !Path::new(&cfg_path).exists() {
        save_config(&AppConfig::default())?;
    }
    Ok(())
}
