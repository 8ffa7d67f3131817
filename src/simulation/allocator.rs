use crate::error::AppError;
use crate::models::{AllocationResult, CapacityConfig, MinuteDemand};

fn validate_capacity(capacity_tpm_per_unit: f64) -> Result<(), AppError> {
    if !capacity_tpm_per_unit.is_finite() || capacity_tpm_per_unit <= 0.0 {
        return Err(AppError::InvalidConfiguration(format!(
            "PTU capacity must be a positive number of tokens per minute, got {capacity_tpm_per_unit}"
        )));
    }
    Ok(())
}

fn validate_output_weight(output_weight: f64) -> Result<(), AppError> {
    if !output_weight.is_finite() || output_weight <= 0.0 {
        return Err(AppError::InvalidConfiguration(format!(
            "output weight must be a positive ratio, got {output_weight}"
        )));
    }
    Ok(())
}

impl CapacityConfig {
    pub fn new(
        capacity_tpm_per_unit: f64,
        num_units: u32,
        output_weight: f64,
    ) -> Result<Self, AppError> {
        validate_capacity(capacity_tpm_per_unit)?;
        validate_output_weight(output_weight)?;
        Ok(Self {
            capacity_tpm_per_unit,
            num_units,
            output_weight,
        })
    }
}

/// Splits one minute of demand between reserved capacity and PAYGO.
///
/// Input tokens draw on the budget first at 1:1; whatever is left covers
/// output tokens at `output_weight` budget per token. The budget is whole
/// tokens so reserved weighted consumption never exceeds it.
pub fn allocate(demand: &MinuteDemand, cfg: &CapacityConfig) -> AllocationResult {
    let input = demand.input_tokens;
    let output = demand.output_tokens;
    let budget = cfg.budget().floor();

    if budget < 1.0 || (input == 0 && output == 0) {
        return AllocationResult {
            reserved_input_tokens: 0,
            reserved_output_tokens: 0,
            overflow_input_tokens: input,
            overflow_output_tokens: output,
        };
    }

    // f64 -> u64 casts saturate
    let budget_tokens = budget as u64;
    let reserved_input = input.min(budget_tokens);
    let remaining = budget_tokens - reserved_input;
    let coverable = (remaining as f64 / cfg.output_weight).floor() as u64;
    let reserved_output = output.min(coverable);

    AllocationResult {
        reserved_input_tokens: reserved_input,
        reserved_output_tokens: reserved_output,
        overflow_input_tokens: input - reserved_input,
        overflow_output_tokens: output - reserved_output,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn demand(input: u64, output: u64, weight: f64) -> MinuteDemand {
        MinuteDemand::new(
            Utc.with_ymd_and_hms(2025, 8, 18, 0, 0, 0).unwrap(),
            input,
            output,
            weight,
        )
    }

    fn capacity(per_unit: f64, units: u32, weight: f64) -> CapacityConfig {
        CapacityConfig::new(per_unit, units, weight).expect("valid capacity")
    }

    #[test]
    fn input_only_minute_fills_single_unit() {
        let alloc = allocate(&demand(1000, 0, 1.0), &capacity(1000.0, 1, 1.0));
        assert_eq!(alloc.reserved_input_tokens, 1000);
        assert_eq!(alloc.overflow_input_tokens, 0);
        assert_eq!(alloc.reserved_output_tokens, 0);
        assert_eq!(alloc.overflow_output_tokens, 0);
    }

    #[test]
    fn remaining_budget_covers_weighted_output() {
        let alloc = allocate(&demand(500, 1000, 2.0), &capacity(1000.0, 1, 2.0));
        assert_eq!(alloc.reserved_input_tokens, 500);
        assert_eq!(alloc.overflow_input_tokens, 0);
        assert_eq!(alloc.reserved_output_tokens, 250);
        assert_eq!(alloc.overflow_output_tokens, 750);
    }

    #[test]
    fn input_is_served_before_output() {
        let alloc = allocate(&demand(3000, 400, 4.0), &capacity(1000.0, 2, 4.0));
        assert_eq!(alloc.reserved_input_tokens, 2000);
        assert_eq!(alloc.reserved_output_tokens, 0);
        assert_eq!(alloc.overflow_input_tokens, 1000);
        assert_eq!(alloc.overflow_output_tokens, 400);
    }

    #[test]
    fn zero_units_sends_everything_to_paygo() {
        let alloc = allocate(&demand(700, 300, 3.0), &capacity(3000.0, 0, 3.0));
        assert_eq!(alloc.reserved_input_tokens, 0);
        assert_eq!(alloc.reserved_output_tokens, 0);
        assert_eq!(alloc.overflow_input_tokens, 700);
        assert_eq!(alloc.overflow_output_tokens, 300);
    }

    #[test]
    fn zero_demand_minute_contributes_nothing() {
        let alloc = allocate(&demand(0, 0, 1.0), &capacity(1000.0, 5, 1.0));
        assert_eq!(alloc, AllocationResult::default());
    }

    #[test]
    fn non_positive_capacity_is_rejected() {
        for bad in [0.0, -10.0, f64::NAN] {
            let err = CapacityConfig::new(bad, 1, 1.0).expect_err("bad capacity");
            assert!(matches!(err, AppError::InvalidConfiguration(_)));
        }
    }

    #[test]
    fn non_positive_output_weight_is_rejected() {
        let err = CapacityConfig::new(1000.0, 1, 0.0).expect_err("bad weight");
        assert!(err.to_string().contains("output weight"));
    }

    #[test]
    fn conservation_and_capacity_hold_across_grid() {
        let weights = [0.5, 1.0, 3.0, 4.0, 7.5];
        let demands = [(0, 900), (250, 250), (999, 1), (5000, 5000), (123, 4567)];
        for &w in &weights {
            for &(input, output) in &demands {
                for units in 0..6 {
                    let d = demand(input, output, w);
                    let alloc = allocate(&d, &capacity(777.0, units, w));
                    assert_eq!(alloc.reserved_input_tokens + alloc.overflow_input_tokens, input);
                    assert_eq!(alloc.reserved_output_tokens + alloc.overflow_output_tokens, output);

                    let budget = 777.0 * f64::from(units);
                    let used = alloc.weighted_reserved(w);
                    assert!(used <= budget * (1.0 + 1e-9), "used {used} > budget {budget}");
                }
            }
        }
    }
}
