use crate::aggregate::{MINUTES_PER_DAY, MIN_DATASET_DAYS};
use crate::models::{SweepPoint, SweepTotals};

pub const DAYS_PER_MONTH: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostInputs {
    pub dataset_days: f64,
    pub final_ptu_monthly_price: f64,
    pub input_price_per_1k: f64,
    pub output_price_per_1k: f64,
}

/// Multiplier that scales observed totals to a 30-day month.
pub fn monthly_factor(dataset_days: f64) -> f64 {
    DAYS_PER_MONTH / dataset_days.max(MIN_DATASET_DAYS)
}

pub fn normalize_to_month(tokens: u64, dataset_days: f64) -> f64 {
    tokens as f64 * monthly_factor(dataset_days)
}

pub fn aggregate_costs(totals: &SweepTotals, inputs: &CostInputs) -> SweepPoint {
    let days = inputs.dataset_days.max(MIN_DATASET_DAYS);

    let ptu_monthly_cost = inputs.final_ptu_monthly_price * f64::from(totals.num_units);
    let paygo_input = normalize_to_month(totals.overflow_input_tokens, days);
    let paygo_output = normalize_to_month(totals.overflow_output_tokens, days);
    let paygo_monthly_cost = paygo_input / 1000.0 * inputs.input_price_per_1k
        + paygo_output / 1000.0 * inputs.output_price_per_1k;

    let all_tokens = totals.total_tokens();
    let ptu_total_pct = if all_tokens == 0 {
        0.0
    } else {
        totals.reserved_tokens() as f64 / all_tokens as f64 * 100.0
    };

    // Capacity is available for the whole observed window, which covers at
    // least every minute that had demand.
    let window_minutes = (days * MINUTES_PER_DAY).max(totals.active_minutes as f64);
    let capacity = totals.ptu_capacity_tpm * window_minutes;
    let utilization_pct = if totals.num_units == 0 || capacity <= 0.0 {
        0.0
    } else {
        totals.reserved_weighted_tokens / capacity * 100.0
    };

    SweepPoint {
        num_units: totals.num_units,
        ptu_capacity_tpm: totals.ptu_capacity_tpm,
        ptu_input_tokens: totals.reserved_input_tokens,
        ptu_output_tokens: totals.reserved_output_tokens,
        paygo_input_tokens: totals.overflow_input_tokens,
        paygo_output_tokens: totals.overflow_output_tokens,
        ptu_total_pct,
        ptu_monthly_cost,
        paygo_monthly_cost,
        total_monthly_cost: ptu_monthly_cost + paygo_monthly_cost,
        utilization_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(days: f64) -> CostInputs {
        CostInputs {
            dataset_days: days,
            final_ptu_monthly_price: 221.0,
            input_price_per_1k: 0.002,
            output_price_per_1k: 0.008,
        }
    }

    #[test]
    fn ten_day_dataset_triples_to_a_month() {
        assert!((normalize_to_month(300_000, 10.0) - 900_000.0).abs() < 1e-6);

        let totals = SweepTotals {
            overflow_input_tokens: 300_000,
            active_minutes: 10,
            ..SweepTotals::default()
        };
        let point = aggregate_costs(&totals, &inputs(10.0));
        assert!((point.paygo_monthly_cost - 900.0 * 0.002).abs() < 1e-9);
        assert_eq!(point.ptu_monthly_cost, 0.0);
        assert_eq!(point.utilization_pct, 0.0);
    }

    #[test]
    fn ptu_cost_is_fixed_per_unit() {
        let totals = SweepTotals {
            num_units: 20,
            ptu_capacity_tpm: 20_000.0,
            active_minutes: 1,
            ..SweepTotals::default()
        };
        let point = aggregate_costs(&totals, &inputs(30.0));
        assert_eq!(point.ptu_monthly_cost, 4420.0);
        assert_eq!(point.paygo_monthly_cost, 0.0);
        assert_eq!(point.total_monthly_cost, 4420.0);
        assert_eq!(point.ptu_total_pct, 0.0);
    }

    #[test]
    fn single_saturated_minute_is_fully_utilized() {
        let totals = SweepTotals {
            num_units: 1,
            ptu_capacity_tpm: 1000.0,
            reserved_input_tokens: 1000,
            reserved_weighted_tokens: 1000.0,
            active_minutes: 1,
            ..SweepTotals::default()
        };
        let point = aggregate_costs(&totals, &inputs(MIN_DATASET_DAYS));
        assert!((point.utilization_pct - 100.0).abs() < 1e-6);
        assert_eq!(point.ptu_total_pct, 100.0);
    }

    #[test]
    fn zero_day_span_is_floored() {
        assert_eq!(monthly_factor(0.0), DAYS_PER_MONTH / MIN_DATASET_DAYS);
    }

    #[test]
    fn mixed_overflow_is_priced_per_direction() {
        let totals = SweepTotals {
            num_units: 2,
            ptu_capacity_tpm: 2000.0,
            reserved_input_tokens: 600,
            reserved_output_tokens: 400,
            overflow_input_tokens: 1_000,
            overflow_output_tokens: 2_000,
            reserved_weighted_tokens: 2_200.0,
            active_minutes: 2,
        };
        let point = aggregate_costs(&totals, &inputs(30.0));
        let expected_paygo = 1.0 * 0.002 + 2.0 * 0.008;
        assert!((point.paygo_monthly_cost - expected_paygo).abs() < 1e-12);
        assert!((point.total_monthly_cost - (442.0 + expected_paygo)).abs() < 1e-9);
        assert_eq!(point.ptu_total_pct, 25.0);
    }
}
