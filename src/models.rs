use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub timestamp: DateTime<Utc>,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Token demand observed within one wall-clock minute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MinuteDemand {
    pub minute: DateTime<Utc>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub tokens_per_minute: u64,
    pub weighted_tpm: f64,
}

impl MinuteDemand {
    pub fn new(
        minute: DateTime<Utc>,
        input_tokens: u64,
        output_tokens: u64,
        output_weight: f64,
    ) -> Self {
        Self {
            minute,
            input_tokens,
            output_tokens,
            tokens_per_minute: input_tokens + output_tokens,
            weighted_tpm: input_tokens as f64 + output_weight * output_tokens as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapacityConfig {
    pub capacity_tpm_per_unit: f64,
    pub num_units: u32,
    pub output_weight: f64,
}

impl CapacityConfig {
    /// Pooled per-minute budget in input-token equivalents.
    pub fn budget(&self) -> f64 {
        self.capacity_tpm_per_unit * f64::from(self.num_units)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationResult {
    pub reserved_input_tokens: u64,
    pub reserved_output_tokens: u64,
    pub overflow_input_tokens: u64,
    pub overflow_output_tokens: u64,
}

impl AllocationResult {
    pub fn weighted_reserved(&self, output_weight: f64) -> f64 {
        self.reserved_input_tokens as f64 + output_weight * self.reserved_output_tokens as f64
    }
}

/// Raw per-candidate totals produced by the sweep engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SweepTotals {
    pub num_units: u32,
    pub ptu_capacity_tpm: f64,
    pub reserved_input_tokens: u64,
    pub reserved_output_tokens: u64,
    pub overflow_input_tokens: u64,
    pub overflow_output_tokens: u64,
    pub reserved_weighted_tokens: f64,
    pub active_minutes: u64,
}

impl SweepTotals {
    pub fn add(&mut self, alloc: &AllocationResult, output_weight: f64) {
        self.reserved_input_tokens += alloc.reserved_input_tokens;
        self.reserved_output_tokens += alloc.reserved_output_tokens;
        self.overflow_input_tokens += alloc.overflow_input_tokens;
        self.overflow_output_tokens += alloc.overflow_output_tokens;
        self.reserved_weighted_tokens += alloc.weighted_reserved(output_weight);
    }

    pub fn reserved_tokens(&self) -> u64 {
        self.reserved_input_tokens + self.reserved_output_tokens
    }

    pub fn total_tokens(&self) -> u64 {
        self.reserved_tokens() + self.overflow_input_tokens + self.overflow_output_tokens
    }
}

/// One row of the sweep with its monthly cost figures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SweepPoint {
    pub num_units: u32,
    pub ptu_capacity_tpm: f64,
    pub ptu_input_tokens: u64,
    pub ptu_output_tokens: u64,
    pub paygo_input_tokens: u64,
    pub paygo_output_tokens: u64,
    pub ptu_total_pct: f64,
    pub ptu_monthly_cost: f64,
    pub paygo_monthly_cost: f64,
    pub total_monthly_cost: f64,
    pub utilization_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub total_requests: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub peak_tpm: u64,
    pub average_tpm: f64,
    pub dataset_days: f64,
    pub first_timestamp: DateTime<Utc>,
    pub last_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub num_units: u32,
    pub ptu_total_pct: f64,
    pub total_monthly_cost: f64,
    pub paygo_only_cost: f64,
    pub cost_diff_pct: Option<f64>,
}
