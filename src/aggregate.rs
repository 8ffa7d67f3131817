use crate::error::AppError;
use crate::models::{DatasetSummary, MinuteDemand, UsageRecord};
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use std::collections::BTreeMap;

pub const MINUTES_PER_DAY: f64 = 1440.0;

/// Shortest span a dataset is treated as covering, in days.
pub const MIN_DATASET_DAYS: f64 = 1.0 / MINUTES_PER_DAY;

#[derive(Default)]
struct MinuteAccumulator {
    input_tokens: u64,
    output_tokens: u64,
}

/// Sum of input and output tokens across the dataset. Every per-minute and
/// per-candidate total is bounded by this, so rejecting an overflow here keeps
/// all downstream sums in range.
pub fn token_total(records: &[UsageRecord]) -> Result<u64, AppError> {
    records.iter().try_fold(0u64, |acc, r| {
        acc.checked_add(r.input_tokens)
            .and_then(|acc| acc.checked_add(r.output_tokens))
            .ok_or_else(|| {
                AppError::InvalidInput(format!(
                    "token counts overflow at {}; dataset totals exceed {}",
                    r.timestamp,
                    u64::MAX
                ))
            })
    })
}

pub fn truncate_to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(TimeDelta::minutes(1)).unwrap_or(ts)
}

/// Collapses per-request records into one entry per distinct minute, ascending.
/// Minutes with no requests are absent rather than zero-filled.
pub fn minute_demand(records: &[UsageRecord], output_weight: f64) -> Vec<MinuteDemand> {
    let mut buckets: BTreeMap<DateTime<Utc>, MinuteAccumulator> = BTreeMap::new();
    for record in records {
        let acc = buckets.entry(truncate_to_minute(record.timestamp)).or_default();
        acc.input_tokens += record.input_tokens;
        acc.output_tokens += record.output_tokens;
    }

    buckets
        .into_iter()
        .map(|(minute, acc)| {
            MinuteDemand::new(minute, acc.input_tokens, acc.output_tokens, output_weight)
        })
        .collect()
}

/// Span between earliest and latest record in days, floored at one minute.
pub fn dataset_duration_days(records: &[UsageRecord]) -> f64 {
    let Some((first, last)) = timestamp_bounds(records) else {
        return MIN_DATASET_DAYS;
    };
    let seconds = (last - first).num_milliseconds() as f64 / 1000.0;
    (seconds / 86_400.0).max(MIN_DATASET_DAYS)
}

fn timestamp_bounds(records: &[UsageRecord]) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let first = records.iter().map(|r| r.timestamp).min()?;
    let last = records.iter().map(|r| r.timestamp).max()?;
    Some((first, last))
}

pub fn summarize(
    records: &[UsageRecord],
    series: &[MinuteDemand],
) -> Result<DatasetSummary, AppError> {
    let (first_timestamp, last_timestamp) =
        timestamp_bounds(records).ok_or(AppError::EmptyDataset)?;
    if series.is_empty() {
        return Err(AppError::EmptyDataset);
    }

    let total_input_tokens = series.iter().map(|m| m.input_tokens).sum();
    let total_output_tokens = series.iter().map(|m| m.output_tokens).sum();
    let peak_tpm = series.iter().map(|m| m.tokens_per_minute).max().unwrap_or(0);
    let tpm_sum: u64 = series.iter().map(|m| m.tokens_per_minute).sum();

    Ok(DatasetSummary {
        total_requests: records.len(),
        total_input_tokens,
        total_output_tokens,
        peak_tpm,
        average_tpm: tpm_sum as f64 / series.len() as f64,
        dataset_days: dataset_duration_days(records),
        first_timestamp,
        last_timestamp,
    })
}
