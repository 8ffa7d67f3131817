use super::allocator::allocate;
use super::{SweepObserver, SweepRun};
use crate::error::AppError;
use crate::models::{CapacityConfig, MinuteDemand, SweepTotals};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

/// Largest PTU count a sweep may request.
pub const MAX_UNITS: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepConfig {
    pub min_units: u32,
    pub max_units: u32,
    pub step: u32,
    pub capacity_tpm_per_unit: f64,
    pub output_weight: f64,
    pub workers: usize,
}

impl SweepConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_units < self.min_units {
            return Err(AppError::InvalidConfiguration(format!(
                "max PTU count ({}) must be >= min PTU count ({})",
                self.max_units, self.min_units
            )));
        }
        if self.max_units > MAX_UNITS {
            return Err(AppError::InvalidConfiguration(format!(
                "max PTU count ({}) must be <= {MAX_UNITS}",
                self.max_units
            )));
        }
        if self.step == 0 {
            return Err(AppError::InvalidConfiguration(
                "PTU step must be at least 1".into(),
            ));
        }
        if self.workers == 0 {
            return Err(AppError::InvalidConfiguration(
                "worker count must be at least 1".into(),
            ));
        }
        CapacityConfig::new(self.capacity_tpm_per_unit, 0, self.output_weight).map(|_| ())
    }

    fn capacity(&self, num_units: u32) -> CapacityConfig {
        CapacityConfig {
            capacity_tpm_per_unit: self.capacity_tpm_per_unit,
            num_units,
            output_weight: self.output_weight,
        }
    }

    /// Unit counts to simulate: the PAYGO baseline, then `min..=max` by
    /// `step`, with `max` appended when the step skips over it.
    pub fn candidates(&self) -> Vec<u32> {
        let mut out = vec![0];
        let mut units = self.min_units;
        loop {
            if units != 0 {
                out.push(units);
            }
            match units.checked_add(self.step) {
                Some(next) if next <= self.max_units => units = next,
                _ => break,
            }
        }
        if out.last() != Some(&self.max_units) && self.max_units != 0 {
            out.push(self.max_units);
        }
        out
    }
}

/// Replays the whole minute series against one unit count.
pub fn evaluate_candidate(series: &[MinuteDemand], cfg: &CapacityConfig) -> SweepTotals {
    let mut totals = SweepTotals {
        num_units: cfg.num_units,
        ptu_capacity_tpm: cfg.budget(),
        active_minutes: series.len() as u64,
        ..SweepTotals::default()
    };
    for minute in series {
        totals.add(&allocate(minute, cfg), cfg.output_weight);
    }
    totals
}

pub fn sweep(
    series: &[MinuteDemand],
    config: &SweepConfig,
    observer: &dyn SweepObserver,
) -> Result<SweepRun, AppError> {
    config.validate()?;
    if series.is_empty() {
        return Err(AppError::EmptyDataset);
    }

    let candidates = config.candidates();
    tracing::info!(
        candidates = candidates.len(),
        minutes = series.len(),
        workers = config.workers,
        "running PTU sweep"
    );

    let slots = if config.workers > 1 && candidates.len() > 1 {
        run_parallel(series, &candidates, config, observer)
    } else {
        run_sequential(series, &candidates, config, observer)
    };

    let aborted = slots.iter().any(Option::is_none);
    if aborted {
        tracing::warn!(
            completed = slots.iter().filter(|s| s.is_some()).count(),
            requested = candidates.len(),
            "sweep stopped early"
        );
    }

    Ok(SweepRun {
        totals: slots.into_iter().flatten().collect(),
        aborted,
    })
}

fn report_progress(observer: &dyn SweepObserver, completed: usize, total: usize, units: u32) {
    tracing::debug!(units, completed, total, "candidate finished");
    observer.on_progress(completed as f64 / total as f64);
    observer.on_status(&format!("Simulated {units} PTUs ({completed}/{total})"));
}

fn run_sequential(
    series: &[MinuteDemand],
    candidates: &[u32],
    config: &SweepConfig,
    observer: &dyn SweepObserver,
) -> Vec<Option<SweepTotals>> {
    let mut slots = vec![None; candidates.len()];
    for (idx, &units) in candidates.iter().enumerate() {
        if observer.should_stop() {
            break;
        }
        slots[idx] = Some(evaluate_candidate(series, &config.capacity(units)));
        report_progress(observer, idx + 1, candidates.len(), units);
    }
    slots
}

fn run_parallel(
    series: &[MinuteDemand],
    candidates: &[u32],
    config: &SweepConfig,
    observer: &dyn SweepObserver,
) -> Vec<Option<SweepTotals>> {
    let next = AtomicUsize::new(0);
    let completed = AtomicUsize::new(0);
    let stop = AtomicBool::new(false);
    let workers = config.workers.min(candidates.len());
    let mut slots = vec![None; candidates.len()];

    thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(|| {
                    let mut done = Vec::new();
                    loop {
                        if stop.load(Ordering::Relaxed) || observer.should_stop() {
                            stop.store(true, Ordering::Relaxed);
                            break;
                        }
                        let idx = next.fetch_add(1, Ordering::Relaxed);
                        let Some(&units) = candidates.get(idx) else {
                            break;
                        };
                        let totals = evaluate_candidate(series, &config.capacity(units));
                        let finished = completed.fetch_add(1, Ordering::AcqRel) + 1;
                        report_progress(observer, finished, candidates.len(), units);
                        done.push((idx, totals));
                    }
                    done
                })
            })
            .collect();

        for handle in handles {
            match handle.join() {
                Ok(done) => {
                    for (idx, totals) in done {
                        slots[idx] = Some(totals);
                    }
                }
                Err(payload) => std::panic::resume_unwind(payload),
            }
        }
    });

    slots
}
