use crate::models::SweepTotals;

pub mod allocator;
pub mod cost;
pub mod sweep;

/// Receives progress while a sweep runs. Every method defaults to a no-op,
/// and nothing an observer does can change the computed totals.
pub trait SweepObserver: Sync {
    fn on_progress(&self, _fraction: f64) {}

    fn on_status(&self, _message: &str) {}

    /// Checked before each candidate starts; returning true ends the sweep
    /// with whatever has completed.
    fn should_stop(&self) -> bool {
        false
    }
}

pub struct NoopObserver;

impl SweepObserver for NoopObserver {}

#[derive(Debug, Clone)]
pub struct SweepRun {
    /// Completed candidates ordered by unit count, baseline first.
    pub totals: Vec<SweepTotals>,
    pub aborted: bool,
}
