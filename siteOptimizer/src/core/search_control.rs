use std::time::{Duration, Instant};
use crate::models::optimization_result::SearchPhase;

/// Wall-clock budget checked at iteration boundaries.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    pub fn after(limit: Duration) -> Self {
        Self { start: Instant::now(), limit: Some(limit) }
    }

    pub fn never() -> Self {
        Self { start: Instant::now(), limit: None }
    }

    pub fn expired(&self) -> bool {
        match self.limit {
            Some(limit) => self.start.elapsed() >= limit,
            None => false,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// The earlier of this deadline and one `limit` from now.
    pub fn capped(&self, limit: Duration) -> Self {
        let nested = Self::after(limit);
        match self.remaining() {
            Some(remaining) if remaining < limit => Self { start: nested.start, limit: Some(remaining) },
            _ => nested,
        }
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.limit.map(|limit| limit.saturating_sub(self.start.elapsed()))
    }
}

/// Progress snapshot handed to a yield point.
#[derive(Debug, Clone, Copy)]
pub struct SearchProgress {
    pub phase: SearchPhase,
    pub iteration: usize,
    pub objective: f64,
}

/// Cooperative suspension point invoked between search iterations.
///
/// Hosts use it to drive progress reporting or to interleave their own work. It never
/// receives the search state, only a snapshot.
pub trait YieldPoint {
    fn on_iteration(&mut self, progress: SearchProgress);
}

/// Yield point that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoYield;

impl YieldPoint for NoYield {
    fn on_iteration(&mut self, _progress: SearchProgress) {}
}

impl<F: FnMut(SearchProgress)> YieldPoint for F {
    fn on_iteration(&mut self, progress: SearchProgress) {
        self(progress)
    }
}

/// Yield point backed by an `indicatif` progress bar.
pub struct ProgressYield {
    bar: indicatif::ProgressBar,
}

impl ProgressYield {
    pub fn new(bar: indicatif::ProgressBar) -> Self {
        Self { bar }
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

impl YieldPoint for ProgressYield {
    fn on_iteration(&mut self, progress: SearchProgress) {
        self.bar.inc(1);
        self.bar.set_message(format!("{} demand={:.1}", progress.phase, progress.objective));
    }
}
