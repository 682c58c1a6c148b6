//! Batch completion heuristic
//!
//! Decides once per tick whether a batch is done: either every reply is in,
//! or the success count has stopped moving. A good enough count must hold
//! for a full window of samples; otherwise the batch waits out
//! `max_stagnant_ticks`. Stalled requests are abandoned.

use crate::config::{BenchConfig, STAGNATION_WINDOW};
use crate::connection::types::Termination;
use crate::connection::window::SuccessWindow;

#[derive(Debug, Clone)]
pub struct StagnationDetector {
    window: SuccessWindow,
    ticks: u32,
    batch_size: usize,
    max_stagnant_ticks: u32,
    success_ratio_threshold: f64,
}

impl StagnationDetector {
    pub fn new(config: &BenchConfig) -> Self {
        Self {
            window: SuccessWindow::with_capacity(STAGNATION_WINDOW),
            ticks: 0,
            batch_size: config.requests_per_connection,
            max_stagnant_ticks: config.max_stagnant_ticks,
            success_ratio_threshold: config.success_ratio_threshold,
        }
    }

    /// Start over for a new batch
    pub fn reset(&mut self) {
        self.window.clear();
        self.ticks = 0;
    }

    /// Evaluate one tick. The sample is recorded whatever the outcome.
    pub fn tick(&mut self, success_count: usize, all_complete: bool) -> Option<Termination> {
        self.ticks += 1;

        let verdict = if success_count == self.batch_size {
            Some(Termination::AllAcknowledged)
        } else if all_complete {
            Some(Termination::AllComplete)
        } else if self.is_stalled(success_count) {
            Some(Termination::Stagnated)
        } else {
            None
        };

        self.window.push(success_count);
        verdict
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn window(&self) -> &SuccessWindow {
        &self.window
    }

    /// Unchanged over a full window and above the ratio, or unchanged at the ceiling
    fn is_stalled(&self, success_count: usize) -> bool {
        if self.window.oldest() != Some(success_count) {
            return false;
        }
        let good_enough = self.window.is_full()
            && self.success_ratio(success_count) > self.success_ratio_threshold;
        good_enough || self.ticks >= self.max_stagnant_ticks
    }

    fn success_ratio(&self, success_count: usize) -> f64 {
        success_count as f64 / self.batch_size as f64
    }
}
