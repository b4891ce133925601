//! Bounded generate/verify loop bookkeeping
//!
//! The tracker only sees valid counts and completeness, so the stop rules can
//! be exercised with synthetic reports.

use crate::verify::CompletionReport;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassOutcome {
    Success,
    ExhaustedRetries,
    Stalled,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassDecision {
    Continue,
    Stop(PassOutcome),
}

#[derive(Debug, Clone)]
pub struct PassTracker {
    max_passes: u32,
    valid_counts: Vec<usize>,
}

impl PassTracker {
    pub fn new(max_passes: u32) -> Self {
        Self {
            max_passes: max_passes.max(1),
            valid_counts: Vec::new(),
        }
    }

    /// Passes observed so far
    pub fn passes(&self) -> u32 {
        self.valid_counts.len() as u32
    }

    pub fn max_passes(&self) -> u32 {
        self.max_passes
    }

    /// Number the next pass will carry, starting at 1
    pub fn next_pass(&self) -> u32 {
        self.passes() + 1
    }

    pub fn valid_counts(&self) -> &[usize] {
        &self.valid_counts
    }

    /// Valid count of the pass before the latest one
    pub fn previous_valid(&self) -> Option<usize> {
        let n = self.valid_counts.len();
        if n < 2 {
            return None;
        }
        Some(self.valid_counts[n - 2])
    }

    /// Record one pass and decide whether to keep going.
    ///
    /// Completion wins, then the pass cap, then the plateau check: from the
    /// second pass on, a valid count that did not strictly increase stops.
    pub fn observe(&mut self, valid_count: usize, complete: bool) -> PassDecision {
        self.valid_counts.push(valid_count);
        let pass = self.passes();

        if complete {
            return PassDecision::Stop(PassOutcome::Success);
        }
        if pass >= self.max_passes {
            return PassDecision::Stop(PassOutcome::ExhaustedRetries);
        }
        if let Some(previous) = self.previous_valid() {
            if valid_count <= previous {
                return PassDecision::Stop(PassOutcome::Stalled);
            }
        }
        PassDecision::Continue
    }

    pub fn observe_report(&mut self, report: &CompletionReport) -> PassDecision {
        self.observe(report.valid_count, report.complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive(tracker: &mut PassTracker, counts: &[usize], complete_at: Option<usize>) -> PassOutcome {
        for (i, &count) in counts.iter().enumerate() {
            let complete = complete_at == Some(i + 1);
            if let PassDecision::Stop(outcome) = tracker.observe(count, complete) {
                return outcome;
            }
        }
        panic!("tracker never stopped");
    }

    #[test]
    fn test_plateau_stops_after_third_pass() {
        let mut tracker = PassTracker::new(6);
        let outcome = drive(&mut tracker, &[1, 2, 2, 3, 4, 5], None);
        assert_eq!(outcome, PassOutcome::Stalled);
        assert_eq!(tracker.passes(), 3);
    }

    #[test]
    fn test_steady_progress_to_completion() {
        let mut tracker = PassTracker::new(6);
        let outcome = drive(&mut tracker, &[1, 2, 3, 4, 5, 6], Some(6));
        assert_eq!(outcome, PassOutcome::Success);
        assert_eq!(tracker.passes(), 6);
    }

    #[test]
    fn test_complete_first_pass() {
        let mut tracker = PassTracker::new(6);
        assert_eq!(
            tracker.observe(4, true),
            PassDecision::Stop(PassOutcome::Success)
        );
        assert_eq!(tracker.passes(), 1);
    }

    #[test]
    fn test_cap_wins_over_plateau() {
        let mut tracker = PassTracker::new(2);
        assert_eq!(tracker.observe(3, false), PassDecision::Continue);
        assert_eq!(
            tracker.observe(3, false),
            PassDecision::Stop(PassOutcome::ExhaustedRetries)
        );
    }

    #[test]
    fn test_regression_is_a_stall() {
        let mut tracker = PassTracker::new(6);
        tracker.observe(5, false);
        assert_eq!(
            tracker.observe(4, false),
            PassDecision::Stop(PassOutcome::Stalled)
        );
        assert_eq!(tracker.previous_valid(), Some(5));
    }

    #[test]
    fn test_zero_cap_is_one_pass() {
        let mut tracker = PassTracker::new(0);
        assert_eq!(tracker.max_passes(), 1);
        assert_eq!(tracker.next_pass(), 1);
        assert_eq!(
            tracker.observe(0, false),
            PassDecision::Stop(PassOutcome::ExhaustedRetries)
        );
    }
}
