use crate::error::PipelineError;
use serde::Serialize;
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    IntentHinting,
    Analyzing,
    Planning,
    Scaffolding,
    Generating,
    Verifying,
    Finalizing,
    Done,
    Failed,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::IntentHinting => "intent_hinting",
            Phase::Analyzing => "analyzing",
            Phase::Planning => "planning",
            Phase::Scaffolding => "scaffolding",
            Phase::Generating => "generating",
            Phase::Verifying => "verifying",
            Phase::Finalizing => "finalizing",
            Phase::Done => "done",
            Phase::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }

    /// Any live phase may fail; otherwise only the forward edges and the
    /// verify -> generate loop are allowed
    pub fn is_valid_transition(self, to: Phase) -> bool {
        if self.is_terminal() {
            return false;
        }
        if to == Phase::Failed {
            return true;
        }
        matches!(
            (self, to),
            (Phase::IntentHinting, Phase::Analyzing)
                | (Phase::Analyzing, Phase::Planning)
                | (Phase::Planning, Phase::Scaffolding)
                | (Phase::Scaffolding, Phase::Generating)
                | (Phase::Generating, Phase::Verifying)
                | (Phase::Verifying, Phase::Generating)
                | (Phase::Verifying, Phase::Finalizing)
                | (Phase::Finalizing, Phase::Done)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current phase plus the path taken to reach it
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    current: Phase,
    history: Vec<Phase>,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self {
            current: Phase::IntentHinting,
            history: vec![Phase::IntentHinting],
        }
    }
}

impl PhaseTracker {
    pub fn current(&self) -> Phase {
        self.current
    }

    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    pub fn advance(&mut self, to: Phase) -> Result<(), PipelineError> {
        if !self.current.is_valid_transition(to) {
            return Err(PipelineError::InvalidTransition {
                from: self.current.to_string(),
                to: to.to_string(),
            });
        }
        info!("Phase {} -> {}", self.current, to);
        self.current = to;
        self.history.push(to);
        Ok(())
    }

    /// Move to `Failed` unless already terminal
    pub fn fail(&mut self) {
        if !self.current.is_terminal() {
            info!("Phase {} -> failed", self.current);
            self.current = Phase::Failed;
            self.history.push(Phase::Failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_with_loop() {
        let mut tracker = PhaseTracker::default();
        for phase in [
            Phase::Analyzing,
            Phase::Planning,
            Phase::Scaffolding,
            Phase::Generating,
            Phase::Verifying,
            Phase::Generating,
            Phase::Verifying,
            Phase::Finalizing,
            Phase::Done,
        ] {
            tracker.advance(phase).unwrap();
        }
        assert_eq!(tracker.current(), Phase::Done);
        assert_eq!(tracker.history().len(), 10);
    }

    #[test]
    fn test_skipping_is_rejected() {
        let mut tracker = PhaseTracker::default();
        let err = tracker.advance(Phase::Scaffolding).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTransition { .. }));
        assert_eq!(tracker.current(), Phase::IntentHinting);
    }

    #[test]
    fn test_failed_from_anywhere_but_terminal() {
        assert!(Phase::Planning.is_valid_transition(Phase::Failed));
        assert!(Phase::Verifying.is_valid_transition(Phase::Failed));
        assert!(!Phase::Done.is_valid_transition(Phase::Failed));
        assert!(!Phase::Failed.is_valid_transition(Phase::Analyzing));

        let mut tracker = PhaseTracker::default();
        tracker.fail();
        tracker.fail();
        assert_eq!(tracker.history(), &[Phase::IntentHinting, Phase::Failed]);
    }
}
