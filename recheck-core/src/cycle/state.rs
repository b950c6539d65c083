//! Cycle state machine
//!
//! Phases:
//!
//! ```text
//! Idle -> Assembling -> AwaitingReview -> Validating
//!                                          |-> AwaitingFixes -> (next round) Assembling
//!                                          |-> Converged
//!                                          |-> RoundLimitReached
//! ```
//!
//! A failed round (assembly error, reviewer timeout, validation defect)
//! falls back to `Idle` so the same round is retried, not advanced, on the
//! next invocation. Validating may also loop back to AwaitingReview for the
//! single validation retry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::report::ReviewReport;
use crate::{Error, Result};

/// The phase a review cycle is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    /// No round in flight
    Idle,
    /// Building the SoT bundle for the current round
    Assembling,
    /// Suspended on the external reviewer call
    AwaitingReview,
    /// Checking the raw report against the schema contract
    Validating,
    /// Round complete, open findings remain
    AwaitingFixes,
    /// Terminal: no open findings remain
    Converged,
    /// Terminal: the round limit was hit with findings still open
    RoundLimitReached,
}

impl CyclePhase {
    /// Whether this phase ends the cycle
    pub fn is_terminal(&self) -> bool {
        matches!(self, CyclePhase::Converged | CyclePhase::RoundLimitReached)
    }

    /// Whether a round was in flight when this phase was persisted
    pub fn is_mid_round(&self) -> bool {
        matches!(
            self,
            CyclePhase::Assembling | CyclePhase::AwaitingReview | CyclePhase::Validating
        )
    }

    /// Check if a transition to the given phase is valid
    pub fn can_transition_to(&self, next: &CyclePhase) -> bool {
        use CyclePhase::*;
        matches!(
            (self, next),
            (Idle, Assembling)
                | (AwaitingFixes, Assembling)
                | (Assembling, AwaitingReview)
                | (AwaitingReview, Validating)
                | (Validating, AwaitingReview)
                | (Validating, AwaitingFixes)
                | (Validating, Converged)
                | (Validating, RoundLimitReached)
                // Aborted rounds fall back to Idle for retry
                | (Assembling, Idle)
                | (AwaitingReview, Idle)
                | (Validating, Idle)
        )
    }

    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            CyclePhase::Idle => "idle",
            CyclePhase::Assembling => "assembling SoT bundle",
            CyclePhase::AwaitingReview => "awaiting external review",
            CyclePhase::Validating => "validating report",
            CyclePhase::AwaitingFixes => "awaiting fixes",
            CyclePhase::Converged => "converged",
            CyclePhase::RoundLimitReached => "round limit reached",
        }
    }
}

impl std::fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Why a cycle terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    /// Every finding is fixed or wontfix
    Converged,
    /// The configured round limit was hit with findings still open
    RoundLimitReached,
}

/// Persisted state of one scope's review cycle
///
/// Owned exclusively by the controller and mutated only by advancing a
/// round. The report history is stored as separate per-round artifacts and
/// filled in when a state is loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleState {
    /// The scope under review
    pub scope_id: String,
    /// Current round, starting at 1
    pub round: u32,
    /// Current phase
    pub phase: CyclePhase,
    /// Open findings after the last validated report
    pub open_findings: usize,
    /// Whether the cycle has terminated
    pub terminal: bool,
    /// Why it terminated, when terminal
    pub terminal_reason: Option<TerminalReason>,
    /// Last state change
    pub updated_at: DateTime<Utc>,
    /// Validated reports of completed rounds, oldest first
    #[serde(skip)]
    pub history: Vec<ReviewReport>,
}

impl CycleState {
    /// Create the initial state for a fresh cycle
    pub fn new(scope_id: impl Into<String>) -> Self {
        Self {
            scope_id: scope_id.into(),
            round: 1,
            phase: CyclePhase::Idle,
            open_findings: 0,
            terminal: false,
            terminal_reason: None,
            updated_at: Utc::now(),
            history: Vec::new(),
        }
    }

    /// Attempt to transition to a new phase
    ///
    /// Returns an error if the transition is not valid for the state
    /// machine; terminal bookkeeping is kept consistent on success.
    pub fn transition(&mut self, next: CyclePhase) -> Result<()> {
        if !self.phase.can_transition_to(&next) {
            return Err(Error::State(format!(
                "invalid cycle transition from {:?} to {:?} for scope '{}'",
                self.phase, next, self.scope_id
            )));
        }

        tracing::info!(
            scope_id = %self.scope_id,
            round = self.round,
            from = ?self.phase,
            to = ?next,
            "Cycle phase transition"
        );

        self.phase = next;
        self.terminal = next.is_terminal();
        self.terminal_reason = match next {
            CyclePhase::Converged => Some(TerminalReason::Converged),
            CyclePhase::RoundLimitReached => Some(TerminalReason::RoundLimitReached),
            _ => None,
        };
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = CycleState::new("SC-1");
        assert_eq!(state.round, 1);
        assert_eq!(state.phase, CyclePhase::Idle);
        assert!(!state.terminal);
        assert!(state.terminal_reason.is_none());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut state = CycleState::new("SC-1");
        state.transition(CyclePhase::Assembling).unwrap();
        state.transition(CyclePhase::AwaitingReview).unwrap();
        state.transition(CyclePhase::Validating).unwrap();
        state.transition(CyclePhase::AwaitingFixes).unwrap();
        // Next round loops back to assembling
        state.transition(CyclePhase::Assembling).unwrap();
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mut state = CycleState::new("SC-1");
        let result = state.transition(CyclePhase::Converged);
        assert!(result.is_err());
        assert_eq!(state.phase, CyclePhase::Idle);
    }

    #[test]
    fn test_terminal_bookkeeping() {
        let mut state = CycleState::new("SC-1");
        state.transition(CyclePhase::Assembling).unwrap();
        state.transition(CyclePhase::AwaitingReview).unwrap();
        state.transition(CyclePhase::Validating).unwrap();
        state.transition(CyclePhase::Converged).unwrap();

        assert!(state.terminal);
        assert_eq!(state.terminal_reason, Some(TerminalReason::Converged));
        assert!(state.phase.is_terminal());
    }

    #[test]
    fn test_terminal_reasons_are_distinct() {
        let mut converged = CycleState::new("a");
        converged.transition(CyclePhase::Assembling).unwrap();
        converged.transition(CyclePhase::AwaitingReview).unwrap();
        converged.transition(CyclePhase::Validating).unwrap();
        converged.transition(CyclePhase::Converged).unwrap();

        let mut limited = CycleState::new("b");
        limited.transition(CyclePhase::Assembling).unwrap();
        limited.transition(CyclePhase::AwaitingReview).unwrap();
        limited.transition(CyclePhase::Validating).unwrap();
        limited.transition(CyclePhase::RoundLimitReached).unwrap();

        assert_ne!(converged.terminal_reason, limited.terminal_reason);
    }

    #[test]
    fn test_aborted_round_falls_back_to_idle() {
        let mut state = CycleState::new("SC-1");
        state.transition(CyclePhase::Assembling).unwrap();
        state.transition(CyclePhase::Idle).unwrap();
        assert!(!state.terminal);
        // The same round is retried
        assert_eq!(state.round, 1);
    }

    #[test]
    fn test_validation_retry_loops_to_awaiting_review() {
        let mut state = CycleState::new("SC-1");
        state.transition(CyclePhase::Assembling).unwrap();
        state.transition(CyclePhase::AwaitingReview).unwrap();
        state.transition(CyclePhase::Validating).unwrap();
        state.transition(CyclePhase::AwaitingReview).unwrap();
        state.transition(CyclePhase::Validating).unwrap();
    }
}
