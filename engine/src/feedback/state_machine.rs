//! Repair loop state machine: explicit states and legal transition guards.
//!
//! Every run starts at `Building` and ends in exactly one terminal state.
//! The loop calls `advance()` for each step; illegal edges are rejected and
//! every accepted edge is recorded for the session report.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// States of the repair loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairState {
    /// Running configure + build.
    Building,
    /// Classifying the failed build's log.
    Diagnosing,
    /// Reading the files relevant to the diagnosis.
    GatheringContext,
    /// Waiting on the oracle.
    RequestingFix,
    /// Writing the returned patch set.
    Applying,
    /// Build passed (terminal).
    Succeeded,
    /// Attempt budget spent (terminal).
    ExhaustedAttempts,
    /// Log matched no known grammar (terminal).
    Unclassifiable,
    /// A session-ending error (terminal).
    HardFailure,
}

impl RepairState {
    /// Whether this is a terminal state (no further transitions allowed).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::ExhaustedAttempts | Self::Unclassifiable | Self::HardFailure
        )
    }
}

impl fmt::Display for RepairState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Building => write!(f, "Building"),
            Self::Diagnosing => write!(f, "Diagnosing"),
            Self::GatheringContext => write!(f, "GatheringContext"),
            Self::RequestingFix => write!(f, "RequestingFix"),
            Self::Applying => write!(f, "Applying"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::ExhaustedAttempts => write!(f, "ExhaustedAttempts"),
            Self::Unclassifiable => write!(f, "Unclassifiable"),
            Self::HardFailure => write!(f, "HardFailure"),
        }
    }
}

/// Legal transitions:
/// ```text
/// Building → Succeeded | Diagnosing
/// Diagnosing → Unclassifiable | GatheringContext
/// GatheringContext → RequestingFix
/// RequestingFix → Applying | Building (malformed response) | ExhaustedAttempts
/// Applying → Building | ExhaustedAttempts
/// any non-terminal → HardFailure
/// ```
fn is_legal_transition(from: RepairState, to: RepairState) -> bool {
    use RepairState::*;

    if to == HardFailure && !from.is_terminal() {
        return true;
    }

    matches!(
        (from, to),
        (Building, Succeeded)
            | (Building, Diagnosing)
            | (Diagnosing, Unclassifiable)
            | (Diagnosing, GatheringContext)
            | (GatheringContext, RequestingFix)
            | (RequestingFix, Applying)
            // Malformed response: nothing to apply, move on
            | (RequestingFix, Building)
            | (RequestingFix, ExhaustedAttempts)
            | (Applying, Building)
            | (Applying, ExhaustedAttempts)
    )
}

/// A single recorded state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: RepairState,
    pub to: RepairState,
    /// Attempt index at the time of transition.
    pub attempt: u32,
    /// Milliseconds since the state machine was created.
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Error returned when an illegal transition is attempted.
#[derive(Debug, Clone)]
pub struct IllegalTransition {
    pub from: RepairState,
    pub to: RepairState,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Illegal state transition: {} → {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

/// Tracks the current state and the transition log.
pub struct StateMachine {
    current: RepairState,
    attempt: u32,
    created_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl StateMachine {
    /// Create a new state machine starting at `Building`, attempt 1.
    pub fn new() -> Self {
        Self {
            current: RepairState::Building,
            attempt: 1,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> RepairState {
        self.current
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Move the attempt counter forward by exactly one.
    pub fn next_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    /// Attempt to advance to the next state.
    pub fn advance(
        &mut self,
        to: RepairState,
        reason: Option<&str>,
    ) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalTransition {
                from: self.current,
                to,
            });
        }

        let record = TransitionRecord {
            from: self.current,
            to,
            attempt: self.attempt,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
            reason: reason.map(String::from),
        };

        tracing::debug!(
            from = %self.current,
            to = %to,
            attempt = self.attempt,
            "State transition"
        );

        self.transitions.push(record);
        self.current = to;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// Consume the machine, keeping only its log.
    pub fn into_transitions(self) -> Vec<TransitionRecord> {
        self.transitions
    }

    /// One-line history, e.g. `Building → Diagnosing → ... (12ms, 6 transitions)`.
    pub fn summary(&self) -> String {
        let mut states = vec![RepairState::Building.to_string()];
        states.extend(self.transitions.iter().map(|t| t.to.to_string()));
        format!(
            "{} ({}ms, {} transitions)",
            states.join(" → "),
            self.created_at.elapsed().as_millis(),
            self.transitions.len()
        )
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
