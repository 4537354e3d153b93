//! Repair session record
//!
//! [`SessionRecorder`] accumulates attempts while the loop runs;
//! [`SessionRecorder::finalize`] seals them with exactly one
//! [`SessionOutcome`] into a serializable [`RepairSession`].

use crate::context::ContextBundle;
use crate::error::RepairError;
use crate::feedback::classifier::DiagnosedError;
use crate::feedback::state_machine::TransitionRecord;
use crate::patch::PatchSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use uuid::Uuid;

/// One diagnose → gather → request → apply pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    /// 1-based attempt index
    pub index: u32,
    pub diagnosis: DiagnosedError,
    #[serde(default)]
    pub context_bundle: ContextBundle,
    /// Parsed oracle answer, absent when the response was malformed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_set: Option<PatchSet>,
    /// Whether the patch set was written to disk
    pub applied: bool,
    /// Why the oracle's response was discarded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected: Option<String>,
}

impl Attempt {
    pub fn new(index: u32, diagnosis: DiagnosedError) -> Self {
        Self {
            index,
            diagnosis,
            context_bundle: ContextBundle::default(),
            patch_set: None,
            applied: false,
            rejected: None,
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SessionOutcome {
    Succeeded,
    ExhaustedAttempts,
    Unclassifiable { log_tail: String },
    HardFailure {
        code: String,
        message: String,
        hint: String,
    },
}

impl SessionOutcome {
    pub fn hard_failure(err: &RepairError) -> Self {
        Self::HardFailure {
            code: err.code().to_string(),
            message: err.to_string(),
            hint: err.recovery_hint(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

impl std::fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::ExhaustedAttempts => write!(f, "exhausted attempts"),
            Self::Unclassifiable { .. } => write!(f, "unclassifiable build failure"),
            Self::HardFailure { code, message, .. } => write!(f, "hard failure [{code}]: {message}"),
        }
    }
}

/// A complete repair session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairSession {
    pub id: Uuid,
    pub project_root: PathBuf,
    pub max_attempts: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    /// Build-phase invocations (configure runs are not counted)
    pub build_invocations: u32,
    pub attempts: Vec<Attempt>,
    pub transitions: Vec<TransitionRecord>,
    pub outcome: SessionOutcome,
}

impl RepairSession {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn exit_code(&self) -> i32 {
        self.outcome.exit_code()
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        format!(
            "session {}: {} after {} attempt(s), {} build(s), {}ms",
            self.id,
            self.outcome,
            self.attempts.len(),
            self.build_invocations,
            self.elapsed_ms
        )
    }
}

/// Accumulates session data during the repair loop
pub struct SessionRecorder {
    id: Uuid,
    project_root: PathBuf,
    max_attempts: u32,
    started_at: DateTime<Utc>,
    clock: Instant,
    build_invocations: u32,
    attempts: Vec<Attempt>,
}

impl SessionRecorder {
    pub fn new(project_root: impl Into<PathBuf>, max_attempts: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_root: project_root.into(),
            max_attempts,
            started_at: Utc::now(),
            clock: Instant::now(),
            build_invocations: 0,
            attempts: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn record_build(&mut self) {
        self.build_invocations += 1;
    }

    pub fn record_attempt(&mut self, attempt: Attempt) {
        self.attempts.push(attempt);
    }

    /// Seal the session with its single outcome.
    pub fn finalize(
        self,
        outcome: SessionOutcome,
        transitions: Vec<TransitionRecord>,
    ) -> RepairSession {
        RepairSession {
            id: self.id,
            project_root: self.project_root,
            max_attempts: self.max_attempts,
            started_at: self.started_at,
            finished_at: Utc::now(),
            elapsed_ms: self.clock.elapsed().as_millis() as u64,
            build_invocations: self.build_invocations,
            attempts: self.attempts,
            transitions,
            outcome,
        }
    }
}
