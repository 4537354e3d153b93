//! JSON session report
//!
//! File contents are left out: the report lists which files each attempt
//! looked at and rewrote, not what they contained.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use medic_engine::feedback::TransitionRecord;
use medic_engine::{Attempt, DiagnosedError, RepairSession, SessionOutcome};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Per-attempt summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptReport {
    pub index: u32,
    pub diagnosis: DiagnosedError,
    pub context_files: Vec<PathBuf>,
    pub patched_files: Vec<PathBuf>,
    pub applied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected: Option<String>,
}

impl From<&Attempt> for AttemptReport {
    fn from(attempt: &Attempt) -> Self {
        Self {
            index: attempt.index,
            diagnosis: attempt.diagnosis.clone(),
            context_files: attempt.context_bundle.paths(),
            patched_files: attempt
                .patch_set
                .as_ref()
                .map(|set| set.paths())
                .unwrap_or_default(),
            applied: attempt.applied,
            rejected: attempt.rejected.clone(),
        }
    }
}

/// What gets written to the report file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub project_root: PathBuf,
    pub max_attempts: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub build_invocations: u32,
    pub outcome: SessionOutcome,
    pub exit_code: i32,
    pub attempts: Vec<AttemptReport>,
    pub transitions: Vec<TransitionRecord>,
}

impl From<&RepairSession> for SessionReport {
    fn from(session: &RepairSession) -> Self {
        Self {
            session_id: session.id,
            project_root: session.project_root.clone(),
            max_attempts: session.max_attempts,
            started_at: session.started_at,
            finished_at: session.finished_at,
            elapsed_ms: session.elapsed_ms,
            build_invocations: session.build_invocations,
            outcome: session.outcome.clone(),
            exit_code: session.exit_code(),
            attempts: session.attempts.iter().map(AttemptReport::from).collect(),
            transitions: session.transitions.clone(),
        }
    }
}

/// Serialize `session` as pretty JSON to `path`, creating parent directories.
pub fn write_session_report(session: &RepairSession, path: &Path) -> Result<()> {
    let report = SessionReport::from(session);
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize session report")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write session report {}", path.display()))?;

    tracing::info!(path = %path.display(), "Wrote session report");
    Ok(())
}

/// Write the report and return the session's exit code.
///
/// A report that cannot be written is logged; the exit code still follows
/// the session outcome.
pub fn finish_session(session: &RepairSession, path: &Path) -> i32 {
    if let Err(e) = write_session_report(session, path) {
        tracing::error!("{e:#}");
    }
    session.exit_code()
}
