//! Repair loop: build, diagnose, gather, request, apply, rebuild.
//!
//! Strictly sequential. Each attempt awaits configure, build, the oracle and
//! the writes in order; nothing is carried from one attempt to the next
//! except the files on disk.

use crate::config::RepairConfig;
use crate::context::ContextGatherer;
use crate::error::{RepairError, RepairResult};
use crate::feedback::build_runner::{BuildResult, BuildRunner};
use crate::feedback::classifier::{DiagnosedError, ErrorClassifier};
use crate::feedback::state_machine::{RepairState, StateMachine};
use crate::oracle::{FixRequest, PatchOracle};
use crate::patch::{parse_response, PatchApplier};
use crate::session::{Attempt, RepairSession, SessionOutcome, SessionRecorder};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// What an attempt decided about the session
enum Step {
    /// Rebuild with the next attempt index
    Retry,
    /// Session is over
    Done(SessionOutcome),
}

/// Result of a single configure + build + classify pass with no repair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisReport {
    pub build: BuildResult,
    /// Absent when the build passed
    pub diagnosis: Option<DiagnosedError>,
    /// Files that would be shown to the oracle
    pub context_files: Vec<PathBuf>,
}

/// Drives the bounded repair loop over one project
pub struct RepairLoop {
    config: RepairConfig,
    runner: Box<dyn BuildRunner>,
    oracle: Box<dyn PatchOracle>,
    classifier: ErrorClassifier,
    gatherer: ContextGatherer,
    applier: PatchApplier,
}

impl RepairLoop {
    pub fn new(
        config: RepairConfig,
        runner: Box<dyn BuildRunner>,
        oracle: Box<dyn PatchOracle>,
    ) -> Self {
        let mut config = config;
        if let Ok(root) = config.project_root.canonicalize() {
            config.project_root = root;
        }

        Self {
            classifier: ErrorClassifier::new(&config.project_root, config.log_tail_chars),
            gatherer: ContextGatherer::from_config(&config),
            applier: PatchApplier::new(&config.project_root),
            config,
            runner,
            oracle,
        }
    }

    /// Run attempts until the build passes or a terminal state is reached.
    pub async fn run(&self) -> RepairSession {
        let mut sm = StateMachine::new();
        let mut recorder =
            SessionRecorder::new(&self.config.project_root, self.config.max_attempts);

        info!(
            session = %recorder.id(),
            root = %self.config.project_root.display(),
            max_attempts = self.config.max_attempts,
            "Starting repair session"
        );

        if let Err(err) = self.check_descriptor() {
            return self.hard_failure(sm, recorder, err);
        }

        loop {
            match self.run_attempt(&mut sm, &mut recorder).await {
                Ok(Step::Retry) => {
                    sm.next_attempt();
                }
                Ok(Step::Done(outcome)) => {
                    info!(outcome = %outcome, history = %sm.summary(), "Repair session finished");
                    return recorder.finalize(outcome, sm.into_transitions());
                }
                Err(err) => return self.hard_failure(sm, recorder, err),
            }
        }
    }

    /// Configure, build and classify once without contacting the oracle or
    /// writing anything.
    pub async fn diagnose_only(&self) -> RepairResult<DiagnosisReport> {
        self.check_descriptor()?;
        self.configure().await?;
        let build = self.runner.build().await?;

        if build.succeeded {
            info!("Build passed; nothing to diagnose");
            return Ok(DiagnosisReport {
                build,
                diagnosis: None,
                context_files: Vec::new(),
            });
        }

        let diagnosis = self.classifier.classify(&build.raw_log);
        let context_files = if diagnosis.is_classified() {
            self.gatherer.gather(&diagnosis)?.paths()
        } else {
            Vec::new()
        };
        info!(kind = diagnosis.kind(), diagnosis = %diagnosis, files = context_files.len(), "Diagnosed build failure");

        Ok(DiagnosisReport {
            build,
            diagnosis: Some(diagnosis),
            context_files,
        })
    }

    async fn run_attempt(
        &self,
        sm: &mut StateMachine,
        recorder: &mut SessionRecorder,
    ) -> RepairResult<Step> {
        let index = sm.attempt();
        info!(attempt = index, max_attempts = self.config.max_attempts, "Building");

        self.configure().await?;
        recorder.record_build();
        let build = self.runner.build().await?;

        if build.succeeded {
            transition(sm, RepairState::Succeeded, Some("build passed"));
            info!(attempt = index, "Build passed");
            return Ok(Step::Done(SessionOutcome::Succeeded));
        }

        transition(sm, RepairState::Diagnosing, None);
        let diagnosis = self.classifier.classify(&build.raw_log);

        if let DiagnosedError::Unclassified { log_tail } = &diagnosis {
            warn!(attempt = index, log_tail = %log_tail, "Build failure matches no known error format");
            let outcome = SessionOutcome::Unclassifiable {
                log_tail: log_tail.clone(),
            };
            transition(sm, RepairState::Unclassifiable, None);
            recorder.record_attempt(Attempt::new(index, diagnosis));
            return Ok(Step::Done(outcome));
        }

        info!(attempt = index, kind = diagnosis.kind(), diagnosis = %diagnosis, "Build failed");

        let mut attempt = Attempt::new(index, diagnosis.clone());
        let step = self.repair(sm, &mut attempt, diagnosis, build.raw_log).await;
        recorder.record_attempt(attempt);
        step
    }

    /// Gather, request and apply for one classified failure.
    async fn repair(
        &self,
        sm: &mut StateMachine,
        attempt: &mut Attempt,
        diagnosis: DiagnosedError,
        raw_log: String,
    ) -> RepairResult<Step> {
        transition(sm, RepairState::GatheringContext, None);
        let bundle = self.gatherer.gather(&diagnosis)?;
        attempt.context_bundle = bundle.clone();

        transition(sm, RepairState::RequestingFix, None);
        let request = FixRequest::new(diagnosis, bundle, raw_log);
        let response = self.oracle.request_fix(&request).await?;

        let (next, reason) = if attempt.index >= self.config.max_attempts {
            (RepairState::ExhaustedAttempts, "attempt budget spent")
        } else {
            (RepairState::Building, "retrying build")
        };

        let set = match parse_response(&response) {
            Ok(set) => set,
            Err(e) => {
                warn!(attempt = attempt.index, error = %e, "Oracle response not actionable; no files changed");
                attempt.rejected = Some(e.to_string());
                return Ok(self.advance_attempt(sm, next, reason));
            }
        };

        let applied = match self.applier.confine(&set) {
            Ok(confined) => {
                transition(sm, RepairState::Applying, None);
                Some(self.applier.apply(&confined)?)
            }
            Err(e) => {
                warn!(attempt = attempt.index, error = %e, "Oracle response not actionable; no files changed");
                attempt.rejected = Some(e.to_string());
                None
            }
        };

        if let Some(report) = applied {
            info!(
                attempt = attempt.index,
                files = report.written.len(),
                backups = report.backups.len(),
                "Patch applied"
            );
            attempt.applied = true;
        }
        attempt.patch_set = Some(set);

        Ok(self.advance_attempt(sm, next, reason))
    }

    fn advance_attempt(&self, sm: &mut StateMachine, next: RepairState, reason: &str) -> Step {
        transition(sm, next, Some(reason));
        if next == RepairState::ExhaustedAttempts {
            warn!(max_attempts = self.config.max_attempts, "Giving up: attempt budget spent");
            Step::Done(SessionOutcome::ExhaustedAttempts)
        } else {
            Step::Retry
        }
    }

    async fn configure(&self) -> RepairResult<()> {
        let configured = self.runner.configure().await?;
        if configured.succeeded {
            return Ok(());
        }
        warn!(exit_code = ?configured.exit_code, log = %configured.raw_log, "Configure step failed");
        Err(RepairError::ConfigureFailure {
            exit_code: configured.exit_code,
            log: configured.raw_log,
        })
    }

    fn check_descriptor(&self) -> RepairResult<()> {
        let path = self.config.descriptor_path();
        if path.is_file() {
            Ok(())
        } else {
            Err(RepairError::MissingBuildDescriptor { path })
        }
    }

    fn hard_failure(
        &self,
        mut sm: StateMachine,
        recorder: SessionRecorder,
        err: RepairError,
    ) -> RepairSession {
        tracing::error!(code = err.code(), error = %err, hint = %err.recovery_hint(), "Repair session aborted");
        transition(&mut sm, RepairState::HardFailure, Some(err.code()));
        recorder.finalize(SessionOutcome::hard_failure(&err), sm.into_transitions())
    }
}

fn transition(sm: &mut StateMachine, to: RepairState, reason: Option<&str>) {
    if let Err(e) = sm.advance(to, reason) {
        tracing::error!(error = %e, "Rejected state transition");
    }
}
