//! Build feedback loop
//!
//! - [`build_runner`]: configure/build execution with merged logs
//! - [`classifier`]: log → [`classifier::DiagnosedError`]
//! - [`state_machine`]: repair states and legal transitions
//! - [`repair_loop`]: the orchestrator tying them to the oracle and applier

pub mod build_runner;
pub mod classifier;
pub mod repair_loop;
pub mod state_machine;

pub use build_runner::{BuildResult, BuildRunner, CommandBuildRunner};
pub use classifier::{DiagnosedError, ErrorClassifier};
pub use repair_loop::{DiagnosisReport, RepairLoop};
pub use state_machine::{RepairState, StateMachine, TransitionRecord};
