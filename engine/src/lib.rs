//! Medic engine: automated repair of failing C/C++ builds.
//!
//! A [`RepairLoop`] builds the project, classifies the failure, gathers the
//! files that explain it, asks a [`PatchOracle`] for full-file replacements,
//! writes them (keeping `.bak` copies) and rebuilds, up to a fixed number of
//! attempts.

pub mod config;
pub mod context;
pub mod error;
pub mod feedback;
pub mod oracle;
pub mod patch;
pub mod session;

pub use config::{ConfigError, RepairConfig};
pub use context::{ContextBundle, ContextGatherer};
pub use error::{OracleError, RepairError, RepairResult};
pub use feedback::{
    BuildResult, BuildRunner, CommandBuildRunner, DiagnosedError, DiagnosisReport,
    ErrorClassifier, RepairLoop, RepairState,
};
pub use oracle::{ChatCompletionsOracle, FixRequest, OracleConfig, PatchOracle};
pub use patch::{PatchApplier, PatchFormatError, PatchSet};
pub use session::{Attempt, RepairSession, SessionOutcome};
