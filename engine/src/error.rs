//! Repair error types
//!
//! Every variant of [`RepairError`] ends a repair session. Malformed oracle
//! responses are not errors at this level; they live in
//! [`crate::patch::PatchFormatError`] and are absorbed by the loop.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for repair operations
pub type RepairResult<T> = Result<T, RepairError>;

/// Session-terminal failures
#[derive(Debug, Error)]
pub enum RepairError {
    /// The configure step exited non-zero
    #[error("Configure step failed (exit code {exit_code:?})")]
    ConfigureFailure {
        exit_code: Option<i32>,
        log: String,
    },

    /// The build descriptor is absent from the project root
    #[error("Build descriptor not found at {path}")]
    MissingBuildDescriptor { path: PathBuf },

    /// The build tool could not be spawned at all
    #[error("Failed to launch '{program}': {source}")]
    LaunchFailure {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A build command or oracle call exceeded its time limit
    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: String, secs: u64 },

    /// A file the diagnosis depends on could not be read
    #[error("Could not read source file {path}: {source}")]
    SourceReadFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing a patched file or its backup failed
    #[error("Failed to write {path}: {source}")]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The oracle call itself failed (transport or HTTP status)
    #[error("Oracle request failed: {0}")]
    OracleFailure(String),
}

impl RepairError {
    /// Create a source read failure
    pub fn source_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SourceReadFailure {
            path: path.into(),
            source,
        }
    }

    /// Create a write failure
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WriteFailure {
            path: path.into(),
            source,
        }
    }

    /// Create a timeout error for a named stage
    pub fn timeout(stage: impl Into<String>, secs: u64) -> Self {
        Self::Timeout {
            stage: stage.into(),
            secs,
        }
    }

    /// Machine-readable error code, stable across releases
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigureFailure { .. } => "CONFIGURE_FAILED",
            Self::MissingBuildDescriptor { .. } => "MISSING_BUILD_DESCRIPTOR",
            Self::LaunchFailure { .. } => "LAUNCH_FAILED",
            Self::Timeout { .. } => "TIMEOUT",
            Self::SourceReadFailure { .. } => "SOURCE_READ_FAILED",
            Self::WriteFailure { .. } => "WRITE_FAILED",
            Self::OracleFailure(_) => "ORACLE_FAILED",
        }
    }

    /// Operator-facing next step for this failure
    pub fn recovery_hint(&self) -> String {
        match self {
            Self::ConfigureFailure { .. } => {
                "Run the configure command by hand and fix the build descriptor".to_string()
            }
            Self::MissingBuildDescriptor { path } => format!(
                "Point --project-root at a directory containing {}",
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string())
            ),
            Self::LaunchFailure { program, .. } => {
                format!("Install '{program}' or adjust the configured command")
            }
            Self::Timeout { .. } => {
                "Raise the timeout or check for a hung build or oracle".to_string()
            }
            Self::SourceReadFailure { path, .. } => {
                format!("Check that {} exists and is readable", path.display())
            }
            Self::WriteFailure { .. } => {
                "Inspect the tree; earlier files of this patch may already be rewritten (see .bak files)"
                    .to_string()
            }
            Self::OracleFailure(_) => "Check the oracle endpoint, model name and API key".to_string(),
        }
    }
}

/// Failures of the oracle transport
#[derive(Debug, Error)]
pub enum OracleError {
    /// The HTTP request could not be completed
    #[error("HTTP request failed: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success status
    #[error("Oracle API error ({status}): {body}")]
    Status { status: u16, body: String },

    /// The response body was not the expected JSON shape
    #[error("Failed to parse oracle response: {0}")]
    Decode(String),

    /// The request did not complete within the configured limit
    #[error("Oracle request timed out after {secs}s")]
    Timeout { secs: u64 },
}

impl From<OracleError> for RepairError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::Timeout { secs } => RepairError::timeout("oracle request", secs),
            other => RepairError::OracleFailure(other.to_string()),
        }
    }
}
