//! Repair session configuration
//!
//! One immutable [`RepairConfig`] value is handed to the repair loop at
//! construction time. Nothing in the engine reads process-wide settings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Placeholder substituted into command strings.
pub const BUILD_DIR_PLACEHOLDER: &str = "{build_dir}";

/// Default C-family extensions scanned for symbols and includes.
pub const DEFAULT_SOURCE_EXTENSIONS: &[&str] = &["c", "cc", "cpp", "cxx", "h", "hpp"];

/// Invalid configuration values
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is outside its allowed range
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// A command string could not be split into arguments
    #[error("Could not parse {key} command: {command}")]
    UnparsableCommand { key: String, command: String },
}

/// Settings for one repair session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    /// Project root; every command runs here and every path is relative to it
    pub project_root: PathBuf,
    /// Maximum build attempts before giving up
    pub max_attempts: u32,
    /// Build-output directory, relative to the project root
    pub build_output_dir: PathBuf,
    /// File extensions (without the dot) considered source or header files
    pub source_extensions: BTreeSet<String>,
    /// Build descriptor sent to the oracle when a missing symbol matches nothing
    pub build_descriptor: PathBuf,
    /// Configure command; `{build_dir}` is substituted
    pub configure_command: String,
    /// Build command; `{build_dir}` is substituted
    pub build_command: String,
    /// Per-command time limit
    pub build_timeout_secs: u64,
    /// Characters of log kept for unclassifiable failures
    pub log_tail_chars: usize,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            max_attempts: 5,
            build_output_dir: PathBuf::from("build"),
            source_extensions: DEFAULT_SOURCE_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            build_descriptor: PathBuf::from("CMakeLists.txt"),
            configure_command: "cmake -S . -B {build_dir}".to_string(),
            build_command: "cmake --build {build_dir}".to_string(),
            build_timeout_secs: 600,
            log_tail_chars: 500,
        }
    }
}

impl RepairConfig {
    /// Create a config rooted at `project_root` with all other defaults
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Check value ranges and command syntax
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_attempts".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.source_extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "source_extensions".to_string(),
                message: "at least one extension is required".to_string(),
            });
        }
        if self.build_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "build_timeout_secs".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        self.configure_argv()?;
        self.build_argv()?;
        Ok(())
    }

    /// Absolute-or-root-relative build-output directory
    pub fn build_dir_path(&self) -> PathBuf {
        self.project_root.join(&self.build_output_dir)
    }

    /// Path of the build descriptor under the project root
    pub fn descriptor_path(&self) -> PathBuf {
        self.project_root.join(&self.build_descriptor)
    }

    /// Configure command split into program + arguments
    pub fn configure_argv(&self) -> Result<Vec<String>, ConfigError> {
        self.split_command("configure_command", &self.configure_command)
    }

    /// Build command split into program + arguments
    pub fn build_argv(&self) -> Result<Vec<String>, ConfigError> {
        self.split_command("build_command", &self.build_command)
    }

    fn split_command(&self, key: &str, command: &str) -> Result<Vec<String>, ConfigError> {
        let build_dir = self.build_output_dir.to_string_lossy();
        let expanded = command.replace(BUILD_DIR_PLACEHOLDER, &build_dir);
        match shlex::split(&expanded) {
            Some(argv) if !argv.is_empty() => Ok(argv),
            _ => Err(ConfigError::UnparsableCommand {
                key: key.to_string(),
                command: command.to_string(),
            }),
        }
    }
}

/// Parse a comma-separated extension list, dropping leading dots and blanks
pub fn parse_extension_list(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(|e| e.trim().trim_start_matches('.').to_string())
        .filter(|e| !e.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RepairConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.build_output_dir, PathBuf::from("build"));
        assert!(config.source_extensions.contains("cpp"));
        assert!(config.source_extensions.contains("h"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_build_dir_substitution() {
        let config = RepairConfig {
            build_output_dir: PathBuf::from("out/debug"),
            ..RepairConfig::default()
        };
        assert_eq!(
            config.configure_argv().unwrap(),
            vec!["cmake", "-S", ".", "-B", "out/debug"]
        );
        assert_eq!(
            config.build_argv().unwrap(),
            vec!["cmake", "--build", "out/debug"]
        );
    }

    #[test]
    fn test_quoted_command() {
        let config = RepairConfig {
            build_command: "make -C \"{build_dir}\" CFLAGS='-O2 -g'".to_string(),
            ..RepairConfig::default()
        };
        assert_eq!(
            config.build_argv().unwrap(),
            vec!["make", "-C", "build", "CFLAGS=-O2 -g"]
        );
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let config = RepairConfig {
            max_attempts: 0,
            ..RepairConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn test_validate_rejects_bad_command() {
        let config = RepairConfig {
            build_command: "make \"unterminated".to_string(),
            ..RepairConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnparsableCommand { .. })
        ));

        let config = RepairConfig {
            configure_command: "   ".to_string(),
            ..RepairConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_extension_list() {
        let exts = parse_extension_list(".cpp, h ,, .cu");
        assert_eq!(
            exts.into_iter().collect::<Vec<_>>(),
            vec!["cpp".to_string(), "cu".to_string(), "h".to_string()]
        );
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: RepairConfig = serde_json::from_str(r#"{"max_attempts": 2}"#).unwrap();
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.build_descriptor, PathBuf::from("CMakeLists.txt"));
    }
}
