//! Layered configuration: defaults → `medic.toml` → `MEDIC_*` env → CLI flags.

use anyhow::{bail, Context, Result};
use clap::Parser;
use medic_engine::config::parse_extension_list;
use medic_engine::{OracleConfig, RepairConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file looked up in the project root when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "medic.toml";

/// Report file name inside the build-output directory
pub const DEFAULT_REPORT_FILE: &str = "medic-session.json";

/// Command-line arguments
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Project root containing the build descriptor (overrides MEDIC_PROJECT_ROOT)
    #[arg(long)]
    pub project_root: Option<PathBuf>,

    /// TOML config file (default: <project-root>/medic.toml if present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Maximum build attempts (overrides MEDIC_MAX_ATTEMPTS)
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Build-output directory relative to the project root (overrides MEDIC_BUILD_DIR)
    #[arg(long)]
    pub build_dir: Option<PathBuf>,

    /// Chat-completions endpoint (overrides MEDIC_ORACLE_URL)
    #[arg(long)]
    pub oracle_url: Option<String>,

    /// Model name sent to the endpoint (overrides MEDIC_MODEL)
    #[arg(long)]
    pub model: Option<String>,

    /// Where to write the JSON session report
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Build and diagnose once; never contact the oracle or modify files
    #[arg(long, default_value_t = false)]
    pub diagnose_only: bool,
}

/// Complete tool configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MedicConfig {
    pub repair: RepairConfig,
    pub oracle: OracleConfig,
}

impl MedicConfig {
    /// Parse a TOML document with `[repair]` and `[oracle]` tables.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config TOML")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("In {}", path.display()))
    }

    /// Resolve the full layered configuration for `cli`, then validate it.
    pub fn load(cli: &Cli) -> Result<Self> {
        Self::load_with(cli, |key| std::env::var(key).ok())
    }

    /// [`MedicConfig::load`] with an explicit environment lookup.
    pub fn load_with(cli: &Cli, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let root = cli
            .project_root
            .clone()
            .or_else(|| env("MEDIC_PROJECT_ROOT").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));

        let file = match &cli.config {
            Some(path) => Some(path.clone()),
            None => Some(root.join(DEFAULT_CONFIG_FILE)).filter(|p| p.is_file()),
        };

        let mut config = match &file {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading config file");
                Self::from_file(path)?
            }
            None => Self::default(),
        };

        config.apply_env(&env)?;
        config.apply_cli(cli);

        config
            .repair
            .validate()
            .context("Invalid repair configuration")?;
        if config.oracle.timeout_secs == 0 {
            bail!("Invalid oracle configuration: timeout_secs must be at least 1");
        }
        Ok(config)
    }

    /// Overlay `MEDIC_*` variables. Unparsable numbers are errors.
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<()> {
        let repair = &mut self.repair;
        if let Some(root) = env("MEDIC_PROJECT_ROOT") {
            repair.project_root = PathBuf::from(root);
        }
        if let Some(max) = env("MEDIC_MAX_ATTEMPTS") {
            repair.max_attempts = parse_number("MEDIC_MAX_ATTEMPTS", &max)?;
        }
        if let Some(dir) = env("MEDIC_BUILD_DIR") {
            repair.build_output_dir = PathBuf::from(dir);
        }
        if let Some(exts) = env("MEDIC_SOURCE_EXTENSIONS") {
            repair.source_extensions = parse_extension_list(&exts);
        }
        if let Some(cmd) = env("MEDIC_CONFIGURE_CMD") {
            repair.configure_command = cmd;
        }
        if let Some(cmd) = env("MEDIC_BUILD_CMD") {
            repair.build_command = cmd;
        }
        if let Some(secs) = env("MEDIC_BUILD_TIMEOUT_SECS") {
            repair.build_timeout_secs = parse_number("MEDIC_BUILD_TIMEOUT_SECS", &secs)?;
        }

        let oracle = &mut self.oracle;
        if let Some(url) = env("MEDIC_ORACLE_URL") {
            oracle.endpoint = url;
        }
        if let Some(model) = env("MEDIC_MODEL") {
            oracle.model = model;
        }
        if let Some(key) = env("MEDIC_API_KEY").filter(|k| !k.is_empty()) {
            oracle.api_key = Some(key);
        }
        if let Some(secs) = env("MEDIC_ORACLE_TIMEOUT_SECS") {
            oracle.timeout_secs = parse_number("MEDIC_ORACLE_TIMEOUT_SECS", &secs)?;
        }
        Ok(())
    }

    /// Overlay explicit command-line flags.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(root) = &cli.project_root {
            self.repair.project_root = root.clone();
        }
        if let Some(max) = cli.max_attempts {
            self.repair.max_attempts = max;
        }
        if let Some(dir) = &cli.build_dir {
            self.repair.build_output_dir = dir.clone();
        }
        if let Some(url) = &cli.oracle_url {
            self.oracle.endpoint = url.clone();
        }
        if let Some(model) = &cli.model {
            self.oracle.model = model.clone();
        }
    }

    /// `--report`, else `<build_dir>/medic-session.json`
    pub fn report_path(&self, cli: &Cli) -> PathBuf {
        cli.report
            .clone()
            .unwrap_or_else(|| self.repair.build_dir_path().join(DEFAULT_REPORT_FILE))
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    match raw.trim().parse() {
        Ok(n) => Ok(n),
        Err(_) => bail!("{key} must be a non-negative integer, got '{raw}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        let config = MedicConfig::from_toml_str("").unwrap();
        assert_eq!(config.repair.max_attempts, 5);
        assert_eq!(config.oracle.model, "qwen2.5-coder:14b");
    }

    #[test]
    fn test_parse_number_rejects_garbage() {
        assert_eq!(parse_number::<u32>("K", " 7 ").unwrap(), 7);
        let err = parse_number::<u32>("MEDIC_MAX_ATTEMPTS", "five").unwrap_err();
        assert!(err.to_string().contains("MEDIC_MAX_ATTEMPTS"));
        assert!(parse_number::<u32>("K", "-1").is_err());
    }
}
