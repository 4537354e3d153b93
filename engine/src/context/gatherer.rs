//! Diagnosis-driven context gathering
//!
//! One gatherer, dispatching on the [`DiagnosedError`] variant:
//! - compile error → the broken file, then its `#include "..."` headers
//!   (one level, textual order, missing ones skipped)
//! - link error → every source file containing the bare symbol, falling back
//!   to the build descriptor

use crate::config::RepairConfig;
use crate::context::file_walker::{normalize_path, FileWalker};
use crate::context::ContextBundle;
use crate::error::{RepairError, RepairResult};
use crate::feedback::classifier::{bare_symbol, DiagnosedError};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Local (quoted) include directive at the start of a line
static LOCAL_INCLUDE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)^[ \t]*#[ \t]*include[ \t]+"([^"\n]+)""#).unwrap());

/// Reads the files relevant to a diagnosis from the project tree
#[derive(Debug, Clone)]
pub struct ContextGatherer {
    root: PathBuf,
    build_dir: PathBuf,
    extensions: BTreeSet<String>,
    build_descriptor: PathBuf,
}

impl ContextGatherer {
    pub fn from_config(config: &RepairConfig) -> Self {
        Self {
            root: config.project_root.clone(),
            build_dir: config.build_dir_path(),
            extensions: config.source_extensions.clone(),
            build_descriptor: config.build_descriptor.clone(),
        }
    }

    /// Gather the bundle for `diagnosis`. Unclassified failures yield an
    /// empty bundle; the repair loop stops before asking for one.
    pub fn gather(&self, diagnosis: &DiagnosedError) -> RepairResult<ContextBundle> {
        match diagnosis {
            DiagnosedError::CompileError { path, .. } => self.gather_compile(path),
            DiagnosedError::LinkError { symbol } => self.gather_link(symbol),
            DiagnosedError::Unclassified { .. } => Ok(ContextBundle::default()),
        }
    }

    fn gather_compile(&self, path: &Path) -> RepairResult<ContextBundle> {
        let key = normalize_path(path);
        let content = std::fs::read_to_string(self.on_disk(&key))
            .map_err(|e| RepairError::source_read(&key, e))?;

        let base_dir = key.parent().map(Path::to_path_buf).unwrap_or_default();
        let includes: Vec<String> = local_includes(&content)
            .into_iter()
            .map(String::from)
            .collect();

        let mut bundle = ContextBundle::default();
        bundle.push(key, content);

        for include in &includes {
            let header_key = normalize_path(&base_dir.join(include));
            if bundle.contains(&header_key) {
                continue;
            }
            let header_path = self.on_disk(&header_key);
            if !header_path.is_file() {
                tracing::debug!(include = %include, "Local include not found, skipping");
                continue;
            }
            match std::fs::read_to_string(&header_path) {
                Ok(text) => {
                    bundle.push(header_key, text);
                }
                Err(e) => {
                    tracing::warn!(path = %header_path.display(), error = %e, "Skipping unreadable header");
                }
            }
        }

        tracing::info!(
            files = bundle.len(),
            bytes = bundle.total_bytes(),
            "Gathered compile-error context"
        );
        Ok(bundle)
    }

    fn gather_link(&self, symbol: &str) -> RepairResult<ContextBundle> {
        let needle = bare_symbol(symbol);
        let mut bundle = ContextBundle::default();

        if !needle.is_empty() {
            tracing::info!(symbol = %needle, "Scanning project for symbol");
            let walker = FileWalker::new(&self.root).skip_dir(&self.build_dir);
            for file in walker.source_files(&self.extensions) {
                let text = match std::fs::read_to_string(&file) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(path = %file.display(), error = %e, "Skipping unreadable file");
                        continue;
                    }
                };
                if text.contains(&needle) {
                    bundle.push(self.project_relative(&file), text);
                }
            }
        }

        if bundle.is_empty() {
            tracing::warn!(
                symbol = %needle,
                descriptor = %self.build_descriptor.display(),
                "Symbol not found in project text; sending build descriptor"
            );
            let descriptor = self.on_disk(&self.build_descriptor);
            let text = std::fs::read_to_string(&descriptor)
                .map_err(|e| RepairError::source_read(&self.build_descriptor, e))?;
            bundle.push(self.build_descriptor.clone(), text);
        }

        tracing::info!(
            files = bundle.len(),
            bytes = bundle.total_bytes(),
            "Gathered link-error context"
        );
        Ok(bundle)
    }

    /// Where a bundle key lives on disk
    fn on_disk(&self, key: &Path) -> PathBuf {
        if key.is_absolute() {
            key.to_path_buf()
        } else {
            self.root.join(key)
        }
    }

    fn project_relative(&self, path: &Path) -> PathBuf {
        match path.strip_prefix(&self.root) {
            Ok(relative) => normalize_path(relative),
            Err(_) => normalize_path(path),
        }
    }
}

/// Targets of `#include "..."` directives in textual order
fn local_includes(source: &str) -> Vec<&str> {
    LOCAL_INCLUDE_PATTERN
        .captures_iter(source)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim()))
        .filter(|s| !s.is_empty())
        .collect()
}
