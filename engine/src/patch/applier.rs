//! Full-file patch application with `.bak` backups.
//!
//! Application is two-phase: [`PatchApplier::confine`] checks every target
//! against the project root without touching disk, then
//! [`PatchApplier::apply`] writes. Writes are independent; a failure part-way
//! leaves earlier files rewritten.

use super::{backup_path, PatchEntry, PatchFormatError, PatchSet};
use crate::context::normalize_path;
use crate::error::{RepairError, RepairResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A patch set whose every target lies inside the project root
#[derive(Debug)]
pub struct ConfinedPatch<'a> {
    targets: Vec<(&'a PatchEntry, PathBuf)>,
}

impl ConfinedPatch<'_> {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// What one `apply` call changed on disk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    /// Patch paths written, in patch order
    pub written: Vec<PathBuf>,
    /// Backups created or overwritten
    pub backups: Vec<PathBuf>,
}

/// Writes patch sets into a project tree
#[derive(Debug, Clone)]
pub struct PatchApplier {
    root: PathBuf,
}

impl PatchApplier {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Resolve every target, rejecting any that escapes the project root.
    pub fn confine<'a>(&self, set: &'a PatchSet) -> Result<ConfinedPatch<'a>, PatchFormatError> {
        let canon_root = self
            .root
            .canonicalize()
            .unwrap_or_else(|_| normalize_path(&self.root));
        let root = if self.root.is_absolute() {
            normalize_path(&self.root)
        } else {
            canon_root.clone()
        };

        let mut targets = Vec::with_capacity(set.len());
        for entry in set.iter() {
            let outside = || PatchFormatError::OutsideProject {
                path: entry.path.clone(),
            };
            let resolved = normalize_path(&root.join(&entry.path));
            if resolved == root || !resolved.starts_with(&root) {
                return Err(outside());
            }
            // Symlinked directories inside the tree may still point elsewhere
            if let Some(real) = existing_ancestor(&resolved).and_then(|p| p.canonicalize().ok()) {
                if !real.starts_with(&canon_root) {
                    return Err(outside());
                }
            }
            targets.push((entry, resolved));
        }
        Ok(ConfinedPatch { targets })
    }

    /// Write every entry. An existing target is first copied to
    /// `<name>.bak`, replacing any earlier backup.
    pub fn apply(&self, patch: &ConfinedPatch<'_>) -> RepairResult<ApplyReport> {
        let mut report = ApplyReport::default();

        for (entry, target) in &patch.targets {
            if target.is_file() {
                let backup = backup_path(target);
                fs::copy(target, &backup).map_err(|e| RepairError::write(&backup, e))?;
                report.backups.push(backup);
            } else if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| RepairError::write(parent, e))?;
            }

            fs::write(target, entry.content.trim()).map_err(|e| RepairError::write(target, e))?;
            tracing::info!(path = %entry.path.display(), bytes = entry.content.len(), "Applied patch");
            report.written.push(entry.path.clone());
        }

        Ok(report)
    }
}

/// Deepest existing path at or above `path`
fn existing_ancestor(path: &Path) -> Option<&Path> {
    path.ancestors().find(|p| p.exists())
}
