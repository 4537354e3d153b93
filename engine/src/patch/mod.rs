//! Patch handling: oracle response parsing and full-file application.
//!
//! The oracle answers with repeated blocks:
//!
//! ~~~text
//! FILE: src/utils.cpp
//! ```cpp
//! ...full replacement content...
//! ```
//! ~~~
//!
//! [`parser::parse_response`] turns that text into a [`PatchSet`];
//! [`applier::PatchApplier`] writes it to disk with `.bak` backups.

pub mod applier;
pub mod parser;

pub use applier::{ApplyReport, ConfinedPatch, PatchApplier};
pub use parser::parse_response;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why an oracle response could not be turned into an applicable patch.
///
/// All variants are non-fatal: the attempt is spent and the loop moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchFormatError {
    /// No `FILE:` marker line anywhere in the response
    #[error("No FILE: markers found in oracle response")]
    NoMarkersFound,

    /// A block opened a code fence that never closed
    #[error("Unterminated code fence in block for {path}")]
    UnterminatedFence { path: PathBuf },

    /// A marker line carried no path
    #[error("FILE: marker without a path on line {line}")]
    EmptyPath { line: usize },

    /// A block had nothing to write
    #[error("Empty replacement content for {path}")]
    EmptyContent { path: PathBuf },

    /// A target resolves outside the project root
    #[error("Refusing to write outside the project root: {path}")]
    OutsideProject { path: PathBuf },
}

/// One file the oracle chose to rewrite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchEntry {
    /// Path exactly as written after the marker
    pub path: PathBuf,
    /// Full replacement content (already trimmed)
    pub content: String,
}

/// Proposed full-file replacements, one per path, in response order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchSet {
    entries: Vec<PatchEntry>,
}

impl PatchSet {
    /// Insert or replace the content for `path`. A repeated path keeps its
    /// first position and takes the latest content.
    pub fn insert(&mut self, path: PathBuf, content: String) {
        match self.entries.iter_mut().find(|e| e.path == path) {
            Some(existing) => existing.content = content,
            None => self.entries.push(PatchEntry { path, content }),
        }
    }

    pub fn get(&self, path: &Path) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.path == path)
            .map(|e| e.content.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PatchEntry> {
        self.entries.iter()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|e| e.path.clone()).collect()
    }
}

impl FromIterator<(PathBuf, String)> for PatchSet {
    fn from_iter<I: IntoIterator<Item = (PathBuf, String)>>(iter: I) -> Self {
        let mut set = Self::default();
        for (path, content) in iter {
            set.insert(path, content);
        }
        set
    }
}

/// Backup location for `path`: same directory, `.bak` appended to the name.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".bak");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_path_last_content_wins() {
        let set: PatchSet = [
            (PathBuf::from("a.cpp"), "one".to_string()),
            (PathBuf::from("b.cpp"), "two".to_string()),
            (PathBuf::from("a.cpp"), "three".to_string()),
        ]
        .into_iter()
        .collect();

        assert_eq!(set.len(), 2);
        assert_eq!(set.paths()[0], PathBuf::from("a.cpp"));
        assert_eq!(set.get(Path::new("a.cpp")), Some("three"));
    }

    #[test]
    fn test_backup_path() {
        assert_eq!(
            backup_path(Path::new("src/utils.cpp")),
            PathBuf::from("src/utils.cpp.bak")
        );
        assert_eq!(backup_path(Path::new("main.c")), PathBuf::from("main.c.bak"));
    }
}
