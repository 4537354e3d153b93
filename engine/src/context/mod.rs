//! Context gathering: picks the files an oracle needs to see for a diagnosis
//!
//! A compile error yields the broken file plus its local headers; a link
//! error yields every source file mentioning the missing symbol, or the build
//! descriptor when nothing does.

pub mod file_walker;
pub mod gatherer;

pub use file_walker::{normalize_path, FileWalker};
pub use gatherer::ContextGatherer;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One file in a context bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextFile {
    /// Path as shown to the oracle (project-relative where possible)
    pub path: PathBuf,
    /// Content at gather time
    pub content: String,
}

/// Ordered, duplicate-free set of files relevant to one diagnosis.
///
/// Order is discovery order: the primary file (or first symbol hit) first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBundle {
    files: Vec<ContextFile>,
}

impl ContextBundle {
    /// Build a bundle from (path, content) pairs; later duplicates are dropped.
    pub fn from_files<P, I>(files: I) -> Self
    where
        P: Into<PathBuf>,
        I: IntoIterator<Item = (P, String)>,
    {
        let mut bundle = Self::default();
        for (path, content) in files {
            bundle.push(path.into(), content);
        }
        bundle
    }

    /// Append a file unless its path is already present.
    pub(crate) fn push(&mut self, path: PathBuf, content: String) -> bool {
        if self.contains(&path) {
            return false;
        }
        self.files.push(ContextFile { path, content });
        true
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.iter().any(|f| f.path == path)
    }

    pub fn get(&self, path: &Path) -> Option<&str> {
        self.files
            .iter()
            .find(|f| f.path == path)
            .map(|f| f.content.as_str())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContextFile> {
        self.files.iter()
    }

    /// Paths in discovery order
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }

    /// Total bytes of content
    pub fn total_bytes(&self) -> usize {
        self.files.iter().map(|f| f.content.len()).sum()
    }
}
