//! File walker: project source discovery using the `ignore` crate
//!
//! Unlike an editor-style walk, nothing is filtered by `.gitignore` or by
//! hidden-file rules: a symbol search must not miss the one file that
//! implements the symbol. Only VCS metadata and the build-output directory
//! are pruned.

use ignore::WalkBuilder;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

/// Version-control metadata directories never descended into.
const VCS_DIRS: &[&str] = &[".git", ".hg", ".svn"];

/// Walks a project tree for C-family source files.
pub struct FileWalker {
    root: PathBuf,
    skip_dirs: Vec<PathBuf>,
}

impl FileWalker {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            skip_dirs: Vec::new(),
        }
    }

    /// Prune `dir` (and everything below it) from the walk.
    pub fn skip_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.skip_dirs.push(normalize_path(dir.as_ref()));
        self
    }

    /// Return all files under root whose extension is in `extensions`,
    /// sorted by path.
    pub fn source_files(&self, extensions: &BTreeSet<String>) -> Vec<PathBuf> {
        let skip_dirs = self.skip_dirs.clone();
        let walker = WalkBuilder::new(&self.root)
            .hidden(false)
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .parents(false)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                if !is_dir {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                if VCS_DIRS.contains(&name.as_ref()) {
                    return false;
                }
                let normalized = normalize_path(entry.path());
                !skip_dirs.iter().any(|skip| *skip == normalized)
            })
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unreadable walk entry");
                    continue;
                }
            };
            let path = entry.path();
            let matches_ext = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| extensions.contains(ext));
            if matches_ext && path.is_file() {
                files.push(path.to_path_buf());
            }
        }

        files.sort();
        files
    }
}

/// Lexically normalize a path: drop `.` components and fold `..` into the
/// preceding component where one exists. Does not touch the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn exts() -> BTreeSet<String> {
        ["cpp", "hpp", "h"].iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn test_source_files_filters_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("main.cpp"), "int main() {}").unwrap();
        fs::write(src.join("util.hpp"), "#pragma once").unwrap();
        fs::write(src.join("notes.txt"), "not source").unwrap();

        let files = FileWalker::new(dir.path()).source_files(&exts());

        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("src/main.cpp"));
        assert!(files[1].ends_with("src/util.hpp"));
    }

    #[test]
    fn test_skips_build_dir_and_vcs() {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["build/gen", ".git/objects", "lib"] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        fs::write(dir.path().join("build/gen/moc.cpp"), "").unwrap();
        fs::write(dir.path().join(".git/objects/x.h"), "").unwrap();
        fs::write(dir.path().join("lib/a.cpp"), "").unwrap();

        let files = FileWalker::new(dir.path())
            .skip_dir(dir.path().join("build"))
            .source_files(&exts());

        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("lib/a.cpp"));
    }

    #[test]
    fn test_gitignored_files_still_found() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".gitignore"), "generated.cpp\n").unwrap();
        fs::write(dir.path().join("generated.cpp"), "void f() {}").unwrap();

        let files = FileWalker::new(dir.path()).source_files(&exts());
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("src/../include/matrix.hpp")),
            PathBuf::from("include/matrix.hpp")
        );
        assert_eq!(
            normalize_path(Path::new("./build")),
            PathBuf::from("build")
        );
        assert_eq!(
            normalize_path(Path::new("../outside.h")),
            PathBuf::from("../outside.h")
        );
        assert_eq!(normalize_path(Path::new("/a/../../b")), PathBuf::from("/b"));
        assert_eq!(normalize_path(Path::new("src/..")), PathBuf::from("."));
    }
}
