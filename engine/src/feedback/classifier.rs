//! GCC/Clang build log classification
//!
//! Turns a merged configure/build log into a single [`DiagnosedError`]. The
//! classifier is pure: the same log always yields the same diagnosis.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// `path:line:col: [fatal ]error: message` at the start of a line
static COMPILE_ERROR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^([^:\n]+):(\d+):(\d+):[ \t]+(?:fatal[ \t]+)?error:[ \t]+(.+)$").unwrap()
});

/// GNU ld: undefined reference to `sym'; lld: undefined symbol: sym
static LINK_ERROR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:undefined reference to|undefined symbol:)[ \t]*[`'"]?([^`'"\n]+)"#).unwrap()
});

/// Linker-synthesized symbol prefixes that name a class rather than a function
const SYNTHETIC_SYMBOL_PREFIXES: &[&str] = &["vtable for ", "typeinfo name for ", "typeinfo for "];

/// Classified interpretation of a failed build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosedError {
    /// A compiler diagnostic anchored to a source location
    CompileError {
        path: PathBuf,
        line: u32,
        column: u32,
        message: String,
    },
    /// An unresolved symbol reported by the linker
    LinkError { symbol: String },
    /// Neither grammar matched; carries the end of the log for the operator
    Unclassified { log_tail: String },
}

impl DiagnosedError {
    /// Whether the loop can act on this diagnosis
    pub fn is_classified(&self) -> bool {
        !matches!(self, Self::Unclassified { .. })
    }

    /// Short kind label for logs and reports
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CompileError { .. } => "compile_error",
            Self::LinkError { .. } => "link_error",
            Self::Unclassified { .. } => "unclassified",
        }
    }
}

impl std::fmt::Display for DiagnosedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CompileError {
                path,
                line,
                column,
                message,
            } => write!(f, "{}:{}:{}: {}", path.display(), line, column, message),
            Self::LinkError { symbol } => write!(f, "undefined symbol '{}'", symbol),
            Self::Unclassified { .. } => write!(f, "unclassified build failure"),
        }
    }
}

/// Classifier for GCC/Clang/ld output
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    /// Absolute working directory used to relativize reported paths
    working_dir: PathBuf,
    /// Characters of log kept for unclassified failures
    tail_chars: usize,
}

impl ErrorClassifier {
    /// Create a classifier. `working_dir` should be absolute for path
    /// normalization to take effect.
    pub fn new(working_dir: impl AsRef<Path>, tail_chars: usize) -> Self {
        Self {
            working_dir: working_dir.as_ref().to_path_buf(),
            tail_chars,
        }
    }

    /// Classify a build log. Compile errors take precedence over link errors:
    /// a project with real compile errors never reaches the link stage.
    pub fn classify(&self, log: &str) -> DiagnosedError {
        if let Some(diagnosis) = self.find_compile_error(log) {
            return diagnosis;
        }
        if let Some(diagnosis) = find_link_error(log) {
            return diagnosis;
        }
        DiagnosedError::Unclassified {
            log_tail: log_tail(log, self.tail_chars).to_string(),
        }
    }

    fn find_compile_error(&self, log: &str) -> Option<DiagnosedError> {
        COMPILE_ERROR_PATTERN.captures_iter(log).find_map(|caps| {
            let line = caps[2].parse().ok()?;
            let column = caps[3].parse().ok()?;
            Some(DiagnosedError::CompileError {
                path: self.relativize(Path::new(caps[1].trim())),
                line,
                column,
                message: caps[4].trim_end().to_string(),
            })
        })
    }

    /// Strip the working directory from absolute paths that live under it
    fn relativize(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            if let Ok(relative) = path.strip_prefix(&self.working_dir) {
                if !relative.as_os_str().is_empty() {
                    return relative.to_path_buf();
                }
            }
        }
        path.to_path_buf()
    }
}

fn find_link_error(log: &str) -> Option<DiagnosedError> {
    LINK_ERROR_PATTERN.captures_iter(log).find_map(|caps| {
        let symbol = bare_symbol(&caps[1]);
        if symbol.is_empty() {
            None
        } else {
            Some(DiagnosedError::LinkError { symbol })
        }
    })
}

/// Reduce a linker symbol to the name a source search can find: drop the
/// argument list (everything from the first `(`) and synthetic prefixes
/// such as `vtable for `.
pub fn bare_symbol(raw: &str) -> String {
    let name = raw.split('(').next().unwrap_or_default().trim();
    let name = SYNTHETIC_SYMBOL_PREFIXES
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
        .unwrap_or(name);
    name.trim().to_string()
}

/// Last `max_chars` characters of `log`, cut on a character boundary
pub fn log_tail(log: &str, max_chars: usize) -> &str {
    if max_chars == 0 {
        return "";
    }
    match log.char_indices().rev().nth(max_chars - 1) {
        Some((idx, _)) => &log[idx..],
        None => log,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> ErrorClassifier {
        ErrorClassifier::new("/work/project", 500)
    }

    #[test]
    fn test_compile_error_absolute_outside_root() {
        let diag = classifier().classify("/a/b.cpp:12:3: error: expected ';'");
        assert_eq!(
            diag,
            DiagnosedError::CompileError {
                path: PathBuf::from("/a/b.cpp"),
                line: 12,
                column: 3,
                message: "expected ';'".to_string(),
            }
        );
    }

    #[test]
    fn test_compile_error_relativized_under_root() {
        let log = "[ 50%] Building CXX object CMakeFiles/app.dir/src/main.cpp.o\n\
                   /work/project/src/main.cpp:7:5: error: 'foo' was not declared in this scope\n\
                   make[2]: *** [CMakeFiles/app.dir/build.make:76] Error 1\n";
        match classifier().classify(log) {
            DiagnosedError::CompileError {
                path,
                line,
                column,
                message,
            } => {
                assert_eq!(path, PathBuf::from("src/main.cpp"));
                assert_eq!((line, column), (7, 5));
                assert_eq!(message, "'foo' was not declared in this scope");
            }
            other => panic!("expected compile error, got {other:?}"),
        }
    }

    #[test]
    fn test_fatal_error_and_crlf() {
        let log = "src/a.c:1:10: fatal error: missing.h: No such file or directory\r\n";
        match classifier().classify(log) {
            DiagnosedError::CompileError { path, message, .. } => {
                assert_eq!(path, PathBuf::from("src/a.c"));
                assert_eq!(message, "missing.h: No such file or directory");
            }
            other => panic!("expected compile error, got {other:?}"),
        }
    }

    #[test]
    fn test_earliest_compile_error_wins() {
        let log = "src/b.cpp:3:1: error: second\nsrc/a.cpp:9:2: error: later\n";
        match classifier().classify(log) {
            DiagnosedError::CompileError { path, line, .. } => {
                assert_eq!(path, PathBuf::from("src/b.cpp"));
                assert_eq!(line, 3);
            }
            other => panic!("expected compile error, got {other:?}"),
        }
    }

    #[test]
    fn test_warning_is_not_an_error() {
        let log = "src/a.cpp:3:1: warning: unused variable 'x'\n";
        assert!(!classifier().classify(log).is_classified());
    }

    #[test]
    fn test_gnu_link_error_strips_arguments() {
        let diag = classifier().classify("undefined reference to `Foo::bar(int)'");
        assert_eq!(
            diag,
            DiagnosedError::LinkError {
                symbol: "Foo::bar".to_string()
            }
        );
    }

    #[test]
    fn test_lld_link_error() {
        let log = "ld.lld: error: undefined symbol: specializedSolver(Matrix<float> const&)\n\
                   >>> referenced by main.cpp\n";
        assert_eq!(
            classifier().classify(log),
            DiagnosedError::LinkError {
                symbol: "specializedSolver".to_string()
            }
        );
    }

    #[test]
    fn test_vtable_symbol_reduced_to_class() {
        let log = "main.o: in function `Shape::Shape()':\nundefined reference to `vtable for Shape'\n";
        assert_eq!(
            classifier().classify(log),
            DiagnosedError::LinkError {
                symbol: "Shape".to_string()
            }
        );
    }

    #[test]
    fn test_compile_error_precedes_link_error() {
        let log = "undefined reference to `later'\nsrc/x.cpp:1:1: error: boom\n";
        assert_eq!(classifier().classify(log).kind(), "compile_error");
    }

    #[test]
    fn test_unclassified_keeps_tail() {
        let log = format!("{}CMake Error: something odd", "x".repeat(1000));
        match classifier().classify(&log) {
            DiagnosedError::Unclassified { log_tail } => {
                assert_eq!(log_tail.chars().count(), 500);
                assert!(log_tail.ends_with("CMake Error: something odd"));
            }
            other => panic!("expected unclassified, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_is_deterministic() {
        let c = classifier();
        let log = "a.cpp:1:2: error: x\nundefined reference to `y'\n";
        let first = c.classify(log);
        for _ in 0..10 {
            assert_eq!(c.classify(log), first);
        }
    }

    #[test]
    fn test_log_tail_char_boundary() {
        assert_eq!(log_tail("héllo wörld", 5), "wörld");
        assert_eq!(log_tail("short", 100), "short");
        assert_eq!(log_tail("abc", 0), "");
    }

    #[test]
    fn test_bare_symbol() {
        assert_eq!(bare_symbol(" ns::f(int, char) "), "ns::f");
        assert_eq!(bare_symbol("typeinfo for Base"), "Base");
        assert_eq!(bare_symbol("plain_c_fn"), "plain_c_fn");
    }
}
