//! Code-repair oracle: request formatting and the transport seam.
//!
//! The loop only sees [`PatchOracle`]: text in, text out. Interpreting the
//! answer is the patch parser's job.

pub mod client;

pub use client::{ChatCompletionsOracle, OracleConfig};

use crate::context::ContextBundle;
use crate::error::OracleError;
use crate::feedback::classifier::DiagnosedError;
use async_trait::async_trait;
use std::fmt::Write as _;

/// Everything the oracle is shown for one attempt
#[derive(Debug, Clone)]
pub struct FixRequest {
    pub diagnosis: DiagnosedError,
    pub bundle: ContextBundle,
    pub raw_log: String,
}

impl FixRequest {
    pub fn new(diagnosis: DiagnosedError, bundle: ContextBundle, raw_log: impl Into<String>) -> Self {
        Self {
            diagnosis,
            bundle,
            raw_log: raw_log.into(),
        }
    }

    /// Render the single user message sent to the oracle.
    pub fn render(&self) -> String {
        let mut prompt = String::from("You are an expert C/C++ build repair agent.\n\n");
        prompt.push_str(&self.instructions());

        prompt.push_str("\nERROR LOG:\n");
        prompt.push_str(self.raw_log.trim_end());
        prompt.push_str("\n\nPROJECT CONTEXT:\n");
        for file in self.bundle.iter() {
            let _ = writeln!(prompt, "--- FILE: {} ---", file.path.display());
            prompt.push_str(&file.content);
            if !file.content.ends_with('\n') {
                prompt.push('\n');
            }
            prompt.push('\n');
        }

        prompt.push_str(
            "OUTPUT FORMAT:\n\
             For every file you change, write a line `FILE: <path relative to the project root>`\n\
             followed by the COMPLETE new content of that file in one fenced code block:\n\
             FILE: <path>\n\
             ```cpp\n\
             ... full content ...\n\
             ```\n",
        );
        prompt
    }

    fn instructions(&self) -> String {
        match &self.diagnosis {
            DiagnosedError::CompileError {
                path,
                line,
                column,
                message,
            } => format!(
                "This is a COMPILATION ERROR in {} at line {line}, column {column}: {message}\n\
                 TASK: Fix the error. Return the single corrected file in full.\n",
                path.display()
            ),
            DiagnosedError::LinkError { symbol } => format!(
                "This is a LINKER ERROR: undefined symbol `{symbol}`.\n\
                 The symbol is declared but never implemented.\n\
                 TASK: Implement it. You may add the implementation to one of the files \
                 shown or create a new source file (and register it in the build \
                 descriptor if needed). Return every file you modify in full.\n"
            ),
            DiagnosedError::Unclassified { .. } => {
                "The build failed for an unknown reason.\n\
                 TASK: Fix the project so that it builds. Return every file you modify in full.\n"
                    .to_string()
            }
        }
    }
}

/// A text-in/text-out code-repair service.
///
/// Implementations do not retry. An empty answer is returned as-is; only
/// transport failures are errors.
#[async_trait]
pub trait PatchOracle: Send + Sync {
    async fn request_fix(&self, request: &FixRequest) -> Result<String, OracleError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_compile_prompt_labels_files_in_order() {
        let request = FixRequest::new(
            DiagnosedError::CompileError {
                path: PathBuf::from("src/main.cpp"),
                line: 12,
                column: 3,
                message: "expected ';'".to_string(),
            },
            ContextBundle::from_files([
                ("src/main.cpp", "int main() { return 0 }".to_string()),
                ("include/util.hpp", "#pragma once\n".to_string()),
            ]),
            "src/main.cpp:12:3: error: expected ';'\n",
        );

        let prompt = request.render();
        assert!(prompt.contains("COMPILATION ERROR in src/main.cpp at line 12, column 3"));
        assert!(prompt.contains("ERROR LOG:\nsrc/main.cpp:12:3: error: expected ';'\n"));
        let main_at = prompt.find("--- FILE: src/main.cpp ---").unwrap();
        let util_at = prompt.find("--- FILE: include/util.hpp ---").unwrap();
        assert!(main_at < util_at);
        assert!(prompt.contains("FILE: <path>"));
    }

    #[test]
    fn test_link_prompt_allows_new_file() {
        let request = FixRequest::new(
            DiagnosedError::LinkError {
                symbol: "Foo::bar".to_string(),
            },
            ContextBundle::from_files([("CMakeLists.txt", "project(x)".to_string())]),
            "undefined reference to `Foo::bar(int)'",
        );

        let prompt = request.render();
        assert!(prompt.contains("LINKER ERROR: undefined symbol `Foo::bar`"));
        assert!(prompt.contains("create a new source file"));
        assert!(prompt.contains("--- FILE: CMakeLists.txt ---\nproject(x)\n"));
    }
}
