//! Line-oriented parser for oracle responses.
//!
//! A response is a sequence of blocks, each introduced by a `FILE: <path>`
//! marker line. Inside a block, the first fence line opens extraction and a
//! line of bare backticks closes it; text around the fence is commentary and
//! is dropped. A block without any fence is taken whole.

use super::{PatchFormatError, PatchSet};
use std::path::PathBuf;

const MARKER: &str = "FILE:";
const FENCE: &str = "```";

/// Characters models like to wrap paths in
const PATH_WRAPPERS: &[char] = &['`', '"', '\'', '*'];

struct Block<'a> {
    path: PathBuf,
    lines: Vec<&'a str>,
    fence: Fence,
}

/// Where a block is relative to its (first) fence
#[derive(Clone, Copy, PartialEq, Eq)]
enum Fence {
    Before,
    Open,
    Closed,
}

impl Block<'_> {
    fn track_fence(&mut self, line: &str) {
        self.fence = match self.fence {
            Fence::Before if line.trim_start().starts_with(FENCE) => Fence::Open,
            Fence::Open if is_closing_fence(line) => Fence::Closed,
            other => other,
        };
    }
}

/// Parse an oracle response into a patch set.
pub fn parse_response(response: &str) -> Result<PatchSet, PatchFormatError> {
    let mut blocks: Vec<Block<'_>> = Vec::new();

    for (idx, line) in response.lines().enumerate() {
        // File bodies may contain lines that look like markers
        let in_fence = blocks.last().is_some_and(|b| b.fence == Fence::Open);
        match marker_rest(line) {
            Some(rest) if !in_fence => {
                let path =
                    marker_path(rest).ok_or(PatchFormatError::EmptyPath { line: idx + 1 })?;
                blocks.push(Block {
                    path,
                    lines: Vec::new(),
                    fence: Fence::Before,
                });
            }
            _ => {
                if let Some(block) = blocks.last_mut() {
                    block.track_fence(line);
                    block.lines.push(line);
                }
            }
        }
    }

    if blocks.is_empty() {
        return Err(PatchFormatError::NoMarkersFound);
    }

    let mut set = PatchSet::default();
    for block in blocks {
        let content = block_content(&block)?;
        if content.is_empty() {
            return Err(PatchFormatError::EmptyContent { path: block.path });
        }
        set.insert(block.path, content);
    }
    Ok(set)
}

/// Text after `FILE:` if `line` is a marker line.
fn marker_rest(line: &str) -> Option<&str> {
    line.trim_start().strip_prefix(MARKER)
}

fn marker_path(rest: &str) -> Option<PathBuf> {
    let token = rest.split_whitespace().next()?;
    let token = token.trim_matches(PATH_WRAPPERS);
    if token.is_empty() {
        None
    } else {
        Some(PathBuf::from(token))
    }
}

fn is_closing_fence(line: &str) -> bool {
    let line = line.trim();
    line.len() >= FENCE.len() && line.chars().all(|c| c == '`')
}

fn block_content(block: &Block<'_>) -> Result<String, PatchFormatError> {
    let Some(open) = block
        .lines
        .iter()
        .position(|l| l.trim_start().starts_with(FENCE))
    else {
        return Ok(block.lines.join("\n").trim().to_string());
    };

    let body = &block.lines[open + 1..];
    match body.iter().position(|l| is_closing_fence(l)) {
        Some(close) => Ok(body[..close].join("\n").trim().to_string()),
        None => Err(PatchFormatError::UnterminatedFence {
            path: block.path.clone(),
        }),
    }
}
