//! Input validation for the rendering direction
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. size cap
//! 2. bracket/parenthesis nesting depth
//! 3. dangerous patterns (outside fenced code)
//!
//! A failure is data, not control flow: the [`ValidationResult`] always
//! carries a `sanitized` text that is safe to fall back to.

use crate::error::ErrorKind;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::LazyLock;

/// Deepest `[`/`(` nesting accepted before downstream parsers risk
/// pathological backtracking
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 50;

pub const TRUNCATION_MARKER: &str = "\n\n[Content truncated]";

static LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\[\]]*)\]\([^()]*\)").unwrap());

/// Fenced code regions, including an unclosed fence running to the end
static FENCED_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]{0,3}```[^\n]*\n(?:[\s\S]*?^[ \t]{0,3}```[ \t]*$|[\s\S]*\z)|^[ \t]{0,3}~~~[^\n]*\n(?:[\s\S]*?^[ \t]{0,3}~~~[ \t]*$|[\s\S]*\z)")
        .unwrap()
});

static DANGEROUS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)<script\b[^>]*>[\s\S]*?</script\s*>",
        r"(?i)<script\b[^>]*>?",
        r"(?i)</script\s*>",
        r"(?i)javascript\s*:",
        r"(?i)vbscript\s*:",
        r"(?i)data\s*:\s*text/html",
        r"(?i)<iframe\b[^>]*>[\s\S]*?</iframe\s*>",
        r"(?i)<iframe\b[^>]*>?",
        r#"(?i)<[a-z][^>]*\son[a-z]+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]*)[^>]*>?"#,
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

/// Outcome of [`InputValidator::validate`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    /// Usable text: the input itself when valid, a truncated, flattened or
    /// stripped version otherwise
    pub sanitized: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl ValidationResult {
    fn ok(text: &str) -> Self {
        Self {
            valid: true,
            sanitized: text.to_string(),
            error: None,
        }
    }

    fn invalid(error: ErrorKind, sanitized: String) -> Self {
        Self {
            valid: false,
            sanitized,
            error: Some(error),
        }
    }
}

/// Validates and cleans raw Markdown before rendering
#[derive(Debug, Clone)]
pub struct InputValidator {
    max_nesting_depth: usize,
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl InputValidator {
    pub fn new() -> Self {
        Self::with_max_nesting_depth(DEFAULT_MAX_NESTING_DEPTH)
    }

    pub fn with_max_nesting_depth(max_nesting_depth: usize) -> Self {
        Self { max_nesting_depth }
    }

    pub fn validate(&self, markdown: &str, max_size: usize) -> ValidationResult {
        if let Some(truncated) = truncate_chars(markdown, max_size) {
            tracing::debug!(max_size, "Markdown exceeds size cap");
            return ValidationResult::invalid(
                ErrorKind::ContentTooLarge,
                format!("{truncated}{TRUNCATION_MARKER}"),
            );
        }

        if nesting_depth(markdown) > self.max_nesting_depth {
            tracing::debug!(limit = self.max_nesting_depth, "Markdown nesting too deep");
            return ValidationResult::invalid(ErrorKind::NestingTooDeep, flatten_links(markdown));
        }

        let dangerous = dangerous_ranges(markdown);
        if !dangerous.is_empty() {
            tracing::debug!(matches = dangerous.len(), "Dangerous content found");
            return ValidationResult::invalid(
                ErrorKind::DangerousContent,
                remove_ranges(markdown, &dangerous),
            );
        }

        ValidationResult::ok(markdown)
    }
}

/// The first `max` characters, or `None` when the text already fits
fn truncate_chars(text: &str, max: usize) -> Option<&str> {
    text.char_indices().nth(max).map(|(cut, _)| &text[..cut])
}

/// Maximum bracket/parenthesis depth, with closers floored at zero
pub fn nesting_depth(text: &str) -> usize {
    let mut depth = 0usize;
    let mut max_depth = 0usize;
    for c in text.chars() {
        match c {
            '[' | '(' => {
                depth += 1;
                max_depth = max_depth.max(depth);
            }
            ']' | ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    max_depth
}

/// Collapse `[text](url)` links into `text`, innermost first
fn flatten_links(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = LINK.replace_all(&current, "$1").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Byte ranges of fenced code blocks
pub fn fenced_code_ranges(text: &str) -> Vec<Range<usize>> {
    FENCED_CODE.find_iter(text).map(|m| m.range()).collect()
}

/// Byte ranges of dangerous matches that lie outside fenced code
fn dangerous_ranges(text: &str) -> Vec<Range<usize>> {
    let code = fenced_code_ranges(text);
    let mut ranges = Vec::new();

    let mut start = 0;
    let mut gaps = Vec::new();
    for block in &code {
        if block.start > start {
            gaps.push(start..block.start);
        }
        start = block.end;
    }
    if start < text.len() {
        gaps.push(start..text.len());
    }

    for gap in gaps {
        let segment = &text[gap.clone()];
        for pattern in DANGEROUS_PATTERNS.iter() {
            for m in pattern.find_iter(segment) {
                ranges.push(gap.start + m.start()..gap.start + m.end());
            }
        }
    }

    merge_ranges(ranges)
}

fn merge_ranges(mut ranges: Vec<Range<usize>>) -> Vec<Range<usize>> {
    ranges.sort_by_key(|r| (r.start, r.end));
    let mut merged: Vec<Range<usize>> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
            _ => merged.push(range),
        }
    }
    merged
}

fn remove_ranges(text: &str, ranges: &[Range<usize>]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for range in ranges {
        out.push_str(&text[cursor..range.start]);
        cursor = range.end;
    }
    out.push_str(&text[cursor..]);
    out
}
