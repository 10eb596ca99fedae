//! Markdown → HTML engine
//!
//! Wraps comrak with the options chat messages need: significant line
//! breaks, GitHub-flavored tables/strikethrough/autolinks/task lists, and
//! `$`/`$$` math. The math extension only wraps notation in
//! `<span data-math-style=…>`, so malformed formulas can never make it fail.
//!
//! In [`CodeBlockMode::Placeholder`] fenced code goes through
//! [`CodeSummaryAdapter`], which writes a short "language · N lines" card
//! instead of the code itself. Pages showing many messages at once use it to
//! keep output small.

use super::validator::fenced_code_ranges;
use comrak::adapters::SyntaxHighlighterAdapter;
use comrak::{markdown_to_html, markdown_to_html_with_plugins, ComrakOptions, ComrakPlugins};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::LazyLock;

/// Two single-dollar formulas separated only by punctuation
static ADJACENT_FORMULAS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([^$\n]+)\$([,.;:!?，。；：、])\$").unwrap());

/// How fenced code blocks are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeBlockMode {
    /// Real `<pre><code>` markup
    #[default]
    Full,
    /// A summary card with language and line count
    Placeholder,
}

impl FromStr for CodeBlockMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(CodeBlockMode::Full),
            "placeholder" => Ok(CodeBlockMode::Placeholder),
            other => Err(format!("unknown code block mode '{other}'")),
        }
    }
}

pub struct MarkdownEngine {
    options: ComrakOptions<'static>,
}

impl Default for MarkdownEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownEngine {
    pub fn new() -> Self {
        tracing::debug!("Initializing Markdown engine");
        let mut options = ComrakOptions::default();
        options.extension.table = true;
        options.extension.strikethrough = true;
        options.extension.autolink = true;
        options.extension.tasklist = true;
        options.extension.math_dollars = true;
        options.render.hardbreaks = true;
        options.render.unsafe_ = false;
        Self { options }
    }

    pub fn render(&self, markdown: &str, mode: CodeBlockMode) -> String {
        match mode {
            CodeBlockMode::Full => markdown_to_html(markdown, &self.options),
            CodeBlockMode::Placeholder => {
                let adapter = CodeSummaryAdapter;
                let mut plugins = ComrakPlugins::default();
                plugins.render.codefence_syntax_highlighter = Some(&adapter);
                markdown_to_html_with_plugins(markdown, &self.options, &plugins)
            }
        }
    }
}

/// Emits a summary card in place of highlighted code
pub struct CodeSummaryAdapter;

impl SyntaxHighlighterAdapter for CodeSummaryAdapter {
    fn write_highlighted(
        &self,
        output: &mut dyn Write,
        lang: Option<&str>,
        code: &str,
    ) -> io::Result<()> {
        write!(output, "{}", escape_html(&code_summary(lang, code)))
    }

    fn write_pre_tag(
        &self,
        output: &mut dyn Write,
        _attributes: HashMap<String, String>,
    ) -> io::Result<()> {
        output.write_all(b"<pre class=\"chatmd-code-summary\">")
    }

    fn write_code_tag(
        &self,
        output: &mut dyn Write,
        _attributes: HashMap<String, String>,
    ) -> io::Result<()> {
        output.write_all(b"<code>")
    }
}

/// "rust · 3 lines", "code · 1 line"
pub fn code_summary(lang: Option<&str>, code: &str) -> String {
    let lang = lang.filter(|l| !l.is_empty()).unwrap_or("code");
    let lines = code.lines().count();
    let unit = if lines == 1 { "line" } else { "lines" };
    format!("{lang} · {lines} {unit}")
}

/// Insert a space between formulas like `$a$,$b$` so the math extension does
/// not read `$,$` as one formula. Fenced code is copied through unchanged.
pub fn separate_adjacent_formulas(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut last = 0;
    for code in fenced_code_ranges(markdown) {
        out.push_str(&separate_in_text(&markdown[last..code.start]));
        out.push_str(&markdown[code.clone()]);
        last = code.end;
    }
    out.push_str(&separate_in_text(&markdown[last..]));
    out
}

fn separate_in_text(text: &str) -> String {
    let mut current = text.to_string();
    // Each pass consumes the opening `$` of the next formula, so chains need
    // a few passes
    for _ in 0..8 {
        let next = ADJACENT_FORMULAS
            .replace_all(&current, "$$${1}$$${2} $$")
            .into_owned();
        if next == current {
            break;
        }
        current = next;
    }
    current
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_gfm_and_math() {
        let engine = MarkdownEngine::new();
        let html = engine.render(
            "| a | b |\n| --- | --- |\n| 1 | 2 |\n\n~~gone~~ and $x^2$",
            CodeBlockMode::Full,
        );
        assert!(html.contains("<table>"));
        assert!(html.contains("<del>gone</del>"));
        assert!(html.contains("data-math-style=\"inline\""));
    }

    #[test]
    fn line_breaks_are_significant() {
        let html = MarkdownEngine::new().render("one\ntwo", CodeBlockMode::Full);
        assert!(html.contains("<br />"));
    }

    #[test]
    fn raw_html_is_not_passed_through() {
        let html = MarkdownEngine::new().render("<b onclick=\"x\">hi</b>", CodeBlockMode::Full);
        assert!(!html.contains("onclick"));
    }

    #[test]
    fn placeholder_mode_summarizes_code() {
        let md = "```rust\nfn a() {}\nfn b() {}\n```\n";
        let html = MarkdownEngine::new().render(md, CodeBlockMode::Placeholder);
        assert!(html.contains("chatmd-code-summary"));
        assert!(html.contains("rust · 2 lines"));
        assert!(!html.contains("fn a()"));

        let full = MarkdownEngine::new().render(md, CodeBlockMode::Full);
        assert!(full.contains("fn a()"));
    }

    #[test]
    fn adjacent_formulas_are_separated() {
        assert_eq!(separate_adjacent_formulas("$a$,$b$"), "$a$, $b$");
        assert_eq!(separate_adjacent_formulas("$a$,$b$;$c$"), "$a$, $b$; $c$");
        assert_eq!(separate_adjacent_formulas("$a$ and $b$"), "$a$ and $b$");
    }

    #[test]
    fn fenced_code_is_not_rewritten() {
        let md = "$a$,$b$\n\n```sh\necho $x$,$y$\n```\n\n$c$;$d$\n";
        assert_eq!(
            separate_adjacent_formulas(md),
            "$a$, $b$\n\n```sh\necho $x$,$y$\n```\n\n$c$; $d$\n"
        );
        let unclosed = "~~~\n$x$,$y$\n";
        assert_eq!(separate_adjacent_formulas(unclosed), unclosed);
    }

    #[test]
    fn code_block_mode_parses() {
        assert_eq!("placeholder".parse(), Ok(CodeBlockMode::Placeholder));
        assert!("fancy".parse::<CodeBlockMode>().is_err());
    }
}
