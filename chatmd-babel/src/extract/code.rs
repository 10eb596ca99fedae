//! Code block extraction
//!
//! Every `<pre>` with a `<code>` child becomes a fenced Markdown block. The
//! language comes from the first hint found:
//!
//! | Hint                          | Example                                   |
//! |-------------------------------|-------------------------------------------|
//! | `language-xxx` / `lang-xxx`   | `<code class="language-rust">`            |
//! | `hljs xxx` class pair         | `<code class="hljs python">`              |
//! | `data-language` attribute     | `<pre data-language="go">`                |
//!
//! The raw text content is used, not the inner HTML, so escaped entities in
//! the source are not interpreted twice.
//!
//! Blocks inside a `<table>` are skipped: a pipe row cannot hold a fenced
//! block, so the table parser writes them as code spans instead.

use super::{finish, Extractor};
use crate::dom::{self, HtmlFragment};
use crate::placeholder::{Extraction, PlaceholderKind, PlaceholderMap};
use markup5ever_rcdom::Handle;

/// Protects `<pre><code>` blocks as fenced Markdown
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeExtractor;

impl Extractor for CodeExtractor {
    fn kind(&self) -> PlaceholderKind {
        PlaceholderKind::Code
    }

    fn extract(&self, html: &str) -> Extraction {
        let fragment = HtmlFragment::parse(html);
        let mut placeholders = PlaceholderMap::new(PlaceholderKind::Code);

        for pre in fragment.elements("pre") {
            if dom::has_ancestor(&pre, |a| dom::is_tag(a, "table")) {
                continue;
            }
            let Some(code) = dom::element_children(&pre)
                .into_iter()
                .find(|child| dom::is_tag(child, "code"))
            else {
                continue;
            };

            let language = detect_language(&pre, &code);
            let text = dom::text_content(&code);
            let block = fenced_block(language.as_deref(), &normalize_indentation(&text));

            let token = placeholders.insert(block);
            dom::replace(&pre, dom::new_text_element("p", &token));
        }

        finish(&fragment, html, placeholders)
    }
}

fn detect_language(pre: &Handle, code: &Handle) -> Option<String> {
    language_from_classes(&dom::classes(code))
        .or_else(|| language_from_classes(&dom::classes(pre)))
        .or_else(|| dom::attr(code, "data-language"))
        .or_else(|| dom::attr(pre, "data-language"))
        .map(|lang| lang.trim().to_string())
        .filter(|lang| !lang.is_empty())
}

fn language_from_classes(classes: &[String]) -> Option<String> {
    for class in classes {
        if let Some(lang) = class
            .strip_prefix("language-")
            .or_else(|| class.strip_prefix("lang-"))
        {
            if !lang.is_empty() {
                return Some(lang.to_string());
            }
        }
    }

    // highlight.js marks blocks as `hljs <language>`
    let hljs = classes.iter().position(|c| c == "hljs")?;
    classes
        .iter()
        .skip(hljs + 1)
        .chain(classes.iter().take(hljs))
        .find(|c| !c.starts_with("hljs") && !c.contains('-'))
        .cloned()
}

/// Strip the indentation shared by every non-blank line
pub fn normalize_indentation(text: &str) -> String {
    let text = text.trim_end_matches(['\n', '\r']);
    let lines: Vec<&str> = text.lines().collect();

    let min_indent = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    lines
        .iter()
        .map(|line| {
            if line.len() >= min_indent && line.is_char_boundary(min_indent) {
                &line[min_indent..]
            } else {
                line.trim_start()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format code as a fenced block, lengthening the fence past any backtick run
/// inside the code
pub fn fenced_block(language: Option<&str>, code: &str) -> String {
    let fence = "`".repeat(longest_backtick_run(code).max(2) + 1);
    let lang = language.unwrap_or("");
    format!("\n\n{fence}{lang}\n{code}\n{fence}\n\n")
}

/// Format code as a single-line code span. Line breaks and whitespace runs
/// collapse to one space.
pub fn code_span(code: &str) -> String {
    let code = code.split_whitespace().collect::<Vec<_>>().join(" ");
    if code.is_empty() {
        return String::new();
    }
    let fence = "`".repeat(longest_backtick_run(&code) + 1);
    let pad = if code.starts_with('`') || code.ends_with('`') {
        " "
    } else {
        ""
    };
    format!("{fence}{pad}{code}{pad}{fence}")
}

fn longest_backtick_run(code: &str) -> usize {
    code.split(|c| c != '`').map(str::len).max().unwrap_or(0)
}
