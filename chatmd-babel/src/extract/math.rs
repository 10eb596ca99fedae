//! Math extraction and emphasis repair
//!
//! A captured message can hold math in three shapes at once:
//!
//! | Shape              | Recognized by                                   | Source recovered from           |
//! |--------------------|-------------------------------------------------|---------------------------------|
//! | Rendered block     | `.katex-display` wrapper                        | `annotation[encoding=application/x-tex]` |
//! | Rendered inline    | `.katex` wrapper outside any `.katex-display`   | same annotation                 |
//! | Failed render      | `.katex-error` wrapper                          | visible text                    |
//! | Never rendered     | `$$…$$`, `\[…\]`, `\(…\)`, `$…$` in plain text | the serialized string           |
//!
//! The DOM passes run first (block before inline, so a block formula is never
//! extracted twice), then the raw pass runs on the serialized string. All
//! shapes end up as `$$\n…\n$$` (block) or `$…$` (inline) behind the same
//! placeholder mechanism. Notation is whitespace-normalized and never escaped.
//!
//! [`repair_math_emphasis`] is a separate tool for HTML produced by a
//! Markdown engine that read underscores inside unrendered formulas as
//! emphasis.

use super::Extractor;
use crate::dom::{self, HtmlFragment};
use crate::placeholder::{Extraction, PlaceholderKind, PlaceholderMap};
use markup5ever_rcdom::Handle;
use regex::{Captures, Regex};
use std::sync::LazyLock;

const BLOCK_CLASS: &str = "katex-display";
const INLINE_CLASS: &str = "katex";
const ERROR_CLASS: &str = "katex-error";
const TEX_ENCODING: &str = "application/x-tex";

// The raw passes only ever see text between tags, so a `<` never appears
// inside a match and a stray delimiter cannot pair across markup.
static RAW_DOLLAR_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\$([^<]+?)\$\$").unwrap());

static RAW_BRACKET_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\\[([^<]+?)\\\]").unwrap());

static RAW_PAREN_INLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\\(([^\n<]+?)\\\)").unwrap());

/// Single-dollar span: no leading/trailing space, no newline, no tag, not
/// preceded by a backslash or another dollar.
static RAW_DOLLAR_INLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|[^\\$])\$([^\s$<](?:[^$\n<]*?[^\s$<\\])?)\$").unwrap()
});

/// Start tag, end tag or comment. Quoted attribute values may hold `>`.
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<(?:[^>"']|"[^"]*"|'[^']*')*>"#).unwrap());

static BLOCK_REGION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\$[\s\S]*?\$\$").unwrap());

static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n").unwrap());

/// Display or in-line placement of a formula
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathMode {
    Block,
    Inline,
}

/// Protects formulas as `$…$` / `$$…$$` Markdown
#[derive(Debug, Clone, Copy, Default)]
pub struct MathExtractor;

impl Extractor for MathExtractor {
    fn kind(&self) -> PlaceholderKind {
        PlaceholderKind::Math
    }

    fn extract(&self, html: &str) -> Extraction {
        let fragment = HtmlFragment::parse(html);
        let mut placeholders = PlaceholderMap::new(PlaceholderKind::Math);

        extract_rendered_blocks(&fragment, &mut placeholders);
        extract_rendered_inline(&fragment, &mut placeholders);
        extract_failed_renders(&fragment, &mut placeholders);

        let serialized = if placeholders.is_empty() {
            html.to_string()
        } else {
            match fragment.to_html() {
                Ok(serialized) => serialized,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to serialize math fragment");
                    placeholders = PlaceholderMap::new(PlaceholderKind::Math);
                    html.to_string()
                }
            }
        };

        let protected = extract_raw_notation(&serialized, &mut placeholders);
        Extraction {
            html: protected,
            placeholders,
        }
    }

    /// Substitute tokens, collapsing blank lines inside each recovered block.
    /// Text outside the recovered formulas is never touched.
    fn restore(&self, markdown: &str, placeholders: &PlaceholderMap) -> String {
        let mut restored = markdown.to_string();
        for (token, math) in placeholders.iter() {
            if restored.contains(token) {
                restored = restored.replace(token, &collapse_block_blank_lines(math));
            }
        }
        restored
    }
}

fn collapse_block_blank_lines(math: &str) -> String {
    BLOCK_REGION
        .replace_all(math, |caps: &Captures| {
            BLANK_LINES.replace_all(&caps[0], "\n").into_owned()
        })
        .into_owned()
}

fn extract_rendered_blocks(fragment: &HtmlFragment, placeholders: &mut PlaceholderMap) {
    for wrapper in fragment.select(|node| dom::has_class(node, BLOCK_CLASS)) {
        if let Some(tex) = annotation_source(&wrapper) {
            protect(&wrapper, format_math(&tex, MathMode::Block), placeholders);
        }
    }
}

fn extract_rendered_inline(fragment: &HtmlFragment, placeholders: &mut PlaceholderMap) {
    let inline = fragment.select(|node| {
        dom::has_class(node, INLINE_CLASS)
            && !dom::has_ancestor(node, |a| dom::has_class(a, BLOCK_CLASS))
    });
    for wrapper in inline {
        if let Some(tex) = annotation_source(&wrapper) {
            protect(&wrapper, format_math(&tex, MathMode::Inline), placeholders);
        }
    }
}

fn extract_failed_renders(fragment: &HtmlFragment, placeholders: &mut PlaceholderMap) {
    for wrapper in fragment.select(|node| dom::has_class(node, ERROR_CLASS)) {
        let text = dom::text_content(&wrapper);
        let tex = strip_delimiters(&text);
        if tex.trim().is_empty() {
            continue;
        }
        protect(&wrapper, format_math(tex, classify_notation(&text)), placeholders);
    }
}

fn protect(wrapper: &Handle, markdown: String, placeholders: &mut PlaceholderMap) {
    let token = placeholders.insert(markdown);
    if !dom::replace(wrapper, dom::new_text_element("span", &token)) {
        tracing::debug!(token = %token, "Formula wrapper was already detached");
    }
}

fn is_formula_wrapper(node: &Handle) -> bool {
    [BLOCK_CLASS, INLINE_CLASS, ERROR_CLASS]
        .iter()
        .any(|class| dom::has_class(node, class))
}

/// Replace every formula below `node` with its in-line `$…$` notation.
///
/// Used where a formula has to flatten into a single line of text, such as a
/// table cell. Block formulas are written in-line too. Wrappers with no
/// recoverable notation are left alone.
pub(crate) fn inline_formulas(node: &Handle) {
    let wrappers = dom::descendants_matching(node, &|n| {
        is_formula_wrapper(n) && !dom::has_ancestor(n, is_formula_wrapper)
    });
    for wrapper in wrappers {
        let tex = if dom::has_class(&wrapper, ERROR_CLASS) {
            Some(strip_delimiters(&dom::text_content(&wrapper)).to_string())
        } else {
            annotation_source(&wrapper)
        };
        let Some(tex) = tex.filter(|tex| !tex.trim().is_empty()) else {
            continue;
        };
        dom::replace(
            &wrapper,
            dom::new_text_element("span", &format_math(&tex, MathMode::Inline)),
        );
    }
}

fn annotation_source(wrapper: &Handle) -> Option<String> {
    dom::find_descendant(wrapper, &|node| {
        dom::is_tag(node, "annotation")
            && dom::attr(node, "encoding").is_some_and(|enc| enc == TEX_ENCODING)
    })
    .map(|annotation| dom::text_content(&annotation))
    .filter(|tex| !tex.trim().is_empty())
}

/// Block-or-inline heuristic for notation recovered from a failed render.
///
/// Block when the text opens with `$$` or `\[`, or uses `\displaystyle` or an
/// environment (`\begin{`); inline otherwise.
pub fn classify_notation(text: &str) -> MathMode {
    let trimmed = text.trim_start();
    if trimmed.starts_with("$$")
        || trimmed.starts_with("\\[")
        || trimmed.contains("\\displaystyle")
        || trimmed.contains("\\begin{")
    {
        MathMode::Block
    } else {
        MathMode::Inline
    }
}

/// Remove one pair of outer math delimiters, if present
fn strip_delimiters(text: &str) -> &str {
    let trimmed = text.trim();
    for (open, close) in [("$$", "$$"), ("\\[", "\\]"), ("\\(", "\\)"), ("$", "$")] {
        if trimmed.len() >= open.len() + close.len()
            && trimmed.starts_with(open)
            && trimmed.ends_with(close)
        {
            return &trimmed[open.len()..trimmed.len() - close.len()];
        }
    }
    trimmed
}

/// Collapse whitespace runs and trim
fn normalize_notation(tex: &str) -> String {
    tex.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn format_math(tex: &str, mode: MathMode) -> String {
    let tex = normalize_notation(tex);
    match mode {
        MathMode::Block => format!("\n\n$$\n{tex}\n$$\n\n"),
        MathMode::Inline => format!("${tex}$"),
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Protect never-rendered notation left in the serialized HTML. Only text
/// between tags is scanned: attribute values and markup are copied through.
fn extract_raw_notation(html: &str, placeholders: &mut PlaceholderMap) -> String {
    let mut out = String::with_capacity(html.len());
    let mut last = 0;
    for tag in TAG.find_iter(html) {
        out.push_str(&protect_raw_text(&html[last..tag.start()], placeholders));
        out.push_str(tag.as_str());
        last = tag.end();
    }
    out.push_str(&protect_raw_text(&html[last..], placeholders));
    out
}

fn protect_raw_text(text: &str, placeholders: &mut PlaceholderMap) -> String {
    if !text.contains(['$', '\\']) {
        return text.to_string();
    }

    let mut protect_match = |whole: &str, inner: &str, mode: MathMode| -> String {
        if inner.trim().is_empty() {
            return whole.to_string();
        }
        placeholders.insert(format_math(&decode_entities(inner), mode))
    };

    let text = RAW_DOLLAR_BLOCK
        .replace_all(text, |caps: &Captures| {
            protect_match(&caps[0], &caps[1], MathMode::Block)
        })
        .into_owned();
    let text = RAW_BRACKET_BLOCK
        .replace_all(&text, |caps: &Captures| {
            protect_match(&caps[0], &caps[1], MathMode::Block)
        })
        .into_owned();
    let text = RAW_PAREN_INLINE
        .replace_all(&text, |caps: &Captures| {
            protect_match(&caps[0], &caps[1], MathMode::Inline)
        })
        .into_owned();
    RAW_DOLLAR_INLINE
        .replace_all(&text, |caps: &Captures| {
            let prefix = &caps[1];
            let whole = &caps[0][prefix.len()..];
            format!("{prefix}{}", protect_match(whole, &caps[2], MathMode::Inline))
        })
        .into_owned()
}

const EM_OPEN: char = '\u{E000}';
const EM_CLOSE: char = '\u{E001}';

const REPAIR_BLOCKS: &[&str] = &[
    "p",
    "li",
    "td",
    "th",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "blockquote",
    "dd",
    "dt",
];

fn is_repair_block(node: &Handle) -> bool {
    REPAIR_BLOCKS.iter().any(|tag| dom::is_tag(node, tag))
}

/// Undo emphasis that a Markdown engine wrongly produced from underscores
/// inside unrendered `$…$` formulas.
///
/// Block elements holding a rendered formula are left alone. Never panics:
/// unmatched emphasis markers are kept as the literal tags they came from.
pub fn repair_math_emphasis(html: &str) -> String {
    let fragment = HtmlFragment::parse(html);
    let targets = fragment.select(|node| {
        is_repair_block(node)
            && !dom::contains(node, is_repair_block)
            && !dom::contains(node, |n| dom::has_class(n, INLINE_CLASS))
    });

    let mut changed = false;
    for block in targets {
        let Ok(inner) = dom::inner_html(&block) else {
            continue;
        };
        if !inner.contains("<em>") {
            continue;
        }
        let repaired = repair_emphasis_markup(&inner);
        if repaired != inner {
            dom::set_inner_html(&block, &repaired);
            changed = true;
        }
    }

    if !changed {
        return html.to_string();
    }
    fragment.to_html().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to serialize repaired HTML");
        html.to_string()
    })
}

/// Core of [`repair_math_emphasis`], on the inner HTML of one block
pub fn repair_emphasis_markup(inner: &str) -> String {
    let marked = inner
        .replace("<em>", &EM_OPEN.to_string())
        .replace("</em>", &EM_CLOSE.to_string());
    let chars: Vec<char> = marked.chars().collect();
    let matched = pair_markers(&chars);

    let mut out = String::with_capacity(inner.len());
    let mut in_math = false;
    let mut open_spans: Vec<bool> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                out.push(c);
                if let Some(&next) = chars.get(i + 1) {
                    if next != EM_OPEN && next != EM_CLOSE {
                        out.push(next);
                        i += 1;
                    }
                }
            }
            '$' => {
                if chars.get(i + 1) == Some(&'$') {
                    out.push_str("$$");
                    i += 1;
                } else {
                    in_math = !in_math;
                    out.push('$');
                }
            }
            EM_OPEN => {
                if matched[i] {
                    out.push_str(if in_math { "_" } else { "<em>" });
                    open_spans.push(in_math);
                } else {
                    out.push_str("<em>");
                }
            }
            EM_CLOSE => match open_spans.pop() {
                Some(true) => out.push('_'),
                _ => out.push_str("</em>"),
            },
            _ => out.push(c),
        }
        i += 1;
    }
    out
}

/// Mark which open markers have a matching close
fn pair_markers(chars: &[char]) -> Vec<bool> {
    let mut matched = vec![false; chars.len()];
    let mut stack = Vec::new();
    for (i, &c) in chars.iter().enumerate() {
        if c == EM_OPEN {
            stack.push(i);
        } else if c == EM_CLOSE {
            if let Some(open) = stack.pop() {
                matched[open] = true;
            }
        }
    }
    matched
}
