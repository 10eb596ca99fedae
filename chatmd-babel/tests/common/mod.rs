//! Shared helpers for integration tests

use regex::Regex;
use std::sync::LazyLock;

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Crude stand-in for a real HTML→Markdown converter: drops every tag and
/// keeps text, so placeholder tokens pass through untouched.
pub fn strip_tags(html: &str) -> String {
    let text = TAG.replace_all(html, "\n\n");
    BLANK_RUNS.replace_all(&text, "\n\n").trim().to_string()
}

pub const KATEX_INLINE: &str = r#"<span class="katex"><span class="katex-mathml"><math><semantics><mrow><mi>x</mi></mrow><annotation encoding="application/x-tex">x_i^2</annotation></semantics></math></span><span class="katex-html" aria-hidden="true">xi2</span></span>"#;

pub const KATEX_BLOCK: &str = r#"<span class="katex-display"><span class="katex"><span class="katex-mathml"><math display="block"><semantics><mrow></mrow><annotation encoding="application/x-tex">\int_0^1 f(x)\,dx</annotation></semantics></math></span><span class="katex-html">glyphs</span></span></span>"#;
