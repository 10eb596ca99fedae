//! Extraction direction (rendered markup → Markdown)
//!
//!     A generic HTML→Markdown converter flattens code blocks, tables and
//!     rendered formulas badly: language hints are lost, malformed tables come
//!     out as run-on text, and formula markup turns into glyph soup. The
//!     extractors here protect those constructs before the generic step runs.
//!
//!     Each extractor scans a parsed copy of the fragment, swaps the construct
//!     for an inert placeholder element, and records the Markdown the
//!     placeholder stands for. After the caller runs the protected HTML
//!     through its converter, `restore()` swaps the tokens back.
//!
//! Ordering
//!
//!     The extractors are independent, but [`CapturePipeline`] composes them
//!     in a fixed order: code, then table, then math. Math runs last because
//!     its raw-notation pass works on the serialized string, and the earlier
//!     steps change the text around formula boundaries. Restore runs the
//!     stages in reverse, so code comes back last and no other stage sees it.
//!
//! State
//!
//!     Extractors hold no per-cycle state. The [`PlaceholderMap`] is returned
//!     from `extract()` and handed back to `restore()`, so one extractor can
//!     serve overlapping cycles without the placeholders of one cycle leaking
//!     into another.

pub mod code;
pub mod math;
pub mod table;

pub use code::CodeExtractor;
pub use math::{repair_math_emphasis, MathExtractor};
pub use table::TableParser;

use crate::dom::HtmlFragment;
use crate::placeholder::{Extraction, PlaceholderKind, PlaceholderMap};
use serde::{Deserialize, Serialize};

/// Shared contract of the code, table and math extractors
pub trait Extractor: Send + Sync {
    /// Kind of placeholder this extractor emits
    fn kind(&self) -> PlaceholderKind;

    /// Protect every construct this extractor recognizes in `html`.
    ///
    /// Never fails: if nothing can be protected the input comes back
    /// unchanged with an empty map.
    fn extract(&self, html: &str) -> Extraction;

    /// Substitute the placeholders recorded by `extract()`
    fn restore(&self, markdown: &str, placeholders: &PlaceholderMap) -> String {
        placeholders.restore(markdown)
    }
}

/// External generic HTML→Markdown converter
///
/// Implementations must pass placeholder text such as `{{CODE-0}}` through
/// unmodified.
pub trait HtmlToMarkdown {
    fn convert(&self, html: &str) -> String;
}

impl<F> HtmlToMarkdown for F
where
    F: Fn(&str) -> String,
{
    fn convert(&self, html: &str) -> String {
        self(html)
    }
}

/// Serialize a mutated fragment, falling back to the untouched input
pub(crate) fn finish(
    fragment: &HtmlFragment,
    original: &str,
    placeholders: PlaceholderMap,
) -> Extraction {
    if placeholders.is_empty() {
        return Extraction::unchanged(original, placeholders.kind());
    }
    match fragment.to_html() {
        Ok(html) => Extraction { html, placeholders },
        Err(e) => {
            tracing::warn!(
                kind = placeholders.kind().tag(),
                error = %e,
                "Failed to serialize protected fragment, leaving input unprotected"
            );
            Extraction::unchanged(original, placeholders.kind())
        }
    }
}

/// HTML protected by every extractor, plus the maps needed to restore it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedHtml {
    pub html: String,
    pub placeholders: Vec<PlaceholderMap>,
}

/// The code → table → math extraction pipeline
pub struct CapturePipeline {
    code: CodeExtractor,
    table: TableParser,
    math: MathExtractor,
}

impl Default for CapturePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl CapturePipeline {
    pub fn new() -> Self {
        Self {
            code: CodeExtractor,
            table: TableParser,
            math: MathExtractor,
        }
    }

    fn stages(&self) -> [&dyn Extractor; 3] {
        [&self.code, &self.table, &self.math]
    }

    /// Run every extractor in pipeline order
    pub fn extract(&self, html: &str) -> ProtectedHtml {
        let mut current = html.to_string();
        let mut placeholders = Vec::with_capacity(3);
        for stage in self.stages() {
            let extraction = stage.extract(&current);
            tracing::debug!(
                kind = stage.kind().tag(),
                protected = extraction.placeholders.len(),
                "Extraction stage finished"
            );
            current = extraction.html;
            placeholders.push(extraction.placeholders);
        }
        ProtectedHtml {
            html: current,
            placeholders,
        }
    }

    /// Restore every map produced by [`CapturePipeline::extract`], last stage
    /// first. Restored code is therefore never rewritten by a later stage.
    pub fn restore(&self, markdown: &str, protected: &ProtectedHtml) -> String {
        let mut restored = markdown.to_string();
        for map in protected.placeholders.iter().rev() {
            restored = match map.kind() {
                PlaceholderKind::Code => self.code.restore(&restored, map),
                PlaceholderKind::Table => self.table.restore(&restored, map),
                PlaceholderKind::Math => self.math.restore(&restored, map),
            };
        }
        restored
    }

    /// Full capture cycle: extract, convert with `converter`, restore
    pub fn capture(&self, html: &str, converter: &dyn HtmlToMarkdown) -> String {
        let protected = self.extract(html);
        let markdown = converter.convert(&protected.html);
        self.restore(&markdown, &protected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_protects_every_construct() {
        let html = concat!(
            r#"<pre><code class="language-rust">fn main() {}</code></pre>"#,
            "<table><tr><th>a</th><th>b</th></tr><tr><td>1</td><td>2</td></tr></table>",
            r#"<p>Inline \(x^2\) math</p>"#
        );
        let pipeline = CapturePipeline::new();
        let protected = pipeline.extract(html);

        assert!(protected.html.contains("{{CODE-0}}"));
        assert!(protected.html.contains("{{TABLE-0}}"));
        assert!(protected.html.contains("{{MATH-0}}"));
        assert!(!protected.html.contains("<pre>"));
        assert!(!protected.html.contains("<table>"));
    }

    #[test]
    fn capture_runs_converter_between_steps() {
        let html = r#"<p>See</p><pre><code class="language-py">print(1)</code></pre>"#;
        // Stand-in converter: drop tags, keep text
        let strip_tags = |s: &str| {
            let re = regex::Regex::new(r"<[^>]+>").unwrap();
            re.replace_all(s, "\n").to_string()
        };
        let markdown = CapturePipeline::new().capture(html, &strip_tags);
        assert!(markdown.contains("```py\nprint(1)\n```"));
        assert!(markdown.contains("See"));
    }
}
