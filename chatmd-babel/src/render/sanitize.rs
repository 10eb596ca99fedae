//! Allow-list HTML sanitization of rendered output
//!
//! Keeps the tags the Markdown engine emits plus the MathML vocabulary a math
//! typesetter produces. `script`, `iframe`, `object`, `embed` and `style` are
//! removed with their content, and `on*` event handler attributes never
//! survive, whatever the allow-lists say.

use ammonia::Builder;
use std::collections::{HashMap, HashSet};

const MARKDOWN_TAGS: &[&str] = &[
    "a", "b", "blockquote", "br", "code", "dd", "del", "details", "div", "dl", "dt", "em",
    "h1", "h2", "h3", "h4", "h5", "h6", "hr", "i", "img", "input", "ins", "kbd", "li",
    "mark", "ol", "p", "pre", "s", "section", "span", "strong", "sub", "summary", "sup",
    "table", "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

const MATH_TAGS: &[&str] = &[
    "math", "semantics", "annotation", "mrow", "mi", "mo", "mn", "ms", "mtext", "mspace",
    "msup", "msub", "msubsup", "mfrac", "msqrt", "mroot", "mover", "munder", "munderover",
    "mtable", "mtr", "mtd", "mstyle", "mpadded", "mphantom", "menclose",
];

/// Removed along with everything inside them
pub const FORBIDDEN_TAGS: &[&str] = &["script", "iframe", "object", "embed", "style"];

const GENERIC_ATTRIBUTES: &[&str] = &["title", "lang", "dir", "aria-hidden"];

const TAG_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("a", &["href"]),
    ("img", &["src", "alt", "title", "width", "height"]),
    ("code", &["class"]),
    ("pre", &["class"]),
    ("span", &["class", "data-math-style"]),
    ("div", &["class"]),
    ("td", &["align"]),
    ("th", &["align"]),
    ("ol", &["start"]),
    ("input", &["type", "checked", "disabled"]),
    ("math", &["display", "xmlns"]),
    ("annotation", &["encoding"]),
    ("mo", &["stretchy", "fence", "separator", "lspace", "rspace"]),
    ("mspace", &["width"]),
    ("mstyle", &["displaystyle", "scriptlevel"]),
    ("mtable", &["columnalign", "rowspacing", "columnspacing"]),
];

const URL_SCHEMES: &[&str] = &["http", "https", "mailto"];

fn is_event_handler(attribute: &str) -> bool {
    attribute.len() > 2
        && attribute
            .get(..2)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("on"))
}

/// Strips everything outside the allow-lists from rendered HTML
pub struct Sanitizer {
    builder: Builder<'static>,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sanitizer {
    pub fn new() -> Self {
        let forbidden: HashSet<&'static str> = FORBIDDEN_TAGS.iter().copied().collect();

        let tags: HashSet<&'static str> = MARKDOWN_TAGS
            .iter()
            .chain(MATH_TAGS)
            .copied()
            .filter(|tag| !forbidden.contains(tag))
            .collect();

        let tag_attributes: HashMap<&'static str, HashSet<&'static str>> = TAG_ATTRIBUTES
            .iter()
            .filter(|(tag, _)| !forbidden.contains(tag))
            .map(|(tag, attributes)| {
                let allowed = attributes
                    .iter()
                    .copied()
                    .filter(|a| !is_event_handler(a))
                    .collect();
                (*tag, allowed)
            })
            .collect();

        let generic: HashSet<&'static str> = GENERIC_ATTRIBUTES
            .iter()
            .copied()
            .filter(|a| !is_event_handler(a))
            .collect();

        let mut builder = Builder::empty();
        builder
            .tags(tags)
            .tag_attributes(tag_attributes)
            .generic_attributes(generic)
            .clean_content_tags(forbidden)
            .url_schemes(URL_SCHEMES.iter().copied().collect())
            .link_rel(Some("noopener noreferrer"))
            .strip_comments(true);

        Self { builder }
    }

    pub fn clean(&self, html: &str) -> String {
        self.builder.clean(html).to_string()
    }
}
