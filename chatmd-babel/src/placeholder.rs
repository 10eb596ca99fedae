//! Placeholder tokens and maps
//!
//! An extractor swaps each construct it protects for a token of the shape
//! `{{KIND-N}}` and records the Markdown that should replace it later. The
//! token shape is a compatibility contract: callers may persist a
//! [`PlaceholderMap`] between the extract and restore steps.

use serde::{Deserialize, Serialize};

/// Kind tag carried by a placeholder token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderKind {
    Code,
    Table,
    Math,
}

impl PlaceholderKind {
    pub fn tag(&self) -> &'static str {
        match self {
            PlaceholderKind::Code => "CODE",
            PlaceholderKind::Table => "TABLE",
            PlaceholderKind::Math => "MATH",
        }
    }

    /// Render the token for the `index`-th construct of this kind
    pub fn token(&self, index: usize) -> String {
        format!("{{{{{}-{index}}}}}", self.tag())
    }
}

/// Ordered token → Markdown mapping produced by one extraction cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderMap {
    kind: PlaceholderKind,
    entries: Vec<(String, String)>,
}

impl PlaceholderMap {
    pub fn new(kind: PlaceholderKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    pub fn kind(&self) -> PlaceholderKind {
        self.kind
    }

    /// Record `markdown` under a fresh token and return the token
    pub fn insert(&mut self, markdown: String) -> String {
        let token = self.kind.token(self.entries.len());
        self.entries.push((token.clone(), markdown));
        token
    }

    pub fn get(&self, token: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(t, _)| t == token)
            .map(|(_, md)| md.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(t, md)| (t.as_str(), md.as_str()))
    }

    /// Substitute every token with its recorded Markdown. Once no tokens
    /// remain the call is a no-op.
    pub fn restore(&self, markdown: &str) -> String {
        let mut restored = markdown.to_string();
        for (token, replacement) in &self.entries {
            if restored.contains(token.as_str()) {
                restored = restored.replace(token.as_str(), replacement);
            }
        }
        restored
    }
}

/// Output of one `extract()` call: the protected HTML plus its map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    pub html: String,
    pub placeholders: PlaceholderMap,
}

impl Extraction {
    /// An extraction that protected nothing
    pub fn unchanged(html: &str, kind: PlaceholderKind) -> Self {
        Self {
            html: html.to_string(),
            placeholders: PlaceholderMap::new(kind),
        }
    }
}
