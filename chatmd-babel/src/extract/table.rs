//! Table extraction
//!
//! Tables are read from the parsed tree, never from the serialized string, so
//! minified markup with implicitly closed `<tr>`/`<td>`/`<th>` elements is
//! already repaired by the tree builder when we look at it.
//!
//! Output is always a well-formed pipe table: the first row is the header and
//! fixes the column count, a `| --- |` separator follows it, and every other
//! row is padded or truncated to match.
//!
//! A pipe row is one line, so rich cell content is flattened here rather than
//! left to the later extractors: formulas become `$…$` and code (including
//! whole `<pre>` blocks) becomes a single-line code span.

use super::code::code_span;
use super::math::inline_formulas;
use super::{finish, Extractor};
use crate::dom::{self, HtmlFragment};
use crate::placeholder::{Extraction, PlaceholderKind, PlaceholderMap};
use markup5ever_rcdom::Handle;

/// Protects `<table>` elements as Markdown pipe tables
#[derive(Debug, Clone, Copy, Default)]
pub struct TableParser;

impl Extractor for TableParser {
    fn kind(&self) -> PlaceholderKind {
        PlaceholderKind::Table
    }

    fn extract(&self, html: &str) -> Extraction {
        let fragment = HtmlFragment::parse(html);
        let mut placeholders = PlaceholderMap::new(PlaceholderKind::Table);

        // Nested tables flatten into the text of their outer cell
        let tables = fragment.select(|node| {
            dom::is_tag(node, "table") && !dom::has_ancestor(node, |a| dom::is_tag(a, "table"))
        });

        for table in tables {
            let rows = table_rows(&table);
            let Some(markdown) = format_pipe_table(&rows) else {
                continue;
            };
            let token = placeholders.insert(markdown);
            dom::replace(&table, dom::new_text_element("p", &token));
        }

        finish(&fragment, html, placeholders)
    }
}

/// Cell texts of each `<tr>` that belongs to `table` itself
fn table_rows(table: &Handle) -> Vec<Vec<String>> {
    dom::descendants_matching(table, &|node| is_own_row(node, table))
        .iter()
        .map(|row| {
            dom::element_children(row)
                .iter()
                .filter(|cell| dom::is_tag(cell, "td") || dom::is_tag(cell, "th"))
                .map(flatten_cell)
                .collect()
        })
        .collect()
}

fn is_own_row(node: &Handle, table: &Handle) -> bool {
    if !dom::is_tag(node, "tr") {
        return false;
    }
    // The nearest enclosing table must be `table`
    let mut current = dom::parent_of(node);
    while let Some(parent) = current {
        if dom::is_tag(&parent, "table") {
            return std::rc::Rc::ptr_eq(&parent, table);
        }
        current = dom::parent_of(&parent);
    }
    false
}

fn flatten_cell(cell: &Handle) -> String {
    inline_formulas(cell);
    for tag in ["pre", "code"] {
        for code in dom::descendants_matching(cell, &|n| dom::is_tag(n, tag)) {
            let span = code_span(&dom::text_content(&code));
            dom::replace(&code, dom::new_text_element("span", &span));
        }
    }
    cell_text(&dom::text_content(cell))
}

fn cell_text(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('|', "\\|")
}

/// Format rows as a pipe table. `None` when there is no header to size it.
pub fn format_pipe_table(rows: &[Vec<String>]) -> Option<String> {
    let header = rows.first()?;
    let columns = header.len();
    if columns == 0 {
        return None;
    }

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(format_row(header, columns));
    lines.push(format!("|{}", " --- |".repeat(columns)));
    for row in &rows[1..] {
        lines.push(format_row(row, columns));
    }

    Some(format!("\n\n{}\n\n", lines.join("\n")))
}

fn format_row(cells: &[String], columns: usize) -> String {
    let mut line = String::from("|");
    for index in 0..columns {
        let cell = cells.get(index).map(String::as_str).unwrap_or("");
        if cell.is_empty() {
            line.push_str("  |");
        } else {
            line.push(' ');
            line.push_str(cell);
            line.push_str(" |");
        }
    }
    line
}
