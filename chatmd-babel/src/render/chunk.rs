//! Line-aligned chunking for interruptible rendering
//!
//! A chunk is cut only at a blank line outside fenced code, once it has
//! reached the size budget, and only when the next non-blank line starts a
//! fresh top-level block: it sits at column 0 and is not a list item or a
//! quote line. Indented continuations, loose list items and quotes stay with
//! the block they belong to. Fences always open and close inside the same
//! chunk, and a block larger than the budget simply makes a larger chunk.

/// Fence opener/closer on a line: the fence character and run length
pub fn fence_marker(line: &str) -> Option<(char, usize)> {
    let trimmed = line.trim_start();
    let fence_char = trimmed.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let run = trimmed.chars().take_while(|c| *c == fence_char).count();
    (run >= 3).then_some((fence_char, run))
}

/// `- `, `* `, `+ `, `1. ` or `1) ` at the start of a line
fn is_list_marker(line: &str) -> bool {
    let mut chars = line.chars();
    match chars.next() {
        Some('-' | '*' | '+') => matches!(chars.next(), None | Some(' ' | '\t')),
        Some(c) if c.is_ascii_digit() => {
            let rest = line.trim_start_matches(|c: char| c.is_ascii_digit());
            let digits = line.len() - rest.len();
            let mut rest = rest.chars();
            digits <= 9
                && matches!(rest.next(), Some('.' | ')'))
                && matches!(rest.next(), None | Some(' ' | '\t'))
        }
        _ => false,
    }
}

/// Whether a block starting with `line` is independent of whatever precedes
/// the blank line above it
fn starts_fresh_block(line: &str) -> bool {
    !line.starts_with([' ', '\t', '>']) && !is_list_marker(line)
}

/// Split `markdown` into chunks of roughly `chunk_size` bytes
pub fn split_into_chunks(markdown: &str, chunk_size: usize) -> Vec<&str> {
    let lines: Vec<&str> = markdown.split_inclusive('\n').collect();
    let mut chunks = Vec::new();
    let mut open_fence: Option<(char, usize)> = None;
    let mut chunk_start = 0;
    let mut offset = 0;

    for (index, line) in lines.iter().enumerate() {
        offset += line.len();

        if let Some((fence_char, run)) = fence_marker(line) {
            match open_fence {
                None => open_fence = Some((fence_char, run)),
                Some((open_char, open_run)) => {
                    let rest = line.trim_start().trim_start_matches(fence_char);
                    if fence_char == open_char && run >= open_run && rest.trim().is_empty() {
                        open_fence = None;
                    }
                }
            }
            continue;
        }

        let full = offset - chunk_start >= chunk_size;
        if open_fence.is_some() || !full || !line.trim().is_empty() {
            continue;
        }
        let next = lines[index + 1..].iter().find(|l| !l.trim().is_empty());
        if next.is_some_and(|next| starts_fresh_block(next)) {
            chunks.push(&markdown[chunk_start..offset]);
            chunk_start = offset;
        }
    }

    if chunk_start < markdown.len() {
        chunks.push(&markdown[chunk_start..]);
    }
    chunks
}
