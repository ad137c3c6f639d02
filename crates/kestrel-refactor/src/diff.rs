//! Minimal-diff identifier rewriting.
//!
//! Renaming `myfunc1` to `my_function_1` produces two insertions rather than
//! one replacement, which keeps editor cursors and unrelated markers stable.

use kestrel_core::{LineIndex, Position, Range};
use similar::{capture_diff_slices, Algorithm, DiffOp};

use crate::plan::TextEdit;

/// One edit inside an identifier. `offset` and `deleted` count UTF-16 code
/// units from the start of the old identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentifierEdit {
    pub offset: u32,
    pub deleted: u32,
    pub inserted: String,
}

fn utf16_len(chars: &[char]) -> u32 {
    chars.iter().map(|c| c.len_utf16() as u32).sum()
}

/// Smallest set of edits turning `old` into `new`.
///
/// The common prefix and suffix are kept. When the names share neither, the
/// result is a single full replacement; otherwise the middle segments are
/// diffed per character and every maximal non-equal run becomes one edit.
pub fn split_identifier(old: &str, new: &str) -> Vec<IdentifierEdit> {
    if old == new {
        return Vec::new();
    }

    let old_chars: Vec<char> = old.chars().collect();
    let new_chars: Vec<char> = new.chars().collect();
    let shorter = old_chars.len().min(new_chars.len());

    let prefix = old_chars
        .iter()
        .zip(&new_chars)
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = old_chars
        .iter()
        .rev()
        .zip(new_chars.iter().rev())
        .take(shorter - prefix)
        .take_while(|(a, b)| a == b)
        .count();

    if prefix == 0 && suffix == 0 {
        return vec![IdentifierEdit {
            offset: 0,
            deleted: utf16_len(&old_chars),
            inserted: new.to_string(),
        }];
    }

    let old_mid = &old_chars[prefix..old_chars.len() - suffix];
    let new_mid = &new_chars[prefix..new_chars.len() - suffix];

    // UTF-16 offset of every char boundary in `old`, relative to its start.
    let mut boundaries = Vec::with_capacity(old_chars.len() + 1);
    let mut acc = 0u32;
    boundaries.push(acc);
    for ch in &old_chars {
        acc += ch.len_utf16() as u32;
        boundaries.push(acc);
    }

    let mut edits = Vec::new();
    let mut pending: Option<(usize, usize, String)> = None;
    let flush = |pending: &mut Option<(usize, usize, String)>, edits: &mut Vec<IdentifierEdit>| {
        if let Some((start, end, inserted)) = pending.take() {
            edits.push(IdentifierEdit {
                offset: boundaries[prefix + start],
                deleted: boundaries[prefix + end] - boundaries[prefix + start],
                inserted,
            });
        }
    };

    for op in capture_diff_slices(Algorithm::Myers, old_mid, new_mid) {
        let (old_range, new_range) = match op {
            DiffOp::Equal { .. } => {
                flush(&mut pending, &mut edits);
                continue;
            }
            DiffOp::Delete {
                old_index, old_len, ..
            } => (old_index..old_index + old_len, 0..0),
            DiffOp::Insert {
                old_index,
                new_index,
                new_len,
            } => (old_index..old_index, new_index..new_index + new_len),
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => (
                old_index..old_index + old_len,
                new_index..new_index + new_len,
            ),
        };

        let run = pending.get_or_insert_with(|| (old_range.start, old_range.start, String::new()));
        run.1 = old_range.end.max(run.1);
        run.2.extend(&new_mid[new_range]);
    }
    flush(&mut pending, &mut edits);

    edits
}

/// Rewrite the identifier under `range` to `new_name`, as document edits.
///
/// Returns `None` when `range` does not address text in the document. Edit
/// ends are clamped to the line length.
pub fn identifier_edits(
    line_index: &LineIndex,
    text: &str,
    range: Range,
    new_name: &str,
) -> Option<Vec<TextEdit>> {
    let byte_range = line_index.text_range(text, range)?;
    let old = &text[byte_range];
    let anchor = range.start;

    let edits = split_identifier(old, new_name)
        .into_iter()
        .map(|edit| {
            let start = Position::new(anchor.line, anchor.character + edit.offset);
            let end = line_index.clamp_position(
                text,
                Position::new(anchor.line, anchor.character + edit.offset + edit.deleted),
            );
            TextEdit::replace(Range::new(start, end), edit.inserted)
        })
        .collect();
    Some(edits)
}
