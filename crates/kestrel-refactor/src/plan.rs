//! The edit plan handed back to the caller.

use kestrel_core::{DocumentId, FileId, Position, Range};
use serde::{Deserialize, Serialize};

use crate::error::{InvariantViolation, UnavailableReason};

/// Replace the text covered by `range` with `new_text`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextEdit {
    pub range: Range,
    pub new_text: String,
}

impl TextEdit {
    pub fn insert(position: Position, text: impl Into<String>) -> Self {
        Self {
            range: Range::point(position),
            new_text: text.into(),
        }
    }

    pub fn replace(range: Range, text: impl Into<String>) -> Self {
        Self {
            range,
            new_text: text.into(),
        }
    }

    pub fn delete(range: Range) -> Self {
        Self {
            range,
            new_text: String::new(),
        }
    }
}

/// Edits to one document, all expressed against its original text.
///
/// Edits are sorted by start position and never overlap, so they can be
/// applied independently.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentEditSet {
    pub document: DocumentId,
    pub edits: Vec<TextEdit>,
}

impl DocumentEditSet {
    pub fn new(document: DocumentId, edits: Vec<TextEdit>) -> Self {
        Self { document, edits }
    }

    pub fn file(&self) -> &FileId {
        &self.document.file
    }
}

/// Sort `edits` by `(start, end)` and reject overlaps, including two
/// insertions at the same point.
pub(crate) fn sort_and_validate(
    file: &FileId,
    edits: &mut [TextEdit],
) -> Result<(), InvariantViolation> {
    for edit in edits.iter() {
        if !edit.range.is_well_formed() {
            return Err(InvariantViolation::InvertedRange {
                file: file.clone(),
                range: edit.range,
            });
        }
    }

    edits.sort_by_key(|edit| (edit.range.start, edit.range.end));
    for pair in edits.windows(2) {
        if pair[0].range.overlaps(&pair[1].range) {
            return Err(InvariantViolation::OverlappingEdits {
                file: file.clone(),
                first: pair[0].range,
                second: pair[1].range,
            });
        }
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameOptions {
    pub overwrite: bool,
    pub ignore_if_exists: bool,
}

impl Default for RenameOptions {
    fn default() -> Self {
        Self {
            overwrite: true,
            ignore_if_exists: true,
        }
    }
}

/// Rename of a module file or package directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRenameOp {
    pub old: FileId,
    pub new: FileId,
    pub options: RenameOptions,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlanOperation {
    Edit(DocumentEditSet),
    Rename(FileRenameOp),
}

/// All changes of one request, to be applied atomically.
///
/// Document edits come first, in the order their documents were discovered;
/// file renames follow.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkspaceEditPlan {
    pub operations: Vec<PlanOperation>,
}

impl WorkspaceEditPlan {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn edit_sets(&self) -> impl Iterator<Item = &DocumentEditSet> {
        self.operations.iter().filter_map(|op| match op {
            PlanOperation::Edit(set) => Some(set),
            PlanOperation::Rename(_) => None,
        })
    }

    pub fn renames(&self) -> impl Iterator<Item = &FileRenameOp> {
        self.operations.iter().filter_map(|op| match op {
            PlanOperation::Rename(rename) => Some(rename),
            PlanOperation::Edit(_) => None,
        })
    }

    /// Edits addressed to `file`, if any.
    pub fn edits_for(&self, file: &FileId) -> Option<&[TextEdit]> {
        self.edit_sets()
            .find(|set| set.file() == file)
            .map(|set| set.edits.as_slice())
    }

    pub fn edit_count(&self) -> usize {
        self.edit_sets().map(|set| set.edits.len()).sum()
    }
}

/// The refactorings offered as code actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefactorKind {
    ExtractVariable,
    ExtractFunction,
    InlineVariable,
}

impl RefactorKind {
    /// Stable classification tag.
    pub fn tag(self) -> &'static str {
        match self {
            RefactorKind::ExtractVariable => "extract-to-variable",
            RefactorKind::ExtractFunction => "extract-to-function",
            RefactorKind::InlineVariable => "inline-variable",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeActionPlan {
    pub title: String,
    pub kind: RefactorKind,
    pub plan: WorkspaceEditPlan,
}

/// Result of a request that completed without error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome<T = WorkspaceEditPlan> {
    Planned(T),
    Unavailable(UnavailableReason),
}

impl<T> Outcome<T> {
    pub fn is_planned(&self) -> bool {
        matches!(self, Outcome::Planned(_))
    }

    pub fn planned(self) -> Option<T> {
        match self {
            Outcome::Planned(value) => Some(value),
            Outcome::Unavailable(_) => None,
        }
    }

    pub fn unavailable_reason(&self) -> Option<&UnavailableReason> {
        match self {
            Outcome::Planned(_) => None,
            Outcome::Unavailable(reason) => Some(reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Planned(value) => Outcome::Planned(f(value)),
            Outcome::Unavailable(reason) => Outcome::Unavailable(reason),
        }
    }
}
