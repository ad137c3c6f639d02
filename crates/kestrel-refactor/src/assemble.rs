//! Building the final plan and applying it to in-memory files.

use std::collections::{BTreeMap, HashSet};

use kestrel_core::{apply_text_edits, DocumentId, FileId, OffsetEdit};

use crate::error::{InvariantViolation, RefactorError};
use crate::plan::{
    sort_and_validate, DocumentEditSet, FileRenameOp, PlanOperation, TextEdit, WorkspaceEditPlan,
};
use crate::snapshot::SourceFile;

/// Merge per-document edit sets and file renames into one plan.
///
/// Sets addressed to the same file are merged into the first one (and
/// re-validated), empty sets are dropped, and renames are appended after all
/// edits.
pub fn assemble(
    edit_sets: Vec<DocumentEditSet>,
    renames: Vec<FileRenameOp>,
) -> Result<WorkspaceEditPlan, RefactorError> {
    let mut merged: Vec<DocumentEditSet> = Vec::with_capacity(edit_sets.len());
    for set in edit_sets {
        if set.edits.is_empty() {
            continue;
        }
        match merged.iter_mut().find(|existing| existing.file() == set.file()) {
            Some(existing) => {
                if existing.document.version != set.document.version {
                    return Err(RefactorError::VersionMismatch {
                        file: set.document.file,
                        expected: existing.document.version,
                        actual: set.document.version,
                    });
                }
                existing.edits.extend(set.edits);
            }
            None => merged.push(set),
        }
    }

    let mut operations = Vec::with_capacity(merged.len() + renames.len());
    for mut set in merged {
        if let Err(violation) = sort_and_validate(&set.document.file, &mut set.edits) {
            tracing::warn!(
                target: "kestrel.refactor",
                error = %violation,
                "refusing to assemble overlapping edits"
            );
            return Err(violation.into());
        }
        operations.push(PlanOperation::Edit(set));
    }

    let mut renamed: HashSet<FileId> = HashSet::new();
    for rename in renames {
        if !renamed.insert(rename.old.clone()) {
            return Err(InvariantViolation::DuplicateRename { file: rename.old }.into());
        }
        operations.push(PlanOperation::Rename(rename));
    }

    Ok(WorkspaceEditPlan { operations })
}

/// Plan for byte-offset edits to one file of the snapshot.
pub(crate) fn single_file_plan(
    file: &FileId,
    source: &SourceFile,
    edits: Vec<OffsetEdit>,
) -> Result<WorkspaceEditPlan, RefactorError> {
    let text = source.text();
    let line_index = source.line_index();
    let edits = edits
        .into_iter()
        .map(|edit| TextEdit::replace(line_index.range(text, edit.range), edit.replacement))
        .collect();
    assemble(
        vec![DocumentEditSet::new(
            DocumentId::new(file.clone(), source.version()),
            edits,
        )],
        Vec::new(),
    )
}

/// Apply `plan` to an in-memory `file -> text` map.
///
/// Text edits are applied against the original text of each file; renames
/// run afterwards. Renaming a directory moves every file below it.
pub fn apply_plan(
    files: &BTreeMap<FileId, String>,
    plan: &WorkspaceEditPlan,
) -> Result<BTreeMap<FileId, String>, RefactorError> {
    let mut out = files.clone();

    for set in plan.edit_sets() {
        let file = set.file();
        let text = files
            .get(file)
            .ok_or_else(|| RefactorError::UnknownFile(file.clone()))?;
        let line_index = kestrel_core::LineIndex::new(text);

        let mut offset_edits = Vec::with_capacity(set.edits.len());
        for edit in &set.edits {
            let range = line_index.text_range(text, edit.range).ok_or_else(|| {
                InvariantViolation::OccurrenceOutOfBounds {
                    file: file.clone(),
                    range: edit.range,
                }
            })?;
            offset_edits.push(OffsetEdit::new(range, edit.new_text.clone()));
        }
        let updated = apply_text_edits(text, &offset_edits)?;
        out.insert(file.clone(), updated);
    }

    for rename in plan.renames() {
        apply_rename(&mut out, rename)?;
    }
    Ok(out)
}

fn apply_rename(
    files: &mut BTreeMap<FileId, String>,
    rename: &FileRenameOp,
) -> Result<(), RefactorError> {
    let moves: Vec<(FileId, FileId)> = if files.contains_key(&rename.old) {
        vec![(rename.old.clone(), rename.new.clone())]
    } else {
        let old_prefix = directory_prefix(&rename.old);
        let new_prefix = directory_prefix(&rename.new);
        files
            .keys()
            .filter_map(|file| {
                file.as_str()
                    .strip_prefix(&old_prefix)
                    .map(|rest| (file.clone(), FileId::new(format!("{new_prefix}{rest}"))))
            })
            .collect()
    };

    if moves.is_empty() {
        return Err(RefactorError::UnknownFile(rename.old.clone()));
    }

    for (from, to) in moves {
        if files.contains_key(&to) && !rename.options.overwrite {
            if rename.options.ignore_if_exists {
                continue;
            }
            return Err(RefactorError::InvalidFileId {
                file: to,
                reason: "rename target already exists",
            });
        }
        if let Some(text) = files.remove(&from) {
            files.insert(to, text);
        }
    }
    Ok(())
}

fn directory_prefix(dir: &FileId) -> String {
    let dir = dir.as_str();
    if dir.ends_with('/') {
        dir.to_string()
    } else {
        format!("{dir}/")
    }
}

#[cfg(test)]
mod tests {
    use kestrel_core::{Position, Range};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::plan::RenameOptions;

    fn file(path: &str) -> FileId {
        FileId::new(format!("file://{path}"))
    }

    #[test]
    fn sets_for_one_document_are_merged_in_discovery_order() {
        let a = DocumentId::unversioned(file("/a.py"));
        let b = DocumentId::unversioned(file("/b.py"));

        let plan = assemble(
            vec![
                DocumentEditSet::new(b.clone(), vec![TextEdit::insert(Position::new(1, 0), "x")]),
                DocumentEditSet::new(a.clone(), vec![TextEdit::insert(Position::new(0, 0), "y")]),
                DocumentEditSet::new(b.clone(), vec![TextEdit::insert(Position::new(0, 0), "z")]),
                DocumentEditSet::new(a.clone(), vec![]),
            ],
            vec![],
        )
        .unwrap();

        assert_eq!(
            plan.operations,
            vec![
                PlanOperation::Edit(DocumentEditSet::new(
                    b,
                    vec![
                        TextEdit::insert(Position::new(0, 0), "z"),
                        TextEdit::insert(Position::new(1, 0), "x"),
                    ]
                )),
                PlanOperation::Edit(DocumentEditSet::new(
                    a,
                    vec![TextEdit::insert(Position::new(0, 0), "y")]
                )),
            ]
        );
    }

    #[test]
    fn duplicate_renames_are_rejected() {
        let op = FileRenameOp {
            old: file("/pkg/mod.py"),
            new: file("/pkg/other.py"),
            options: RenameOptions::default(),
        };
        assert_eq!(
            assemble(vec![], vec![op.clone(), op]),
            Err(RefactorError::InvariantViolation(
                InvariantViolation::DuplicateRename {
                    file: file("/pkg/mod.py")
                }
            ))
        );
    }

    #[test]
    fn apply_edits_then_move_directory_contents() {
        let files: BTreeMap<FileId, String> = [
            (file("/main.py"), "import pkg.mod\n".to_string()),
            (file("/pkg/__init__.py"), String::new()),
            (file("/pkg/mod.py"), "x = 1\n".to_string()),
            (file("/pkgs/keep.py"), "y = 2\n".to_string()),
        ]
        .into_iter()
        .collect();

        let plan = assemble(
            vec![DocumentEditSet::new(
                DocumentId::unversioned(file("/main.py")),
                vec![TextEdit::replace(Range::on_line(0, 7, 10), "lib")],
            )],
            vec![FileRenameOp {
                old: file("/pkg"),
                new: file("/lib"),
                options: RenameOptions::default(),
            }],
        )
        .unwrap();

        let applied = apply_plan(&files, &plan).unwrap();
        let expected: BTreeMap<FileId, String> = [
            (file("/lib/__init__.py"), String::new()),
            (file("/lib/mod.py"), "x = 1\n".to_string()),
            (file("/main.py"), "import lib.mod\n".to_string()),
            (file("/pkgs/keep.py"), "y = 2\n".to_string()),
        ]
        .into_iter()
        .collect();
        assert_eq!(applied, expected);
    }

    #[test]
    fn renaming_a_missing_file_fails() {
        let plan = assemble(
            vec![],
            vec![FileRenameOp {
                old: file("/nope.py"),
                new: file("/other.py"),
                options: RenameOptions::default(),
            }],
        )
        .unwrap();
        assert_eq!(
            apply_plan(&BTreeMap::new(), &plan),
            Err(RefactorError::UnknownFile(file("/nope.py")))
        );
    }
}
