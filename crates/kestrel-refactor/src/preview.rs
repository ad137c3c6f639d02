use std::collections::BTreeMap;

use kestrel_core::FileId;
use similar::TextDiff;

use crate::assemble::apply_plan;
use crate::error::RefactorError;
use crate::plan::WorkspaceEditPlan;
use crate::snapshot::Snapshot;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileChangeKind {
    Modified,
    Renamed { from: FileId, to: FileId },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilePreview {
    pub file: FileId,
    pub change: FileChangeKind,
    pub original: String,
    pub modified: String,
    pub unified_diff: String,
    pub edit_count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefactoringPreview {
    pub total_files: usize,
    pub total_edits: usize,
    pub files: Vec<FilePreview>,
}

/// Render what `plan` would do to the snapshot as per-file unified diffs.
///
/// Files moved by a rename are shown once, at their new path, diffed against
/// their original text.
pub fn generate_preview(
    snapshot: &Snapshot,
    plan: &WorkspaceEditPlan,
) -> Result<RefactoringPreview, RefactorError> {
    let original_files = snapshot.texts();
    let modified_files = apply_plan(&original_files, plan)?;

    // Destination -> source for every file a rename moved.
    let mut moved: BTreeMap<FileId, FileId> = BTreeMap::new();
    for rename in plan.renames() {
        let old_dir = format!("{}/", rename.old.as_str().trim_end_matches('/'));
        let new_dir = format!("{}/", rename.new.as_str().trim_end_matches('/'));
        for file in original_files.keys() {
            let dest = if *file == rename.old {
                rename.new.clone()
            } else if let Some(rest) = file.as_str().strip_prefix(&old_dir) {
                FileId::new(format!("{new_dir}{rest}"))
            } else {
                continue;
            };
            if modified_files.contains_key(&dest) && !original_files.contains_key(&dest) {
                moved.insert(dest, file.clone());
            }
        }
    }

    let mut files = Vec::new();
    for (file, modified) in &modified_files {
        let (change, source) = match moved.get(file) {
            Some(from) => (
                FileChangeKind::Renamed {
                    from: from.clone(),
                    to: file.clone(),
                },
                from,
            ),
            None => (FileChangeKind::Modified, file),
        };
        let original = original_files.get(source).map(String::as_str).unwrap_or("");
        if change == FileChangeKind::Modified && original == modified {
            continue;
        }

        let unified_diff = TextDiff::from_lines(original, modified.as_str())
            .unified_diff()
            .context_radius(3)
            .header(&format!("a/{source}"), &format!("b/{file}"))
            .to_string();

        files.push(FilePreview {
            file: file.clone(),
            change,
            original: original.to_string(),
            modified: modified.clone(),
            unified_diff,
            edit_count: plan.edits_for(source).map_or(0, <[_]>::len),
        });
    }

    Ok(RefactoringPreview {
        total_files: files.len(),
        total_edits: plan.edit_count(),
        files,
    })
}

#[cfg(test)]
mod tests {
    use kestrel_core::{DocumentId, Range};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::assemble::assemble;
    use crate::plan::{DocumentEditSet, FileRenameOp, RenameOptions, TextEdit};

    #[test]
    fn renamed_module_is_previewed_at_its_new_path() {
        let main = FileId::new("file:///ws/main.py");
        let module = FileId::new("file:///ws/util.py");
        let renamed = FileId::new("file:///ws/helpers.py");
        let snapshot = Snapshot::new([
            (main.clone(), "import util\nutil.run()\n".to_string()),
            (module.clone(), "def run():\n    pass\n".to_string()),
        ]);
        let plan = assemble(
            vec![DocumentEditSet::new(
                DocumentId::unversioned(main.clone()),
                vec![
                    TextEdit::replace(Range::on_line(0, 7, 11), "helpers"),
                    TextEdit::replace(Range::on_line(1, 0, 4), "helpers"),
                ],
            )],
            vec![FileRenameOp {
                old: module.clone(),
                new: renamed.clone(),
                options: RenameOptions::default(),
            }],
        )
        .unwrap();

        let preview = generate_preview(&snapshot, &plan).unwrap();
        assert_eq!(preview.total_files, 2);
        assert_eq!(preview.total_edits, 2);

        let renamed_preview = &preview.files[0];
        assert_eq!(renamed_preview.file, renamed);
        assert_eq!(
            renamed_preview.change,
            FileChangeKind::Renamed {
                from: module,
                to: renamed.clone()
            }
        );
        assert_eq!(renamed_preview.original, renamed_preview.modified);

        let main_preview = &preview.files[1];
        assert_eq!(main_preview.change, FileChangeKind::Modified);
        assert_eq!(main_preview.edit_count, 2);
        assert_eq!(main_preview.modified, "import helpers\nhelpers.run()\n");
        assert!(main_preview
            .unified_diff
            .starts_with("--- a/file:///ws/main.py\n+++ b/file:///ws/main.py\n"));
        assert!(main_preview.unified_diff.contains("-import util\n"));
        assert!(main_preview.unified_diff.contains("+helpers.run()\n"));
    }
}
