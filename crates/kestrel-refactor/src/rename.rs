use kestrel_core::{DocumentId, FileId, Position};
use kestrel_syntax::validate_identifier;
use tracing::instrument;
use url::Url;

use crate::assemble::assemble;
use crate::context::RefactorContext;
use crate::error::{RefactorError, UnavailableReason};
use crate::occurrence::{collect, Collected};
use crate::plan::{FileRenameOp, Outcome, RenameOptions, WorkspaceEditPlan};
use crate::semantic::{ModuleTarget, OccurrenceRole};
use crate::synthesize::synthesize;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenameParams {
    pub document: DocumentId,
    pub position: Position,
    pub new_name: String,
}

/// Rename the symbol at `params.position` to `params.new_name`.
///
/// Module and package symbols additionally rename their file or directory;
/// the plan then carries exactly one [`FileRenameOp`] after the text edits.
#[instrument(level = "debug", skip_all, fields(file = %params.document.file, new_name = %params.new_name))]
pub fn rename(ctx: &RefactorContext, params: RenameParams) -> Result<Outcome, RefactorError> {
    ctx.snapshot.checked(&params.document)?;
    validate_identifier(&params.new_name).map_err(|reason| RefactorError::InvalidIdentifier {
        name: params.new_name.clone(),
        reason,
    })?;

    let mut collected = match collect(ctx, &params.document, params.position)? {
        Collected::Resolved(collected) => collected,
        Collected::Unresolved(_) => {
            tracing::debug!(target: "kestrel.refactor", reason = "unresolved", "rename unavailable");
            return Ok(Outcome::Unavailable(UnavailableReason::UnresolvedSymbol));
        }
    };

    if collected.symbol.name == params.new_name {
        return Ok(Outcome::Planned(WorkspaceEditPlan::default()));
    }

    let mut renames = Vec::new();
    if let Some(target) = collected.symbol.module_target() {
        let op = module_rename(target, &params.new_name, ctx.config.rename_options())?;
        // The module itself is renamed on disk, not edited.
        collected.retain(|occurrence| {
            occurrence.role != OccurrenceRole::Definition
                || !is_within(&occurrence.document.file, &op.old)
        });
        renames.push(op);
    }

    let edit_sets = synthesize(
        &ctx.snapshot,
        &collected.documents,
        &collected.symbol.name,
        &params.new_name,
    )?;
    ctx.check_cancelled()?;

    let plan = assemble(edit_sets, renames)?;
    tracing::debug!(
        target: "kestrel.refactor",
        symbol = %collected.symbol.name,
        documents = plan.edit_sets().count(),
        edits = plan.edit_count(),
        file_renames = plan.renames().count(),
        "rename planned"
    );
    Ok(Outcome::Planned(plan))
}

/// The file-system rename for a module or package symbol.
///
/// `pkg/mod.py` becomes `pkg/<new>.py`; `pkg/__init__.py` and the package
/// directory `pkg` both rename the directory itself.
pub fn module_rename(
    target: ModuleTarget<'_>,
    new_name: &str,
    options: RenameOptions,
) -> Result<FileRenameOp, RefactorError> {
    let (file, is_dir) = match target {
        ModuleTarget::File(file) => (file, false),
        ModuleTarget::Directory(dir) => (dir, true),
    };
    let url = Url::parse(file.as_str()).map_err(|_| RefactorError::InvalidFileId {
        file: file.clone(),
        reason: "not a valid URI",
    })?;

    let mut segments: Vec<String> = url
        .path_segments()
        .ok_or_else(|| RefactorError::InvalidFileId {
            file: file.clone(),
            reason: "URI has no path",
        })?
        .map(str::to_string)
        .collect();
    if segments.last().is_some_and(|last| last.is_empty()) {
        segments.pop();
    }
    let last = segments.pop().ok_or_else(|| RefactorError::InvalidFileId {
        file: file.clone(),
        reason: "URI path is empty",
    })?;

    let (old_dir_segments, renamed) = if is_dir {
        (segments, new_name.to_string())
    } else {
        match last.rsplit_once('.') {
            Some(("__init__", _)) => {
                // A package's `__init__` module: rename the package directory.
                let mut parent = segments;
                let dir = parent.pop().ok_or_else(|| RefactorError::InvalidFileId {
                    file: file.clone(),
                    reason: "package module has no parent directory",
                })?;
                let old = with_segments(&url, &parent, Some(&dir))?;
                let new = with_segments(&url, &parent, Some(new_name))?;
                return Ok(FileRenameOp {
                    old: FileId::new(old),
                    new: FileId::new(new),
                    options,
                });
            }
            Some((_, ext)) => (segments, format!("{new_name}.{ext}")),
            None => (segments, new_name.to_string()),
        }
    };

    let old = with_segments(&url, &old_dir_segments, Some(&last))?;
    let new = with_segments(&url, &old_dir_segments, Some(&renamed))?;
    Ok(FileRenameOp {
        old: FileId::new(old),
        new: FileId::new(new),
        options,
    })
}

/// Whether `file` is `moved` itself or lies under it as a directory.
fn is_within(file: &FileId, moved: &FileId) -> bool {
    let moved = moved.as_str().trim_end_matches('/');
    file.as_str()
        .strip_prefix(moved)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

fn with_segments(
    base: &Url,
    dir: &[String],
    last: Option<&str>,
) -> Result<String, RefactorError> {
    let mut url = base.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|()| RefactorError::InvalidFileId {
                file: FileId::new(base.as_str()),
                reason: "URI cannot hold a path",
            })?;
        path.clear();
        path.extend(dir);
        if let Some(last) = last {
            path.push(last);
        }
    }
    Ok(url.to_string())
}
