use lsp_types::{
    CodeAction, CodeActionKind, CodeActionOrCommand, DocumentChangeOperation, DocumentChanges,
    OneOf, OptionalVersionedTextDocumentIdentifier, RenameFile, RenameFileOptions, ResourceOp,
    TextDocumentEdit, TextEdit as LspTextEdit, Uri, WorkspaceEdit as LspWorkspaceEdit,
};
use serde_json::json;
use thiserror::Error;

use kestrel_core::FileId;

use crate::plan::{CodeActionPlan, Outcome, PlanOperation, RefactorKind, WorkspaceEditPlan};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LspConversionError {
    #[error("invalid uri for {0:?}")]
    InvalidUri(FileId),
}

/// Convert a plan into an LSP [`WorkspaceEdit`](LspWorkspaceEdit).
///
/// Always uses `documentChanges` so that versions and file renames survive;
/// operations keep the plan's order (text edits first, then renames).
pub fn plan_to_lsp(plan: &WorkspaceEditPlan) -> Result<LspWorkspaceEdit, LspConversionError> {
    let mut operations = Vec::with_capacity(plan.operations.len());
    for operation in &plan.operations {
        let converted = match operation {
            PlanOperation::Edit(set) => DocumentChangeOperation::Edit(TextDocumentEdit {
                text_document: OptionalVersionedTextDocumentIdentifier {
                    uri: file_id_to_uri(set.file())?,
                    version: set.document.version,
                },
                edits: set
                    .edits
                    .iter()
                    .map(|edit| {
                        OneOf::Left(LspTextEdit {
                            range: edit.range.into(),
                            new_text: edit.new_text.clone(),
                        })
                    })
                    .collect(),
            }),
            PlanOperation::Rename(rename) => {
                DocumentChangeOperation::Op(ResourceOp::Rename(RenameFile {
                    old_uri: file_id_to_uri(&rename.old)?,
                    new_uri: file_id_to_uri(&rename.new)?,
                    options: Some(RenameFileOptions {
                        overwrite: Some(rename.options.overwrite),
                        ignore_if_exists: Some(rename.options.ignore_if_exists),
                    }),
                    annotation_id: None,
                }))
            }
        };
        operations.push(converted);
    }

    Ok(LspWorkspaceEdit {
        changes: None,
        document_changes: Some(DocumentChanges::Operations(operations)),
        change_annotations: None,
    })
}

pub fn code_action_kind(kind: RefactorKind) -> CodeActionKind {
    match kind {
        RefactorKind::ExtractVariable | RefactorKind::ExtractFunction => {
            CodeActionKind::REFACTOR_EXTRACT
        }
        RefactorKind::InlineVariable => CodeActionKind::REFACTOR_INLINE,
    }
}

pub fn code_action_to_lsp(action: &CodeActionPlan) -> Result<CodeAction, LspConversionError> {
    Ok(CodeAction {
        title: action.title.clone(),
        kind: Some(code_action_kind(action.kind)),
        diagnostics: None,
        edit: Some(plan_to_lsp(&action.plan)?),
        command: None,
        is_preferred: None,
        disabled: None,
        data: Some(json!({ "tag": action.kind.tag() })),
    })
}

/// `None` when there is nothing to offer, matching the LSP `null` result.
pub fn code_actions_to_lsp(
    actions: &[CodeActionPlan],
) -> Result<Option<Vec<CodeActionOrCommand>>, LspConversionError> {
    if actions.is_empty() {
        return Ok(None);
    }
    actions
        .iter()
        .map(|action| code_action_to_lsp(action).map(CodeActionOrCommand::CodeAction))
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// A rename outcome as the `textDocument/rename` result: unavailable renames
/// map to `null`.
pub fn outcome_to_lsp(outcome: &Outcome) -> Result<Option<LspWorkspaceEdit>, LspConversionError> {
    match outcome {
        Outcome::Planned(plan) => plan_to_lsp(plan).map(Some),
        Outcome::Unavailable(_) => Ok(None),
    }
}

fn file_id_to_uri(file: &FileId) -> Result<Uri, LspConversionError> {
    file.as_str()
        .parse::<Uri>()
        .map_err(|_| LspConversionError::InvalidUri(file.clone()))
}

#[cfg(test)]
mod tests {
    use kestrel_core::{DocumentId, Position, Range};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::UnavailableReason;
    use crate::plan::{DocumentEditSet, FileRenameOp, RenameOptions, TextEdit};

    fn uri(value: &str) -> Uri {
        value.parse().unwrap()
    }

    #[test]
    fn edits_and_renames_become_document_change_operations() {
        let plan = WorkspaceEditPlan {
            operations: vec![
                PlanOperation::Edit(DocumentEditSet::new(
                    DocumentId::versioned(FileId::new("file:///ws/main.py"), 3),
                    vec![TextEdit::insert(Position::new(0, 2), "_")],
                )),
                PlanOperation::Rename(FileRenameOp {
                    old: FileId::new("file:///ws/util.py"),
                    new: FileId::new("file:///ws/helpers.py"),
                    options: RenameOptions::default(),
                }),
            ],
        };

        let edit = plan_to_lsp(&plan).unwrap();
        assert_eq!(edit.changes, None);
        assert_eq!(
            edit.document_changes,
            Some(DocumentChanges::Operations(vec![
                DocumentChangeOperation::Edit(TextDocumentEdit {
                    text_document: OptionalVersionedTextDocumentIdentifier {
                        uri: uri("file:///ws/main.py"),
                        version: Some(3),
                    },
                    edits: vec![OneOf::Left(LspTextEdit {
                        range: lsp_types::Range {
                            start: lsp_types::Position::new(0, 2),
                            end: lsp_types::Position::new(0, 2),
                        },
                        new_text: "_".to_string(),
                    })],
                }),
                DocumentChangeOperation::Op(ResourceOp::Rename(RenameFile {
                    old_uri: uri("file:///ws/util.py"),
                    new_uri: uri("file:///ws/helpers.py"),
                    options: Some(RenameFileOptions {
                        overwrite: Some(true),
                        ignore_if_exists: Some(true),
                    }),
                    annotation_id: None,
                })),
            ]))
        );
    }

    #[test]
    fn code_actions_carry_kind_and_tag() {
        let action = CodeActionPlan {
            title: "Extract expression into variable 'jls_extract_var'".to_string(),
            kind: RefactorKind::ExtractVariable,
            plan: WorkspaceEditPlan {
                operations: vec![PlanOperation::Edit(DocumentEditSet::new(
                    DocumentId::unversioned(FileId::new("file:///a.py")),
                    vec![TextEdit::replace(Range::on_line(0, 4, 9), "jls_extract_var")],
                ))],
            },
        };

        let converted = code_action_to_lsp(&action).unwrap();
        assert_eq!(converted.title, action.title);
        assert_eq!(converted.kind, Some(CodeActionKind::REFACTOR_EXTRACT));
        assert_eq!(converted.data, Some(json!({ "tag": "extract-to-variable" })));

        assert_eq!(code_actions_to_lsp(&[]).unwrap(), None);
        assert_eq!(
            code_actions_to_lsp(std::slice::from_ref(&action))
                .unwrap()
                .map(|actions| actions.len()),
            Some(1)
        );
    }

    #[test]
    fn unavailable_outcomes_are_null_and_bad_uris_fail() {
        assert_eq!(
            outcome_to_lsp(&Outcome::Unavailable(UnavailableReason::UnresolvedSymbol)),
            Ok(None)
        );

        let plan = WorkspaceEditPlan {
            operations: vec![PlanOperation::Edit(DocumentEditSet::new(
                DocumentId::unversioned(FileId::new("not a uri")),
                vec![TextEdit::insert(Position::new(0, 0), "x")],
            ))],
        };
        assert_eq!(
            plan_to_lsp(&plan),
            Err(LspConversionError::InvalidUri(FileId::new("not a uri")))
        );
    }
}
