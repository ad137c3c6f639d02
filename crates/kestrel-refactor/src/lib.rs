//! Refactoring engine for Kestrel.
//!
//! Every request reads one immutable [`Snapshot`] through a
//! [`RefactorContext`] and produces either a [`WorkspaceEditPlan`] or an
//! [`UnavailableReason`]; nothing here touches the file system. This crate
//! exposes:
//! - Rename of variables, functions, classes, attributes, modules and packages
//!   (`rename`), with minimal-diff edits per occurrence
//! - Extract variable and extract function (`extract`)
//! - Inline variable (`inline`)
//! - Code action discovery over those refactorings (`code_actions`)
//! - Plan application, unified-diff previews and LSP conversion

mod assemble;
mod code_action;
mod config;
mod context;
mod diff;
mod error;
mod extract;
mod inline;
pub mod lsp;
mod naming;
mod occurrence;
mod plan;
mod preview;
mod rename;
mod semantic;
mod snapshot;
mod synthesize;

pub use assemble::{apply_plan, assemble};
pub use code_action::code_actions;
pub use config::{ConfigError, RefactorConfig};
pub use context::RefactorContext;
pub use diff::{identifier_edits, split_identifier, IdentifierEdit};
pub use error::{InvariantViolation, RefactorError, UnavailableReason};
pub use extract::{extract_function, extract_variable, ExtractParams};
pub use inline::{inline_variable, InlineParams};
pub use naming::{NamingPolicy, SuffixNaming};
pub use occurrence::{collect, Collected, CollectedOccurrences, DocumentOccurrences};
pub use plan::{
    CodeActionPlan, DocumentEditSet, FileRenameOp, Outcome, PlanOperation, RefactorKind,
    RenameOptions, TextEdit, WorkspaceEditPlan,
};
pub use preview::{generate_preview, FileChangeKind, FilePreview, RefactoringPreview};
pub use rename::{module_rename, rename, RenameParams};
pub use semantic::{
    AnalysisBackend, ModuleTarget, Occurrence, OccurrenceRole, StaticAnalysis, SymbolId,
    SymbolKind, SymbolRef, UnresolvedSymbol,
};
pub use snapshot::{Snapshot, SourceFile};
pub use synthesize::synthesize;

pub use kestrel_core::{CancellationToken, DocumentId, FileId, Position, Range};
