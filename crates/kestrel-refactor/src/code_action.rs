use kestrel_core::{DocumentId, Range};

use crate::context::RefactorContext;
use crate::error::RefactorError;
use crate::extract::{extract_function, extract_variable, ExtractParams};
use crate::inline::{inline_variable, InlineParams};
use crate::plan::{CodeActionPlan, Outcome};

/// Refactorings applicable to `range`: extract variable, extract function and
/// inline variable, in that order. Unavailable ones are left out.
pub fn code_actions(
    ctx: &RefactorContext,
    document: &DocumentId,
    range: Range,
) -> Result<Vec<CodeActionPlan>, RefactorError> {
    let extract = ExtractParams {
        document: document.clone(),
        selection: range,
    };
    let outcomes = [
        extract_variable(ctx, extract.clone())?,
        extract_function(ctx, extract)?,
        inline_variable(
            ctx,
            InlineParams {
                document: document.clone(),
                position: range.start,
            },
        )?,
    ];

    let actions: Vec<_> = outcomes.into_iter().filter_map(Outcome::planned).collect();
    tracing::debug!(
        target: "kestrel.refactor",
        file = %document.file,
        actions = actions.len(),
        "code actions computed"
    );
    Ok(actions)
}
