use crate::diff::identifier_edits;
use crate::error::{InvariantViolation, RefactorError};
use crate::occurrence::DocumentOccurrences;
use crate::plan::{sort_and_validate, DocumentEditSet};
use crate::snapshot::Snapshot;

/// Turn every occurrence of `old_name` into minimal-diff edits that spell
/// `new_name`.
///
/// Each occurrence's current text is read from the snapshot, so occurrences
/// that already spell `new_name` produce nothing and documents without edits
/// are left out. An occurrence that spans lines or spells anything else is an
/// [`InvariantViolation::OccurrenceOutOfBounds`].
pub fn synthesize(
    snapshot: &Snapshot,
    documents: &[DocumentOccurrences],
    old_name: &str,
    new_name: &str,
) -> Result<Vec<DocumentEditSet>, RefactorError> {
    let mut out = Vec::with_capacity(documents.len());
    for group in documents {
        let file = &group.document.file;
        let source = snapshot.source(file)?;

        let mut edits = Vec::new();
        for occurrence in &group.occurrences {
            let range = occurrence.range;
            let spelled = (range.start.line == range.end.line)
                .then(|| source.line_index().text_range(source.text(), range))
                .flatten()
                .map(|bytes| &source.text()[bytes]);
            if !matches!(spelled, Some(current) if current == old_name || current == new_name) {
                tracing::warn!(
                    target: "kestrel.refactor",
                    file = %file,
                    range = ?range,
                    found = ?spelled,
                    expected = old_name,
                    "occurrence does not address the symbol's name"
                );
                return Err(InvariantViolation::OccurrenceOutOfBounds {
                    file: file.clone(),
                    range,
                }
                .into());
            }

            let occurrence_edits =
                identifier_edits(source.line_index(), source.text(), occurrence.range, new_name)
                    .ok_or_else(|| InvariantViolation::OccurrenceOutOfBounds {
                        file: file.clone(),
                        range: occurrence.range,
                    })?;
            edits.extend(occurrence_edits);
        }
        if edits.is_empty() {
            continue;
        }

        if let Err(violation) = sort_and_validate(file, &mut edits) {
            tracing::warn!(
                target: "kestrel.refactor",
                file = %file,
                error = %violation,
                "synthesized rename edits overlap"
            );
            return Err(violation.into());
        }
        out.push(DocumentEditSet::new(group.document.clone(), edits));
    }
    Ok(out)
}
