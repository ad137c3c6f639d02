//! Gathering and normalizing the occurrences of the symbol under the cursor.

use std::collections::HashMap;

use kestrel_core::{DocumentId, FileId, Position, Range};

use crate::context::RefactorContext;
use crate::error::{InvariantViolation, RefactorError};
use crate::semantic::{Occurrence, OccurrenceRole, SymbolRef, UnresolvedSymbol};

/// Occurrences of one symbol in one document, sorted by start.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentOccurrences {
    pub document: DocumentId,
    pub occurrences: Vec<Occurrence>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectedOccurrences {
    pub symbol: SymbolRef,
    /// Grouped per document, in the order documents were first seen.
    pub documents: Vec<DocumentOccurrences>,
}

impl CollectedOccurrences {
    pub fn len(&self) -> usize {
        self.documents
            .iter()
            .map(|group| group.occurrences.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Occurrence> {
        self.documents
            .iter()
            .flat_map(|group| group.occurrences.iter())
    }

    /// Keep only the occurrences matching `keep`; documents left empty are
    /// dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(&Occurrence) -> bool) {
        for group in &mut self.documents {
            group.occurrences.retain(&mut keep);
        }
        self.documents.retain(|group| !group.occurrences.is_empty());
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Collected {
    Resolved(CollectedOccurrences),
    Unresolved(UnresolvedSymbol),
}

/// Resolve the symbol at `position` and collect its occurrences against the
/// context's snapshot.
pub fn collect(
    ctx: &RefactorContext,
    document: &DocumentId,
    position: Position,
) -> Result<Collected, RefactorError> {
    ctx.check_cancelled()?;
    ctx.snapshot.checked(document)?;

    let symbol = match ctx.backend.resolve_symbol_at(document, position) {
        Ok(symbol) => symbol,
        Err(unresolved) => {
            tracing::debug!(
                target: "kestrel.refactor",
                file = %document.file,
                line = position.line,
                character = position.character,
                "no symbol at position"
            );
            return Ok(Collected::Unresolved(unresolved));
        }
    };
    let raw = ctx.backend.find_occurrences(&symbol);
    ctx.check_cancelled()?;

    let documents = normalize(ctx, raw)?;
    tracing::debug!(
        target: "kestrel.refactor",
        symbol = %symbol.name,
        occurrences = documents.iter().map(|group| group.occurrences.len()).sum::<usize>(),
        documents = documents.len(),
        "collected occurrences"
    );
    Ok(Collected::Resolved(CollectedOccurrences { symbol, documents }))
}

fn normalize(
    ctx: &RefactorContext,
    raw: Vec<Occurrence>,
) -> Result<Vec<DocumentOccurrences>, RefactorError> {
    let mut documents: Vec<DocumentOccurrences> = Vec::new();
    let mut group_of: HashMap<FileId, usize> = HashMap::new();
    let mut seen: HashMap<(FileId, Range), (usize, usize)> = HashMap::new();

    for occurrence in raw {
        let file = occurrence.document.file.clone();
        let source = ctx.snapshot.checked(&occurrence.document)?;

        if !occurrence.range.is_well_formed() {
            tracing::warn!(
                target: "kestrel.refactor",
                file = %file,
                range = ?occurrence.range,
                "backend returned an inverted occurrence range"
            );
            return Err(InvariantViolation::InvertedRange {
                file,
                range: occurrence.range,
            }
            .into());
        }
        if occurrence.range.start.line >= source.line_index().line_count() {
            return Err(InvariantViolation::OccurrenceOutOfBounds {
                file,
                range: occurrence.range,
            }
            .into());
        }

        let range = source
            .line_index()
            .clamp_range(source.text(), occurrence.range);

        let group_idx = *group_of.entry(file.clone()).or_insert_with(|| {
            documents.push(DocumentOccurrences {
                document: DocumentId::new(file.clone(), source.version()),
                occurrences: Vec::new(),
            });
            documents.len() - 1
        });

        match seen.get(&(file.clone(), range)) {
            Some(&(group, idx)) => {
                // Duplicate report of one site: a definition wins.
                if occurrence.role == OccurrenceRole::Definition {
                    documents[group].occurrences[idx].role = OccurrenceRole::Definition;
                }
            }
            None => {
                let group = &mut documents[group_idx];
                seen.insert((file, range), (group_idx, group.occurrences.len()));
                group.occurrences.push(Occurrence {
                    document: group.document.clone(),
                    range,
                    role: occurrence.role,
                });
            }
        }
    }

    for group in &mut documents {
        group
            .occurrences
            .sort_by_key(|occurrence| (occurrence.range.start, occurrence.range.end));
    }
    Ok(documents)
}
