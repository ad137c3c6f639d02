//! The analysis capability the engine consumes, and a fixed in-memory
//! implementation of it.

use kestrel_core::{DocumentId, FileId, Position, Range};
use kestrel_syntax::{collect_name_uses, parse_python, NameRole};
use thiserror::Error;

use crate::snapshot::Snapshot;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolId(pub u32);

/// What a symbol denotes. Rename behaviour is decided by this, never by the
/// symbol's name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Variable,
    Parameter,
    Function,
    Class,
    Attribute,
    /// A module backed by `file` (`pkg/mod.py` or `pkg/__init__.py`).
    Module { file: FileId },
    /// A package backed by the directory `dir`.
    Package { dir: FileId },
}

/// The file-system entry a module or package symbol lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModuleTarget<'a> {
    File(&'a FileId),
    Directory(&'a FileId),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SymbolRef {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
}

impl SymbolRef {
    pub fn module_target(&self) -> Option<ModuleTarget<'_>> {
        match &self.kind {
            SymbolKind::Module { file } => Some(ModuleTarget::File(file)),
            SymbolKind::Package { dir } => Some(ModuleTarget::Directory(dir)),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OccurrenceRole {
    Definition,
    Reference,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Occurrence {
    pub document: DocumentId,
    pub range: Range,
    pub role: OccurrenceRole,
}

impl Occurrence {
    pub fn definition(document: DocumentId, range: Range) -> Self {
        Self {
            document,
            range,
            role: OccurrenceRole::Definition,
        }
    }

    pub fn reference(document: DocumentId, range: Range) -> Self {
        Self {
            document,
            range,
            role: OccurrenceRole::Reference,
        }
    }
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("no symbol at the requested position")]
pub struct UnresolvedSymbol;

/// Name binding and reference search, provided by the host.
///
/// Implementations must be usable from several request threads at once.
pub trait AnalysisBackend: Send + Sync {
    fn resolve_symbol_at(
        &self,
        document: &DocumentId,
        position: Position,
    ) -> Result<SymbolRef, UnresolvedSymbol>;

    fn find_occurrences(&self, symbol: &SymbolRef) -> Vec<Occurrence>;
}

#[derive(Clone, Debug)]
struct StaticSymbol {
    symbol: SymbolRef,
    occurrences: Vec<Occurrence>,
}

/// A backend answering from a fixed table of symbols and occurrences.
///
/// A position resolves to the first registered symbol with an occurrence
/// covering it (end inclusive, so a cursor right after a name still hits).
#[derive(Clone, Debug, Default)]
pub struct StaticAnalysis {
    symbols: Vec<StaticSymbol>,
}

impl StaticAnalysis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_symbol(
        &mut self,
        name: impl Into<String>,
        kind: SymbolKind,
        occurrences: Vec<Occurrence>,
    ) -> SymbolRef {
        let symbol = SymbolRef {
            id: SymbolId(self.symbols.len() as u32),
            name: name.into(),
            kind,
        };
        self.symbols.push(StaticSymbol {
            symbol: symbol.clone(),
            occurrences,
        });
        symbol
    }

    #[must_use]
    pub fn with_symbol(
        mut self,
        name: impl Into<String>,
        kind: SymbolKind,
        occurrences: Vec<Occurrence>,
    ) -> Self {
        self.add_symbol(name, kind, occurrences);
        self
    }

    /// Register a symbol whose occurrences are every identifier spelled
    /// `name` in the snapshot.
    ///
    /// Binding positions become definitions, reads become references.
    /// Attribute names only count for [`SymbolKind::Attribute`]; module and
    /// package symbols treat every spelling (imports included) as a
    /// reference. Files that fail to parse are skipped.
    pub fn add_named_symbol(
        &mut self,
        snapshot: &Snapshot,
        name: &str,
        kind: SymbolKind,
    ) -> SymbolRef {
        let mut occurrences = Vec::new();
        for (file, source) in snapshot.files() {
            let Ok(tree) = parse_python(source.text()) else {
                continue;
            };
            let document = DocumentId::new(file.clone(), source.version());
            for name_use in collect_name_uses(tree.root_node(), source.text()) {
                if name_use.name != name {
                    continue;
                }
                let role = match (&kind, name_use.role) {
                    (SymbolKind::Module { .. } | SymbolKind::Package { .. }, _) => {
                        OccurrenceRole::Reference
                    }
                    (SymbolKind::Attribute, NameRole::Label) => OccurrenceRole::Reference,
                    (_, NameRole::Label) => continue,
                    (_, NameRole::Store) => OccurrenceRole::Definition,
                    (_, NameRole::Load | NameRole::Update) => OccurrenceRole::Reference,
                };
                let range = source.line_index().range(source.text(), name_use.range);
                occurrences.push(Occurrence {
                    document: document.clone(),
                    range,
                    role,
                });
            }
        }
        self.add_symbol(name, kind, occurrences)
    }
}

impl AnalysisBackend for StaticAnalysis {
    fn resolve_symbol_at(
        &self,
        document: &DocumentId,
        position: Position,
    ) -> Result<SymbolRef, UnresolvedSymbol> {
        self.symbols
            .iter()
            .find(|entry| {
                entry.occurrences.iter().any(|occurrence| {
                    occurrence.document.file == document.file
                        && occurrence.range.contains_inclusive(position)
                })
            })
            .map(|entry| entry.symbol.clone())
            .ok_or(UnresolvedSymbol)
    }

    fn find_occurrences(&self, symbol: &SymbolRef) -> Vec<Occurrence> {
        self.symbols
            .iter()
            .find(|entry| entry.symbol.id == symbol.id)
            .map(|entry| entry.occurrences.clone())
            .unwrap_or_default()
    }
}
