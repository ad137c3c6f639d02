use std::collections::BTreeMap;
use std::sync::Arc;

use kestrel_core::{DocumentId, FileId, LineIndex};

use crate::error::RefactorError;

/// One file of a [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    text: String,
    version: Option<i32>,
    line_index: LineIndex,
}

impl SourceFile {
    pub fn new(text: impl Into<String>, version: Option<i32>) -> Self {
        let text = text.into();
        let line_index = LineIndex::new(&text);
        Self {
            text,
            version,
            line_index,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn version(&self) -> Option<i32> {
        self.version
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.line_index
    }
}

/// Immutable view of the workspace a request is computed against.
///
/// Cloning is cheap; every request uses one snapshot from start to finish.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    files: Arc<BTreeMap<FileId, SourceFile>>,
}

impl Snapshot {
    /// Snapshot of unversioned files.
    pub fn new(files: impl IntoIterator<Item = (FileId, String)>) -> Self {
        Self::from_sources(
            files
                .into_iter()
                .map(|(file, text)| (file, SourceFile::new(text, None))),
        )
    }

    /// Snapshot of open documents with editor versions.
    pub fn versioned(files: impl IntoIterator<Item = (FileId, i32, String)>) -> Self {
        Self::from_sources(
            files
                .into_iter()
                .map(|(file, version, text)| (file, SourceFile::new(text, Some(version)))),
        )
    }

    pub fn from_sources(files: impl IntoIterator<Item = (FileId, SourceFile)>) -> Self {
        Self {
            files: Arc::new(files.into_iter().collect()),
        }
    }

    pub fn file(&self, file: &FileId) -> Option<&SourceFile> {
        self.files.get(file)
    }

    pub fn text(&self, file: &FileId) -> Option<&str> {
        self.file(file).map(SourceFile::text)
    }

    pub fn contains(&self, file: &FileId) -> bool {
        self.files.contains_key(file)
    }

    pub fn files(&self) -> impl Iterator<Item = (&FileId, &SourceFile)> {
        self.files.iter()
    }

    /// The snapshot's identity for `file`, carrying its version.
    pub fn document(&self, file: &FileId) -> Option<DocumentId> {
        self.file(file)
            .map(|source| DocumentId::new(file.clone(), source.version()))
    }

    /// Plain `file -> text` map of the whole snapshot.
    pub fn texts(&self) -> BTreeMap<FileId, String> {
        self.files
            .iter()
            .map(|(file, source)| (file.clone(), source.text.clone()))
            .collect()
    }

    pub(crate) fn source(&self, file: &FileId) -> Result<&SourceFile, RefactorError> {
        self.file(file)
            .ok_or_else(|| RefactorError::UnknownFile(file.clone()))
    }

    /// Look up `document`, failing when the caller computed its request
    /// against a different version than the one in this snapshot.
    pub(crate) fn checked(&self, document: &DocumentId) -> Result<&SourceFile, RefactorError> {
        let source = self.source(&document.file)?;
        match document.version {
            Some(expected) if source.version != Some(expected) => {
                tracing::warn!(
                    target: "kestrel.refactor",
                    file = %document.file,
                    expected,
                    actual = ?source.version,
                    "document version does not match snapshot"
                );
                Err(RefactorError::VersionMismatch {
                    file: document.file.clone(),
                    expected: Some(expected),
                    actual: source.version,
                })
            }
            _ => Ok(source),
        }
    }
}
