//! Core shared types for Kestrel.
//!
//! This crate is intentionally small: the text coordinate system every other
//! crate shares, document identifiers, and a cancellation flag.

mod cancel;
mod edit;
mod text;

pub use cancel::CancellationToken;
pub use edit::{apply_text_edits, normalize_text_edits, EditError, OffsetEdit};
pub use text::{LineIndex, Position, Range, TextRange, TextSize};

use serde::{Deserialize, Serialize};

/// Identifier for a workspace file or directory.
///
/// The value is an opaque URI string (`file:///...`); it is compared and
/// ordered as a string and never interpreted as a raw path by the engine.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub String);

impl FileId {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file together with the document version a request was computed against.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId {
    pub file: FileId,
    pub version: Option<i32>,
}

impl DocumentId {
    pub fn new(file: FileId, version: Option<i32>) -> Self {
        Self { file, version }
    }

    pub fn versioned(file: FileId, version: i32) -> Self {
        Self {
            file,
            version: Some(version),
        }
    }

    pub fn unversioned(file: FileId) -> Self {
        Self {
            file,
            version: None,
        }
    }
}
