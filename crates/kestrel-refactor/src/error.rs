use kestrel_core::{EditError, FileId, Range};
use kestrel_syntax::{IdentifierError, ParseError};
use thiserror::Error;

use crate::plan::Outcome;

/// Why a refactoring is not offered at the requested location.
///
/// These are ordinary outcomes, not failures: the editor simply shows no
/// action (or a "cannot rename here" message).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    UnresolvedSymbol,
    InvalidSelection,
    UnsafeContext(&'static str),
    CollisionUnresolvable,
    NotInlinable(&'static str),
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnavailableReason::UnresolvedSymbol => f.write_str("no symbol at this position"),
            UnavailableReason::InvalidSelection => {
                f.write_str("selection does not cover an expression or whole statements")
            }
            UnavailableReason::UnsafeContext(context) => {
                write!(f, "cannot extract from {context}")
            }
            UnavailableReason::CollisionUnresolvable => {
                f.write_str("could not find an unused name")
            }
            UnavailableReason::NotInlinable(reason) => write!(f, "cannot inline: {reason}"),
        }
    }
}

/// Internal consistency checks on produced edits. Any of these is a defect in
/// the engine or in the analysis backend, never a user error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("overlapping edits in {file}: {first:?} overlaps {second:?}")]
    OverlappingEdits {
        file: FileId,
        first: Range,
        second: Range,
    },
    #[error("inverted range {range:?} in {file}")]
    InvertedRange { file: FileId, range: Range },
    #[error("occurrence {range:?} is outside the text of {file}")]
    OccurrenceOutOfBounds { file: FileId, range: Range },
    #[error("{file} is renamed more than once")]
    DuplicateRename { file: FileId },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefactorError {
    #[error(transparent)]
    InvariantViolation(#[from] InvariantViolation),
    #[error("{file} is at version {actual:?}, but the request was computed against {expected:?}")]
    VersionMismatch {
        file: FileId,
        expected: Option<i32>,
        actual: Option<i32>,
    },
    #[error("unknown file {0}")]
    UnknownFile(FileId),
    #[error("`{name}` is not a valid name: {reason}")]
    InvalidIdentifier {
        name: String,
        reason: IdentifierError,
    },
    #[error("cannot rename {file}: {reason}")]
    InvalidFileId { file: FileId, reason: &'static str },
    #[error("request was cancelled")]
    Cancelled,
    #[error(transparent)]
    Edit(#[from] EditError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl RefactorError {
    /// `true` for errors that indicate a bug rather than a stale or invalid
    /// request.
    pub fn is_defect(&self) -> bool {
        matches!(
            self,
            RefactorError::InvariantViolation(_) | RefactorError::Edit(_) | RefactorError::Parse(_)
        )
    }
}

/// Early exit from a planner: either the action is not offered here, or the
/// request failed. Lets planners use `?` for both.
#[derive(Debug)]
pub(crate) enum Halt {
    Unavailable(UnavailableReason),
    Error(RefactorError),
}

impl From<UnavailableReason> for Halt {
    fn from(reason: UnavailableReason) -> Self {
        Halt::Unavailable(reason)
    }
}

impl From<RefactorError> for Halt {
    fn from(err: RefactorError) -> Self {
        Halt::Error(err)
    }
}

impl From<ParseError> for Halt {
    fn from(err: ParseError) -> Self {
        Halt::Error(err.into())
    }
}

impl From<InvariantViolation> for Halt {
    fn from(err: InvariantViolation) -> Self {
        Halt::Error(err.into())
    }
}

/// Split a planner result into the public `Result<Outcome<_>>` shape.
pub(crate) fn finish<T>(
    action: &'static str,
    result: Result<T, Halt>,
) -> Result<Outcome<T>, RefactorError> {
    match result {
        Ok(planned) => Ok(Outcome::Planned(planned)),
        Err(Halt::Unavailable(reason)) => {
            tracing::debug!(target: "kestrel.refactor", action, reason = %reason, "refactoring unavailable");
            Ok(Outcome::Unavailable(reason))
        }
        Err(Halt::Error(err)) => Err(err),
    }
}
