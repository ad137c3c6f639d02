//! Utilities shared by Kestrel tests.
//!
//! Fixtures are plain Python snippets annotated with markers:
//! `/*start*/ … /*end*/` for a selection, `/*caret*/` for a cursor, and `$0`,
//! `$1`, … in multi-file fixtures introduced by `//- /path.py` headers.

mod fixtures;

pub use fixtures::*;
