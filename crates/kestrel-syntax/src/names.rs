use thiserror::Error;

/// Hard keywords of Python 3. Soft keywords (`match`, `case`, `type`, `_`)
/// are valid identifiers and deliberately absent.
pub const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

/// Names from the `builtins` module that a fresh binding must not shadow.
pub const BUILTINS: &[&str] = &[
    "abs", "aiter", "all", "anext", "any", "ascii", "bin", "bool", "breakpoint", "bytearray",
    "bytes", "callable", "chr", "classmethod", "compile", "complex", "copyright", "credits",
    "delattr", "dict", "dir", "divmod", "enumerate", "eval", "exec", "exit", "filter", "float",
    "format", "frozenset", "getattr", "globals", "hasattr", "hash", "help", "hex", "id",
    "input", "int", "isinstance", "issubclass", "iter", "len", "license", "list", "locals",
    "map", "max", "memoryview", "min", "next", "object", "oct", "open", "ord", "pow", "print",
    "property", "quit", "range", "repr", "reversed", "round", "set", "setattr", "slice",
    "sorted", "staticmethod", "str", "sum", "super", "tuple", "type", "vars", "zip",
    "__build_class__", "__debug__", "__doc__", "__import__", "__loader__", "__name__",
    "__package__", "__spec__", "ArithmeticError", "AssertionError", "AttributeError",
    "BaseException", "BaseExceptionGroup", "BlockingIOError", "BrokenPipeError", "BufferError",
    "BytesWarning", "ChildProcessError", "ConnectionAbortedError", "ConnectionError",
    "ConnectionRefusedError", "ConnectionResetError", "DeprecationWarning", "EOFError",
    "Ellipsis", "EncodingWarning", "EnvironmentError", "Exception", "ExceptionGroup",
    "FileExistsError", "FileNotFoundError", "FloatingPointError", "FutureWarning",
    "GeneratorExit", "IOError", "ImportError", "ImportWarning", "IndentationError",
    "IndexError", "InterruptedError", "IsADirectoryError", "KeyError", "KeyboardInterrupt",
    "LookupError", "MemoryError", "ModuleNotFoundError", "NameError", "NotADirectoryError",
    "NotImplemented", "NotImplementedError", "OSError", "OverflowError",
    "PendingDeprecationWarning", "PermissionError", "ProcessLookupError", "RecursionError",
    "ReferenceError", "ResourceWarning", "RuntimeError", "RuntimeWarning",
    "StopAsyncIteration", "StopIteration", "SyntaxError", "SyntaxWarning", "SystemError",
    "SystemExit", "TabError", "TimeoutError", "TypeError", "UnboundLocalError",
    "UnicodeDecodeError", "UnicodeEncodeError", "UnicodeError", "UnicodeTranslateError",
    "UnicodeWarning", "UserWarning", "ValueError", "Warning", "ZeroDivisionError",
];

pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("identifier is empty")]
    Empty,
    #[error("identifier cannot start with {0:?}")]
    InvalidStart(char),
    #[error("identifier cannot contain {0:?}")]
    InvalidChar(char),
    #[error("`{0}` is a reserved keyword")]
    Keyword(String),
}

/// Check that `name` is usable as a Python binding name.
///
/// Python identifiers follow Unicode `XID_Start`/`XID_Continue` with `_`
/// allowed in the first position.
pub fn validate_identifier(name: &str) -> Result<(), IdentifierError> {
    let mut chars = name.chars();
    let first = chars.next().ok_or(IdentifierError::Empty)?;
    if first != '_' && !unicode_ident::is_xid_start(first) {
        return Err(IdentifierError::InvalidStart(first));
    }
    if let Some(bad) = chars.find(|&c| !unicode_ident::is_xid_continue(c)) {
        return Err(IdentifierError::InvalidChar(bad));
    }
    if is_keyword(name) {
        return Err(IdentifierError::Keyword(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn accepts_unicode_and_soft_keywords() {
        assert_eq!(validate_identifier("my_function_1"), Ok(()));
        assert_eq!(validate_identifier("_private"), Ok(()));
        assert_eq!(validate_identifier("größe"), Ok(()));
        assert_eq!(validate_identifier("match"), Ok(()));
    }

    #[test]
    fn rejects_malformed_names() {
        assert_eq!(validate_identifier(""), Err(IdentifierError::Empty));
        assert_eq!(
            validate_identifier("1abc"),
            Err(IdentifierError::InvalidStart('1'))
        );
        assert_eq!(
            validate_identifier("a-b"),
            Err(IdentifierError::InvalidChar('-'))
        );
        assert_eq!(
            validate_identifier("lambda"),
            Err(IdentifierError::Keyword("lambda".to_string()))
        );
    }

    #[test]
    fn builtins_are_not_keywords() {
        assert!(is_builtin("print"));
        assert!(!is_keyword("print"));
        assert!(is_keyword("None"));
    }
}
