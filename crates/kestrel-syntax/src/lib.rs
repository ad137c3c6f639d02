//! Python syntax helpers for Kestrel refactorings.
//!
//! Parsing is delegated to `tree-sitter-python`; this crate adds the
//! classification and scope queries the refactoring engine needs on top of the
//! concrete syntax tree (what is an expression, which identifiers bind names,
//! where a statement starts and how it is indented).

mod kinds;
mod names;
mod scope;

use std::cell::RefCell;

use kestrel_core::{TextRange, TextSize};
use thiserror::Error;

pub use kinds::{
    has_side_effects, is_atomic_expression, is_expression, is_literal, is_loop, is_scope,
    is_statement, is_statement_container,
};
pub use names::{is_builtin, is_keyword, validate_identifier, IdentifierError, BUILTINS, KEYWORDS};
pub use scope::{
    collect_name_uses, detect_indent_unit, enclosing_scopes, enclosing_statement, line_indent,
    name_role, scope_bindings, top_level_statement, NameRole, NameUse,
};
pub use tree_sitter::{Node, Tree};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("tree-sitter-python language load failed")]
    LanguageLoad,
    #[error("tree-sitter parser is already in use")]
    ParserBusy,
    #[error("tree-sitter failed to produce a syntax tree")]
    NoTree,
}

thread_local! {
    static PYTHON_PARSER: RefCell<Result<tree_sitter::Parser, ParseError>> = RefCell::new({
        let mut parser = tree_sitter::Parser::new();
        match parser.set_language(tree_sitter_python::language()) {
            Ok(()) => Ok(parser),
            Err(_) => Err(ParseError::LanguageLoad),
        }
    });
}

/// Parse Python source text with `tree-sitter-python`.
///
/// Syntax errors do not fail the parse; they show up as `ERROR` / missing
/// nodes in the returned tree (see [`Node::has_error`]).
pub fn parse_python(source: &str) -> Result<Tree, ParseError> {
    PYTHON_PARSER.with(|parser_cell| {
        let mut parser = parser_cell
            .try_borrow_mut()
            .map_err(|_| ParseError::ParserBusy)?;
        let parser = match parser.as_mut() {
            Ok(parser) => parser,
            Err(err) => return Err(err.clone()),
        };

        let tree = parser.parse(source, None).ok_or(ParseError::NoTree)?;
        if tree.root_node().has_error() {
            tracing::trace!(len = source.len(), "python source parsed with errors");
        }
        Ok(tree)
    })
}

/// Visit a node and all its descendants in pre-order.
pub fn visit_nodes<'a, F: FnMut(Node<'a>)>(node: Node<'a>, f: &mut F) {
    f(node);
    if node.child_count() == 0 {
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit_nodes(child, f);
    }
}

/// Return the source text covered by `node`.
pub fn node_text<'a>(source: &'a str, node: Node<'_>) -> &'a str {
    &source[node.byte_range()]
}

pub fn node_range(node: Node<'_>) -> TextRange {
    TextRange::new(
        TextSize::from(node.start_byte() as u32),
        TextSize::from(node.end_byte() as u32),
    )
}

/// Named children of `node`, skipping comments.
pub fn named_children<'a>(node: Node<'a>) -> Vec<Node<'a>> {
    let mut cursor = node.walk();
    let children = node
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect();
    children
}

/// The token at a cursor offset.
///
/// A cursor sitting right after an identifier or literal (`foo|(`) is treated
/// as being on that token, matching how editors report word positions.
pub fn token_at(root: Node<'_>, offset: usize) -> Option<Node<'_>> {
    let at = root.descendant_for_byte_range(offset, offset)?;
    if at.child_count() == 0 && at.is_named() && at.start_byte() <= offset {
        return Some(at);
    }

    if offset > 0 {
        if let Some(before) = root.descendant_for_byte_range(offset - 1, offset - 1) {
            if before.child_count() == 0 && before.is_named() && before.end_byte() == offset {
                return Some(before);
            }
        }
    }

    Some(at)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_module_and_reports_errors() {
        let tree = parse_python("x = 1\n").unwrap();
        assert_eq!(tree.root_node().kind(), "module");
        assert!(!tree.root_node().has_error());

        let broken = parse_python("def (:\n").unwrap();
        assert!(broken.root_node().has_error());
    }

    #[test]
    fn token_at_prefers_identifier_before_cursor() {
        let source = "foo(bar)\n";
        let tree = parse_python(source).unwrap();
        let root = tree.root_node();

        let tok = token_at(root, 3).unwrap();
        assert_eq!(tok.kind(), "identifier");
        assert_eq!(node_text(source, tok), "foo");

        let tok = token_at(root, 4).unwrap();
        assert_eq!(node_text(source, tok), "bar");
    }
}
