//! Name and scope queries over the Python syntax tree.

use std::collections::BTreeSet;

use kestrel_core::TextRange;
use tree_sitter::Node;

use crate::kinds::{is_scope, is_statement, is_statement_container};
use crate::{node_range, node_text, visit_nodes};

/// How an identifier participates in name binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameRole {
    /// The identifier reads a variable.
    Load,
    /// The identifier binds a variable (assignment target, parameter,
    /// definition name, loop target, import, alias, `global`/`nonlocal`).
    Store,
    /// Target of an augmented assignment (`x += 1`): read, then rebound.
    Update,
    /// The identifier names something that is not a variable: an attribute,
    /// a keyword argument or a module path segment.
    Label,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameUse {
    pub name: String,
    pub range: TextRange,
    pub role: NameRole,
    /// Whether the identifier sits inside a function, class, lambda or
    /// comprehension nested below the queried node.
    pub in_nested_scope: bool,
}

impl NameUse {
    /// Whether this use (re)binds the name.
    pub fn binds(&self) -> bool {
        matches!(self.role, NameRole::Store | NameRole::Update)
    }

    /// Whether this use reads the current value of the name.
    pub fn reads(&self) -> bool {
        matches!(self.role, NameRole::Load | NameRole::Update)
    }
}

fn is_field<'a>(parent: Node<'a>, field: &str, node: Node<'a>) -> bool {
    parent.child_by_field_name(field) == Some(node)
}

/// Classify an `identifier` node. Returns `None` for other node kinds.
pub fn name_role(node: Node<'_>) -> Option<NameRole> {
    if node.kind() != "identifier" {
        return None;
    }
    let Some(parent) = node.parent() else {
        return Some(NameRole::Load);
    };

    let role = match parent.kind() {
        "attribute" if is_field(parent, "attribute", node) => NameRole::Label,
        "keyword_argument" if is_field(parent, "name", node) => NameRole::Label,
        "function_definition" | "class_definition" if is_field(parent, "name", node) => {
            NameRole::Store
        }
        "parameters" | "lambda_parameters" => NameRole::Store,
        "typed_parameter" => {
            let in_annotation = parent.child_by_field_name("type").is_some_and(|ty| {
                ty.start_byte() <= node.start_byte() && node.end_byte() <= ty.end_byte()
            });
            if in_annotation {
                NameRole::Load
            } else {
                NameRole::Store
            }
        }
        "default_parameter" | "typed_default_parameter" => {
            if is_field(parent, "name", node) {
                NameRole::Store
            } else {
                NameRole::Load
            }
        }
        "list_splat_pattern" | "dictionary_splat_pattern"
            if parent.parent().is_some_and(|gp| {
                matches!(
                    gp.kind(),
                    "parameters" | "lambda_parameters" | "typed_parameter"
                )
            }) =>
        {
            NameRole::Store
        }
        "global_statement" | "nonlocal_statement" | "as_pattern_target" => NameRole::Store,
        "aliased_import" if is_field(parent, "alias", node) => NameRole::Store,
        "named_expression" if is_field(parent, "name", node) => NameRole::Store,
        "dotted_name" => dotted_name_role(parent, node),
        "except_clause"
            if node
                .prev_sibling()
                .is_some_and(|prev| prev.kind() == "as") =>
        {
            NameRole::Store
        }
        _ => target_role(node, parent),
    };
    Some(role)
}

fn dotted_name_role<'a>(dotted: Node<'a>, node: Node<'a>) -> NameRole {
    let Some(owner) = dotted.parent() else {
        return NameRole::Label;
    };
    match owner.kind() {
        // `import a.b` binds `a`.
        "import_statement" if dotted.named_child(0) == Some(node) => NameRole::Store,
        "import_from_statement" if !is_field(owner, "module_name", dotted) => NameRole::Store,
        _ => NameRole::Label,
    }
}

/// Whether the identifier is (part of) the target of an assignment-like
/// statement.
fn target_role<'a>(node: Node<'a>, parent: Node<'a>) -> NameRole {
    let mut child = node;
    let mut cur = parent;
    loop {
        match cur.kind() {
            "pattern_list" | "tuple_pattern" | "list_pattern" | "list_splat_pattern"
            | "tuple" | "list" | "parenthesized_expression" => {
                child = cur;
                match cur.parent() {
                    Some(next) => cur = next,
                    None => return NameRole::Load,
                }
            }
            "augmented_assignment" => {
                return if is_field(cur, "left", child) && child == node {
                    NameRole::Update
                } else {
                    NameRole::Load
                };
            }
            "assignment" | "for_statement" | "for_in_clause" => {
                return if is_field(cur, "left", child) {
                    NameRole::Store
                } else {
                    NameRole::Load
                };
            }
            _ => return NameRole::Load,
        }
    }
}

/// Every identifier below `root`, in source order.
///
/// When `root` is itself a definition, its own name is skipped: it binds in
/// the enclosing scope.
pub fn collect_name_uses(root: Node<'_>, source: &str) -> Vec<NameUse> {
    let mut out = Vec::new();
    if let Some(role) = name_role(root) {
        out.push(NameUse {
            name: node_text(source, root).to_string(),
            range: node_range(root),
            role,
            in_nested_scope: false,
        });
        return out;
    }
    let skip = match root.kind() {
        "function_definition" | "class_definition" => root.child_by_field_name("name"),
        _ => None,
    };
    collect_into(root, source, false, false, skip, &mut out);
    out
}

fn collect_into<'a>(
    node: Node<'a>,
    source: &str,
    nested_inside: bool,
    nested_outside: bool,
    skip: Option<Node<'a>>,
    out: &mut Vec<NameUse>,
) {
    let is_definition = matches!(node.kind(), "function_definition" | "class_definition");
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if Some(child) == skip {
            continue;
        }
        if child.kind() == "identifier" {
            let Some(role) = name_role(child) else {
                continue;
            };
            let in_nested_scope = if is_definition && is_field(node, "name", child) {
                nested_outside
            } else {
                nested_inside
            };
            out.push(NameUse {
                name: node_text(source, child).to_string(),
                range: node_range(child),
                role,
                in_nested_scope,
            });
            continue;
        }
        let child_inside = nested_inside || is_scope(child);
        collect_into(child, source, child_inside, nested_inside, None, out);
    }
}

/// Names bound directly in `scope` (a module, function, class, lambda or
/// comprehension), excluding bindings of nested scopes.
pub fn scope_bindings(scope: Node<'_>, source: &str) -> BTreeSet<String> {
    collect_name_uses(scope, source)
        .into_iter()
        .filter(|name_use| name_use.binds() && !name_use.in_nested_scope)
        .map(|name_use| name_use.name)
        .collect()
}

/// Scopes containing `node`, innermost first. The module is always last.
///
/// A definition's own name and decorators belong to the enclosing scope, so a
/// `function_definition` only counts when `node` is inside its parameters or
/// body.
pub fn enclosing_scopes(node: Node<'_>) -> Vec<Node<'_>> {
    let mut scopes = Vec::new();
    let mut child = node;
    let mut cur = node.parent();
    while let Some(parent) = cur {
        let counts = match parent.kind() {
            "module" => true,
            "function_definition" | "class_definition" => !is_field(parent, "name", child),
            _ => is_scope(parent),
        };
        if counts {
            scopes.push(parent);
        }
        child = parent;
        cur = parent.parent();
    }
    scopes
}

/// The innermost statement containing `node` (or `node` itself).
pub fn enclosing_statement(node: Node<'_>) -> Option<Node<'_>> {
    let mut cur = Some(node);
    while let Some(n) = cur {
        if is_statement(n) {
            return Some(n);
        }
        cur = n.parent();
    }
    None
}

/// The module-level statement containing `node`.
pub fn top_level_statement(node: Node<'_>) -> Option<Node<'_>> {
    let mut cur = Some(node);
    while let Some(n) = cur {
        match n.parent() {
            Some(parent) if parent.kind() == "module" => {
                return (n.kind() != "comment").then_some(n);
            }
            Some(parent) => cur = Some(parent),
            None => return None,
        }
    }
    None
}

/// Leading whitespace of the line containing `offset`.
pub fn line_indent(source: &str, offset: usize) -> &str {
    let offset = offset.min(source.len());
    let line_start = source[..offset]
        .rfind(['\n', '\r'])
        .map(|idx| idx + 1)
        .unwrap_or(0);
    let rest = &source[line_start..];
    let width = rest
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(rest.len());
    &rest[..width]
}

/// The indentation step used by the first indented block in the file.
pub fn detect_indent_unit(root: Node<'_>, source: &str) -> Option<String> {
    let mut unit = None;
    visit_nodes(root, &mut |node| {
        if unit.is_some() || !is_statement_container(node) || node.kind() == "module" {
            return;
        }
        let (Some(first), Some(owner)) = (node.named_child(0), node.parent()) else {
            return;
        };
        if first.start_position().row == owner.start_position().row {
            // `if x: pass` keeps its body on the header line.
            return;
        }
        let inner = line_indent(source, first.start_byte());
        let outer = line_indent(source, owner.start_byte());
        if let Some(step) = inner.strip_prefix(outer) {
            if !step.is_empty() {
                unit = Some(step.to_string());
            }
        }
    });
    unit
}
