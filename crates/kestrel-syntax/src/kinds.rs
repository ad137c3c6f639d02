use tree_sitter::Node;

/// Node kinds that evaluate to a value and can stand on their own as the
/// initializer of an assignment.
const EXPRESSION_KINDS: &[&str] = &[
    "identifier",
    "attribute",
    "subscript",
    "call",
    "binary_operator",
    "unary_operator",
    "not_operator",
    "boolean_operator",
    "comparison_operator",
    "conditional_expression",
    "lambda",
    "named_expression",
    "await",
    "integer",
    "float",
    "string",
    "concatenated_string",
    "true",
    "false",
    "none",
    "ellipsis",
    "list",
    "tuple",
    "set",
    "dictionary",
    "parenthesized_expression",
    "list_comprehension",
    "set_comprehension",
    "dictionary_comprehension",
    "generator_expression",
    "expression_list",
];

const ATOMIC_KINDS: &[&str] = &[
    "identifier",
    "attribute",
    "subscript",
    "call",
    "integer",
    "float",
    "string",
    "true",
    "false",
    "none",
    "ellipsis",
    "list",
    "set",
    "dictionary",
    "parenthesized_expression",
    "list_comprehension",
    "set_comprehension",
    "dictionary_comprehension",
    "generator_expression",
];

pub fn is_expression(node: Node<'_>) -> bool {
    EXPRESSION_KINDS.contains(&node.kind())
}

/// Expressions that never need parentheses when substituted into another
/// expression.
pub fn is_atomic_expression(node: Node<'_>) -> bool {
    match node.kind() {
        // A parenthesized tuple is atomic; `1, 2` is not.
        "tuple" => node.child(0).is_some_and(|open| open.kind() == "("),
        kind => ATOMIC_KINDS.contains(&kind),
    }
}

/// Blocks that hold a statement list.
pub fn is_statement_container(node: Node<'_>) -> bool {
    matches!(node.kind(), "module" | "block")
}

pub fn is_statement(node: Node<'_>) -> bool {
    node.is_named()
        && node.kind() != "comment"
        && node.parent().is_some_and(is_statement_container)
}

/// Nodes that open a new name scope.
pub fn is_scope(node: Node<'_>) -> bool {
    matches!(
        node.kind(),
        "function_definition"
            | "class_definition"
            | "lambda"
            | "list_comprehension"
            | "set_comprehension"
            | "dictionary_comprehension"
            | "generator_expression"
    )
}

pub fn is_loop(node: Node<'_>) -> bool {
    matches!(node.kind(), "for_statement" | "while_statement")
}

/// Constants: evaluating them cannot fail, run user code or observe state.
pub fn is_literal(node: Node<'_>) -> bool {
    let mut cursor = node.walk();
    match node.kind() {
        "integer" | "float" | "true" | "false" | "none" | "ellipsis" => true,
        "string" => node
            .named_children(&mut cursor)
            .all(|child| child.kind() != "interpolation"),
        "concatenated_string" => node.named_children(&mut cursor).all(is_literal),
        "unary_operator" => node.child_by_field_name("argument").is_some_and(is_literal),
        _ => false,
    }
}

/// Whether evaluating `node` may have observable effects beyond producing a
/// value. Any call may run arbitrary code, so calls count.
pub fn has_side_effects(node: Node<'_>) -> bool {
    let mut stack = vec![node];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "call" | "await" | "yield" | "named_expression" | "assignment"
            | "augmented_assignment" => return true,
            // The body of a lambda runs later, if at all.
            "lambda" => continue,
            _ => {}
        }
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            stack.push(child);
        }
    }
    false
}
