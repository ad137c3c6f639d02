use std::collections::BTreeSet;

use kestrel_core::{DocumentId, OffsetEdit, Position, TextRange, TextSize};
use kestrel_syntax::{
    collect_name_uses, has_side_effects, is_atomic_expression, is_literal, is_scope,
    is_statement, name_role, named_children, node_text, parse_python, NameRole, Node,
};
use tracing::instrument;

use crate::assemble::single_file_plan;
use crate::context::RefactorContext;
use crate::error::{finish, Halt, InvariantViolation, RefactorError, UnavailableReason};
use crate::occurrence::{collect, Collected};
use crate::plan::{CodeActionPlan, Outcome, RefactorKind};
use crate::semantic::{OccurrenceRole, SymbolKind};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineParams {
    pub document: DocumentId,
    pub position: Position,
}

/// Replace every use of a single-assignment variable with its value and drop
/// the assignment.
#[instrument(level = "debug", skip_all, fields(file = %params.document.file))]
pub fn inline_variable(
    ctx: &RefactorContext,
    params: InlineParams,
) -> Result<Outcome<CodeActionPlan>, RefactorError> {
    finish("inline_variable", plan_inline(ctx, &params))
}

fn not_inlinable(reason: &'static str) -> Halt {
    Halt::Unavailable(UnavailableReason::NotInlinable(reason))
}

fn plan_inline(ctx: &RefactorContext, params: &InlineParams) -> Result<CodeActionPlan, Halt> {
    let collected = match collect(ctx, &params.document, params.position)? {
        Collected::Resolved(collected) => collected,
        Collected::Unresolved(_) => return Err(UnavailableReason::UnresolvedSymbol.into()),
    };
    if collected.symbol.kind != SymbolKind::Variable {
        return Err(not_inlinable("not a variable"));
    }
    let [group] = collected.documents.as_slice() else {
        return Err(not_inlinable("it is used in more than one file"));
    };

    let mut definitions = group
        .occurrences
        .iter()
        .filter(|occurrence| occurrence.role == OccurrenceRole::Definition);
    let (Some(definition), None) = (definitions.next(), definitions.next()) else {
        return Err(not_inlinable("it is not assigned exactly once"));
    };
    let references: Vec<_> = group
        .occurrences
        .iter()
        .filter(|occurrence| occurrence.role == OccurrenceRole::Reference)
        .collect();
    if references.is_empty() {
        return Err(not_inlinable("it is never used"));
    }

    let file = &group.document.file;
    let source = ctx.snapshot.source(file)?;
    let text = source.text();
    let line_index = source.line_index();
    let tree = parse_python(text)?;
    let root = tree.root_node();

    let to_bytes = |range| {
        line_index
            .text_range(text, range)
            .ok_or_else(|| InvariantViolation::OccurrenceOutOfBounds {
                file: file.clone(),
                range,
            })
    };

    let target = identifier_at(root, to_bytes(definition.range)?)
        .ok_or_else(|| not_inlinable("its definition is not a simple assignment"))?;
    let (statement, value) = simple_assignment(target, text)
        .ok_or_else(|| not_inlinable("its definition is not a simple assignment"))?;
    if statement
        .parent()
        .is_some_and(|block| block.kind() == "block" && named_children(block).len() == 1)
    {
        return Err(not_inlinable("it is the only statement in its block"));
    }

    let mut uses = Vec::with_capacity(references.len());
    for reference in &references {
        let node = identifier_at(root, to_bytes(reference.range)?)
            .ok_or_else(|| not_inlinable("a use is not a plain name"))?;
        if name_role(node) != Some(NameRole::Load) {
            return Err(not_inlinable("it is reassigned or used as a target"));
        }
        if node.start_byte() < statement.end_byte() {
            return Err(not_inlinable("it is used before or inside its definition"));
        }
        uses.push(node);
    }

    if uses.len() > 1 && has_side_effects(value) {
        return Err(not_inlinable("its value has side effects"));
    }
    let last_use = uses.iter().map(|node| node.start_byte()).max().unwrap_or(0);
    let reads: BTreeSet<String> = collect_name_uses(value, text)
        .into_iter()
        .filter(|name_use| name_use.reads())
        .map(|name_use| name_use.name)
        .collect();
    let rebound = collect_name_uses(root, text).into_iter().any(|name_use| {
        let at = usize::from(name_use.range.start());
        name_use.binds()
            && at >= statement.end_byte()
            && at < last_use
            && reads.contains(&name_use.name)
    });
    if rebound {
        return Err(not_inlinable("a name its value reads is rebound before a use"));
    }

    // Anything but a constant can observe state, so it is only moved into
    // the very next statement, to a spot that runs exactly once.
    if !is_literal(value) {
        let [node] = uses.as_slice() else {
            return Err(not_inlinable("its value may change between uses"));
        };
        let next = next_statement(statement)
            .filter(|next| {
                next.start_byte() <= node.start_byte() && node.end_byte() <= next.end_byte()
            })
            .ok_or_else(|| not_inlinable("its value may change before a use"))?;
        if !runs_once_within(*node, next, has_side_effects(value)) {
            return Err(not_inlinable("a use is not evaluated exactly once"));
        }
    }

    let value_text = node_text(text, value);
    let mut edits = vec![OffsetEdit::delete(statement_lines(text, statement))];
    for node in uses {
        let needs_parens = !is_atomic_expression(value)
            || (matches!(value.kind(), "integer" | "float")
                && node.parent().is_some_and(|parent| {
                    parent.kind() == "attribute"
                        && parent.child_by_field_name("object") == Some(node)
                }));
        let replacement = if needs_parens {
            format!("({value_text})")
        } else {
            value_text.to_string()
        };
        edits.push(OffsetEdit::new(byte_range(node), replacement));
    }

    ctx.check_cancelled()?;
    let plan = single_file_plan(file, source, edits)?;
    tracing::debug!(
        target: "kestrel.refactor",
        symbol = %collected.symbol.name,
        references = references.len(),
        "inline variable planned"
    );
    Ok(CodeActionPlan {
        title: format!("Inline variable '{}'", collected.symbol.name),
        kind: RefactorKind::InlineVariable,
        plan,
    })
}

fn next_statement(statement: Node<'_>) -> Option<Node<'_>> {
    let mut next = statement.next_named_sibling();
    while let Some(node) = next {
        if node.kind() != "comment" {
            return Some(node);
        }
        next = node.next_named_sibling();
    }
    None
}

/// Whether `node` is evaluated once whenever `statement` runs, and before any
/// statement nested in it. Values with side effects must also not move into a
/// branch that might be skipped.
fn runs_once_within(node: Node<'_>, statement: Node<'_>, side_effects: bool) -> bool {
    let mut child = node;
    while child != statement {
        let Some(parent) = child.parent() else {
            return false;
        };
        let deferred = match parent.kind() {
            "block" | "while_statement" | "elif_clause" | "except_clause" => true,
            "boolean_operator" => side_effects && is_field(parent, "right", child),
            "conditional_expression" => side_effects && parent.named_child(1) != Some(child),
            _ => is_scope(parent),
        };
        if deferred {
            return false;
        }
        child = parent;
    }
    true
}

fn is_field<'a>(parent: Node<'a>, field: &str, node: Node<'a>) -> bool {
    parent.child_by_field_name(field) == Some(node)
}

fn identifier_at(root: Node<'_>, range: TextRange) -> Option<Node<'_>> {
    let start = usize::from(range.start());
    let end = usize::from(range.end());
    root.descendant_for_byte_range(start, end)
        .filter(|node| {
            node.kind() == "identifier" && node.start_byte() == start && node.end_byte() == end
        })
}

/// For `name = value` alone on its own lines, the statement and the value.
fn simple_assignment<'a>(target: Node<'a>, text: &str) -> Option<(Node<'a>, Node<'a>)> {
    let assignment = target.parent()?;
    if assignment.kind() != "assignment"
        || assignment.child_by_field_name("left") != Some(target)
    {
        return None;
    }
    let value = assignment.child_by_field_name("right")?;
    // `a = b = 1` and `a = yield x` have no single value expression.
    if matches!(value.kind(), "assignment" | "augmented_assignment" | "yield") {
        return None;
    }

    let statement = assignment.parent()?;
    if statement.kind() != "expression_statement"
        || !is_statement(statement)
        || named_children(statement).len() != 1
    {
        return None;
    }
    let start = statement.start_byte();
    let before_ok = text[line_start(text, start)..start]
        .chars()
        .all(|c| c == ' ' || c == '\t');
    let rest = &text[statement.end_byte()..];
    let rest_of_line = rest.split(['\n', '\r']).next().unwrap_or("");
    let after_ok = rest_of_line.trim().is_empty() || rest_of_line.trim_start().starts_with('#');
    (before_ok && after_ok).then_some((statement, value))
}

/// The statement's lines, from the start of its first line through its line
/// break.
fn statement_lines(text: &str, statement: Node<'_>) -> TextRange {
    let start = line_start(text, statement.start_byte());
    let end = statement.end_byte();
    let line_end = match text[end..].find('\n') {
        Some(idx) => end + idx + 1,
        None => text.len(),
    };
    TextRange::new(offset(start), offset(line_end))
}

fn line_start(text: &str, offset: usize) -> usize {
    text[..offset].rfind(['\n', '\r']).map_or(0, |idx| idx + 1)
}

fn offset(byte: usize) -> TextSize {
    TextSize::from(byte as u32)
}

fn byte_range(node: Node<'_>) -> TextRange {
    TextRange::new(offset(node.start_byte()), offset(node.end_byte()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use kestrel_core::FileId;
    use kestrel_test_utils::{extract_cursor, position_at};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::assemble::apply_plan;
    use crate::semantic::StaticAnalysis;
    use crate::snapshot::Snapshot;

    fn check(fixture: &str, name: &str, kind: SymbolKind) -> Outcome<(String, String)> {
        let (text, cursor) = extract_cursor(fixture);
        let file = FileId::new("file:///test.py");
        let snapshot = Snapshot::new([(file.clone(), text.clone())]);
        let mut analysis = StaticAnalysis::new();
        analysis.add_named_symbol(&snapshot, name, kind);
        let ctx = RefactorContext::new(snapshot.clone(), Arc::new(analysis));

        let params = InlineParams {
            document: DocumentId::unversioned(file.clone()),
            position: position_at(&text, cursor),
        };
        inline_variable(&ctx, params).unwrap().map(|action| {
            assert_eq!(action.kind, RefactorKind::InlineVariable);
            let applied = apply_plan(&snapshot.texts(), &action.plan).unwrap();
            (action.title, applied[&file].clone())
        })
    }

    fn planned(name: &str, text: &str) -> Outcome<(String, String)> {
        Outcome::Planned((format!("Inline variable '{name}'"), text.to_string()))
    }

    fn refused(reason: &'static str) -> Outcome<(String, String)> {
        Outcome::Unavailable(UnavailableReason::NotInlinable(reason))
    }

    #[test]
    fn inlines_a_compound_value_with_parentheses() {
        let fixture = r#"def f(a, b):
    /*caret*/total = a + b
    return total * 2
"#;
        assert_eq!(
            check(fixture, "total", SymbolKind::Variable),
            planned(
                "total",
                r#"def f(a, b):
    return (a + b) * 2
"#
            )
        );
    }

    #[test]
    fn inlines_every_use_from_a_reference() {
        let fixture = "limit = 10\nprint(limit)\nlog(/*caret*/limit)\n";
        assert_eq!(
            check(fixture, "limit", SymbolKind::Variable),
            planned("limit", "print(10)\nlog(10)\n")
        );
    }

    #[test]
    fn iterables_are_evaluated_once() {
        let fixture = "/*caret*/items = load()\nfor item in items:\n    print(item)\n";
        assert_eq!(
            check(fixture, "items", SymbolKind::Variable),
            planned("items", "for item in load():\n    print(item)\n")
        );
    }

    #[test]
    fn values_that_observe_state_stay_in_order() {
        let cases = [
            (
                "name = user.name\nprint(name)\nlog(/*caret*/name)\n",
                "name",
                "its value may change between uses",
            ),
            (
                "/*caret*/x = input()\ny = input()\nprint(y, x)\n",
                "x",
                "its value may change before a use",
            ),
            (
                "/*caret*/x = a[0]\na[0] = 5\nprint(x)\n",
                "x",
                "its value may change before a use",
            ),
            (
                "/*caret*/x = compute()\nfor i in range(3):\n    print(x)\n",
                "x",
                "a use is not evaluated exactly once",
            ),
            (
                "/*caret*/x = a.b\nf = lambda: x\n",
                "x",
                "a use is not evaluated exactly once",
            ),
            (
                "/*caret*/x = compute()\nok = ready and x\n",
                "x",
                "a use is not evaluated exactly once",
            ),
        ];
        for (fixture, name, reason) in cases {
            assert_eq!(
                check(fixture, name, SymbolKind::Variable),
                refused(reason),
                "{fixture}"
            );
        }
    }

    #[test]
    fn numbers_used_as_objects_are_parenthesized() {
        let fixture = "/*caret*/n = 1\nprint(n.real)\n";
        assert_eq!(
            check(fixture, "n", SymbolKind::Variable),
            planned("n", "print((1).real)\n")
        );
    }

    #[test]
    fn side_effects_are_only_inlined_once() {
        assert_eq!(
            check("/*caret*/value = compute()\nuse(value)\n", "value", SymbolKind::Variable),
            planned("value", "use(compute())\n")
        );
        assert_eq!(
            check(
                "/*caret*/value = compute()\nuse(value)\nuse(value)\n",
                "value",
                SymbolKind::Variable
            ),
            refused("its value has side effects")
        );
    }

    #[test]
    fn refuses_unsafe_or_unsupported_variables() {
        let cases = [
            ("/*caret*/x = 1\nx = 2\nprint(x)\n", "x", "it is not assigned exactly once"),
            ("/*caret*/x = 1\nx += 2\n", "x", "it is reassigned or used as a target"),
            ("/*caret*/x = 1\n", "x", "it is never used"),
            (
                "/*caret*/y = a\na = 2\nprint(y)\n",
                "y",
                "a name its value reads is rebound before a use",
            ),
            (
                "if c:\n    /*caret*/x = 1\nprint(x)\n",
                "x",
                "it is the only statement in its block",
            ),
            (
                "/*caret*/x = y = 1\nprint(x)\n",
                "x",
                "its definition is not a simple assignment",
            ),
            (
                "print(1); /*caret*/x = 1\nprint(x)\n",
                "x",
                "its definition is not a simple assignment",
            ),
        ];
        for (fixture, name, reason) in cases {
            assert_eq!(
                check(fixture, name, SymbolKind::Variable),
                refused(reason),
                "{fixture}"
            );
        }
    }

    #[test]
    fn only_variables_are_inlined() {
        assert_eq!(
            check("def /*caret*/f():\n    pass\nf()\n", "f", SymbolKind::Function),
            refused("not a variable")
        );
        assert_eq!(
            check("/*caret*/x = 1\nprint(x)\n", "nothing", SymbolKind::Variable),
            Outcome::Unavailable(UnavailableReason::UnresolvedSymbol)
        );
    }
}
