//! Extract variable and extract function.
//!
//! Both refactorings start from a selection: an empty selection picks the
//! smallest expression around the cursor, a non-empty one must cover an
//! expression (or, for extract function, whole statements of one block)
//! exactly, ignoring surrounding whitespace.

use std::collections::{BTreeSet, HashSet};

use kestrel_core::{DocumentId, OffsetEdit, Range, TextRange, TextSize};
use kestrel_syntax::{
    collect_name_uses, detect_indent_unit, enclosing_scopes, enclosing_statement, is_expression,
    is_literal, is_loop, is_statement, is_statement_container, line_indent,
    name_role, named_children, node_text, parse_python, scope_bindings, token_at,
    top_level_statement, NameRole, NameUse, Node,
};
use tracing::instrument;

use crate::assemble::single_file_plan;
use crate::context::RefactorContext;
use crate::error::{finish, Halt, RefactorError, UnavailableReason};
use crate::naming::taken_names;
use crate::plan::{CodeActionPlan, Outcome, RefactorKind};

const DEFAULT_INDENT: &str = "    ";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractParams {
    pub document: DocumentId,
    pub selection: Range,
}

enum Selection<'a> {
    Expression(Node<'a>),
    Statements(Vec<Node<'a>>),
}

/// Bind the selected expression to a fresh variable just before the
/// statement that contains it.
#[instrument(level = "debug", skip_all, fields(file = %params.document.file))]
pub fn extract_variable(
    ctx: &RefactorContext,
    params: ExtractParams,
) -> Result<Outcome<CodeActionPlan>, RefactorError> {
    finish("extract_variable", plan_extract_variable(ctx, &params))
}

/// Move the selected expression or statements into a new module-level
/// function and call it in their place.
#[instrument(level = "debug", skip_all, fields(file = %params.document.file))]
pub fn extract_function(
    ctx: &RefactorContext,
    params: ExtractParams,
) -> Result<Outcome<CodeActionPlan>, RefactorError> {
    finish("extract_function", plan_extract_function(ctx, &params))
}

fn plan_extract_variable(
    ctx: &RefactorContext,
    params: &ExtractParams,
) -> Result<CodeActionPlan, Halt> {
    ctx.check_cancelled()?;
    let source = ctx.snapshot.checked(&params.document)?;
    let text = source.text();
    let selection = source
        .line_index()
        .text_range(text, params.selection)
        .ok_or(UnavailableReason::InvalidSelection)?;

    let tree = parse_python(text)?;
    let root = tree.root_node();
    let expr = match resolve_selection(root, text, selection, false)? {
        Selection::Expression(expr) => expr,
        Selection::Statements(_) => return Err(UnavailableReason::InvalidSelection.into()),
    };
    check_hoistable(expr, text)?;
    let statement = enclosing_statement(expr).ok_or(UnavailableReason::InvalidSelection)?;
    check_no_syntax_errors(&[statement])?;

    let name = fresh_name(ctx, root, text, &ctx.config.extract_variable_name)?;
    let eol = line_ending(text);

    let value = node_text(text, expr);
    let value = if value.contains('\n') && !is_bracketed(expr) {
        format!("({value})")
    } else {
        value.to_string()
    };

    let statement_start = statement.start_byte();
    let binding = if starts_line(text, statement_start) {
        let indent = line_indent(text, statement_start);
        format!("{name} = {value}{eol}{indent}")
    } else {
        // `if x: return a + b` keeps everything on one line.
        format!("{name} = {value}; ")
    };
    let reference = if is_bare_generator_argument(expr) {
        format!("({name})")
    } else {
        name.clone()
    };

    let edits = vec![
        OffsetEdit::insert(offset(statement_start), binding),
        OffsetEdit::new(byte_range(expr), reference),
    ];
    ctx.check_cancelled()?;
    let plan = single_file_plan(&params.document.file, source, edits)?;

    tracing::debug!(target: "kestrel.refactor", name = %name, "extract variable planned");
    Ok(CodeActionPlan {
        title: format!("Extract expression into variable '{name}'"),
        kind: RefactorKind::ExtractVariable,
        plan,
    })
}

fn plan_extract_function(
    ctx: &RefactorContext,
    params: &ExtractParams,
) -> Result<CodeActionPlan, Halt> {
    ctx.check_cancelled()?;
    let source = ctx.snapshot.checked(&params.document)?;
    let text = source.text();
    let selection = source
        .line_index()
        .text_range(text, params.selection)
        .ok_or(UnavailableReason::InvalidSelection)?;

    let tree = parse_python(text)?;
    let root = tree.root_node();
    let selected = resolve_selection(root, text, selection, true)?;

    let unit = ctx
        .config
        .indent_unit
        .clone()
        .or_else(|| detect_indent_unit(root, text))
        .unwrap_or_else(|| DEFAULT_INDENT.to_string());
    let eol = line_ending(text);

    let (title, anchor, function, replaced, call) = match selected {
        Selection::Expression(expr) => {
            check_hoistable(expr, text)?;
            let statement = enclosing_statement(expr).ok_or(UnavailableReason::InvalidSelection)?;
            check_no_syntax_errors(&[statement])?;
            check_function_expression(expr)?;

            let name = fresh_name(ctx, root, text, &ctx.config.extract_function_name)?;
            let locals = visible_locals(expr, text);
            let params = first_reads(collect_name_uses(expr, text).iter(), &locals);

            let value = node_text(text, expr);
            let value = if value.contains('\n') && !is_bracketed(expr) {
                format!("({value})")
            } else {
                value.to_string()
            };
            let args = params.join(", ");
            let function =
                format!("def {name}({args}):{eol}{unit}return {value}{eol}{eol}{eol}");
            (
                format!("Extract expression into function '{name}'"),
                top_level_statement(expr).ok_or(UnavailableReason::InvalidSelection)?,
                function,
                byte_range(expr),
                format!("{name}({args})"),
            )
        }
        Selection::Statements(statements) => {
            let (first, last) = match (statements.first(), statements.last()) {
                (Some(first), Some(last)) => (*first, *last),
                _ => return Err(UnavailableReason::InvalidSelection.into()),
            };
            check_no_syntax_errors(&statements)?;
            check_control_flow(&statements)?;

            let name = fresh_name(ctx, root, text, &ctx.config.extract_function_name)?;
            let start = first.start_byte();
            let end = last.end_byte();
            let scope = enclosing_scopes(first).first().copied().unwrap_or(root);
            let uses = collect_name_uses(scope, text);
            let mut locals = visible_locals(first, text);
            // Module names the statements rebind become locals of the new
            // function, so their incoming values must be passed in.
            let module_names = scope_bindings(root, text);
            locals.extend(
                uses_within(&uses, start, end)
                    .filter(|name_use| {
                        !name_use.in_nested_scope
                            && name_use.binds()
                            && module_names.contains(&name_use.name)
                    })
                    .map(|name_use| name_use.name.clone()),
            );
            let params = first_reads(uses_within(&uses, start, end), &locals);
            let returns = live_bindings(uses_within(&uses, start, end), &uses, end);

            let args = params.join(", ");
            let base_indent = line_indent(text, start);
            let body = Body {
                text,
                start,
                end,
                literals: multiline_strings(&statements),
            };
            let mut function = format!(
                "def {name}({args}):{eol}{}{eol}",
                body.reindent(base_indent, &unit, eol)
            );
            if !returns.is_empty() {
                function.push_str(&format!("{unit}return {}{eol}", returns.join(", ")));
            }
            function.push_str(eol);
            function.push_str(eol);

            let call = if returns.is_empty() {
                format!("{name}({args})")
            } else {
                format!("{} = {name}({args})", returns.join(", "))
            };
            (
                format!("Extract statements into function '{name}'"),
                top_level_statement(first).ok_or(UnavailableReason::InvalidSelection)?,
                function,
                TextRange::new(offset(start), offset(end)),
                call,
            )
        }
    };

    let edits = vec![
        OffsetEdit::insert(offset(anchor.start_byte()), function),
        OffsetEdit::new(replaced, call),
    ];
    ctx.check_cancelled()?;
    let plan = single_file_plan(&params.document.file, source, edits)?;

    tracing::debug!(target: "kestrel.refactor", title = %title, "extract function planned");
    Ok(CodeActionPlan {
        title,
        kind: RefactorKind::ExtractFunction,
        plan,
    })
}

fn resolve_selection<'a>(
    root: Node<'a>,
    text: &str,
    range: TextRange,
    allow_statements: bool,
) -> Result<Selection<'a>, UnavailableReason> {
    let start = usize::from(range.start());
    let end = usize::from(range.end());
    if start == end {
        return expression_at(root, start).map(Selection::Expression);
    }

    let selected = &text[start..end];
    let start = start + (selected.len() - selected.trim_start().len());
    let end = end - (selected.len() - selected.trim_end().len());
    if start >= end {
        return Err(UnavailableReason::InvalidSelection);
    }

    let node = root
        .descendant_for_byte_range(start, end)
        .ok_or(UnavailableReason::InvalidSelection)?;
    let mut exact = Vec::new();
    let mut cur = Some(node);
    while let Some(n) = cur {
        if n.start_byte() != start || n.end_byte() != end {
            break;
        }
        exact.push(n);
        cur = n.parent();
    }

    if allow_statements {
        let container = exact
            .iter()
            .copied()
            .find(|n| is_statement_container(*n))
            .or_else(|| (exact.is_empty() && is_statement_container(node)).then_some(node));
        if let Some(container) = container {
            return statements_in(container, start, end)
                .map(Selection::Statements)
                .ok_or(UnavailableReason::InvalidSelection);
        }
        if let Some(statement) = exact.iter().copied().find(|n| is_statement(*n)) {
            return Ok(Selection::Statements(vec![statement]));
        }
    }

    let expr = exact
        .iter()
        .rev()
        .copied()
        .find(|n| is_expression(*n))
        .ok_or(UnavailableReason::InvalidSelection)?;
    check_extractable(expr)?;
    Ok(Selection::Expression(expr))
}

/// The smallest extractable expression around a cursor.
fn expression_at(root: Node<'_>, offset: usize) -> Result<Node<'_>, UnavailableReason> {
    let mut node = token_at(root, offset).ok_or(UnavailableReason::InvalidSelection)?;
    if node.kind() == "identifier" {
        match name_role(node) {
            Some(NameRole::Load) => {}
            // The attribute name in `obj.name` stands for the whole access.
            Some(NameRole::Label) if node.parent().is_some_and(|p| p.kind() == "attribute") => {
                node = node.parent().ok_or(UnavailableReason::InvalidSelection)?;
            }
            _ => return Err(UnavailableReason::InvalidSelection),
        }
    }

    while !is_expression(node) {
        if is_statement(node)
            || matches!(
                node.kind(),
                "module" | "block" | "comment" | "decorator" | "parameters"
            )
        {
            return Err(UnavailableReason::InvalidSelection);
        }
        node = node.parent().ok_or(UnavailableReason::InvalidSelection)?;
    }

    if let Some(parent) = node.parent() {
        if parent.kind() == "call" && is_field(parent, "function", node) {
            node = parent;
        }
    }
    check_extractable(node)?;
    Ok(node)
}

fn statements_in<'a>(container: Node<'a>, start: usize, end: usize) -> Option<Vec<Node<'a>>> {
    let children = named_children(container);
    let first = children.iter().position(|c| c.start_byte() == start)?;
    let last = children.iter().position(|c| c.end_byte() == end)?;
    (first <= last).then(|| children[first..=last].to_vec())
}

fn check_extractable(expr: Node<'_>) -> Result<(), UnavailableReason> {
    if expr.kind() == "identifier" && name_role(expr) != Some(NameRole::Load) {
        return Err(UnavailableReason::InvalidSelection);
    }
    let parent = expr.parent().ok_or(UnavailableReason::InvalidSelection)?;
    // `"a" "b"`: the parts of an implicit concatenation are not expressions.
    if parent.kind() == "concatenated_string" || is_binding_target(expr) {
        return Err(UnavailableReason::InvalidSelection);
    }
    Ok(())
}

/// Assignment, loop and `del` targets, including elements of unpacking
/// targets.
fn is_binding_target(node: Node<'_>) -> bool {
    let mut child = node;
    while let Some(parent) = child.parent() {
        match parent.kind() {
            "pattern_list" | "tuple_pattern" | "list_pattern" | "list_splat_pattern" | "tuple"
            | "list" | "parenthesized_expression" | "expression_list" => child = parent,
            "assignment" | "augmented_assignment" | "for_statement" | "for_in_clause" => {
                return is_field(parent, "left", child);
            }
            "delete_statement" => return true,
            _ => return false,
        }
    }
    false
}

/// Whether evaluating `expr` ahead of its statement preserves behavior.
fn check_hoistable(expr: Node<'_>, text: &str) -> Result<(), UnavailableReason> {
    // Only constants and plain names may move out of a branch that might not
    // run: attribute access, subscripts and operators can raise or call.
    let plain = is_literal(expr) || expr.kind() == "identifier";
    let mut child = expr;
    while let Some(parent) = child.parent() {
        if is_statement_container(parent) {
            break;
        }
        let unsafe_context = match parent.kind() {
            "lambda" => Some("a lambda body"),
            "list_comprehension"
            | "set_comprehension"
            | "dictionary_comprehension"
            | "generator_expression" => Some("a comprehension"),
            "decorator" => Some("a decorator"),
            "while_statement" if is_field(parent, "condition", child) => Some("a while condition"),
            "elif_clause" if is_field(parent, "condition", child) => Some("an elif condition"),
            "except_clause" => Some("an except clause"),
            "boolean_operator" if !plain && is_field(parent, "right", child) => {
                Some("a conditionally evaluated operand")
            }
            "conditional_expression"
                if !plain
                    && (parent.named_child(0) == Some(child)
                        || parent.named_child(2) == Some(child)) =>
            {
                Some("a conditionally evaluated operand")
            }
            _ => None,
        };
        if let Some(context) = unsafe_context {
            return Err(UnavailableReason::UnsafeContext(context));
        }
        child = parent;
    }
    check_walrus_reads(expr, text)
}

/// `expr` must not read a name that an assignment expression elsewhere in
/// its statement binds.
fn check_walrus_reads(expr: Node<'_>, text: &str) -> Result<(), UnavailableReason> {
    let Some(statement) = enclosing_statement(expr) else {
        return Ok(());
    };
    let mut bound = HashSet::new();
    let mut stack = vec![statement];
    while let Some(node) = stack.pop() {
        if node == expr {
            continue;
        }
        if node.kind() == "named_expression" {
            if let Some(name) = node.child_by_field_name("name") {
                bound.insert(node_text(text, name));
            }
        }
        stack.extend(named_children(node));
    }

    let reads_bound = collect_name_uses(expr, text)
        .iter()
        .any(|name_use| name_use.reads() && bound.contains(name_use.name.as_str()));
    if reads_bound {
        return Err(UnavailableReason::UnsafeContext(
            "a name bound by an assignment expression",
        ));
    }
    Ok(())
}

fn check_no_syntax_errors(statements: &[Node<'_>]) -> Result<(), UnavailableReason> {
    if statements.iter().any(|statement| statement.has_error()) {
        return Err(UnavailableReason::UnsafeContext("code with syntax errors"));
    }
    Ok(())
}

/// An expression moved into its own function must not suspend or bind in the
/// caller.
fn check_function_expression(expr: Node<'_>) -> Result<(), UnavailableReason> {
    let mut stack = vec![expr];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "yield" | "await" => {
                return Err(UnavailableReason::UnsafeContext("a generator or coroutine"))
            }
            "named_expression" => {
                return Err(UnavailableReason::UnsafeContext("an assignment expression"))
            }
            "lambda" => continue,
            _ => {}
        }
        stack.extend(named_children(node));
    }
    Ok(())
}

/// Statements moved into a function must not transfer control out of it.
fn check_control_flow(statements: &[Node<'_>]) -> Result<(), UnavailableReason> {
    fn walk(node: Node<'_>, in_loop: bool) -> Result<(), UnavailableReason> {
        let context = match node.kind() {
            "function_definition" | "class_definition" | "lambda" => return Ok(()),
            "return_statement" => Some("a return statement"),
            "yield" | "await" => Some("a generator or coroutine"),
            "global_statement" | "nonlocal_statement" => Some("a global or nonlocal declaration"),
            "break_statement" | "continue_statement" if !in_loop => {
                Some("a loop jump outside the selection")
            }
            _ => None,
        };
        if let Some(context) = context {
            return Err(UnavailableReason::UnsafeContext(context));
        }
        let in_loop = in_loop || is_loop(node);
        for child in named_children(node) {
            walk(child, in_loop)?;
        }
        Ok(())
    }

    for statement in statements {
        walk(*statement, false)?;
    }
    Ok(())
}

fn uses_within(uses: &[NameUse], start: usize, end: usize) -> impl Iterator<Item = &NameUse> {
    uses.iter().filter(move |name_use| {
        usize::from(name_use.range.start()) >= start && usize::from(name_use.range.end()) <= end
    })
}

/// Names bound in the function or class scopes the new function cannot see.
fn visible_locals(node: Node<'_>, text: &str) -> BTreeSet<String> {
    let mut locals = BTreeSet::new();
    for (depth, scope) in enclosing_scopes(node).into_iter().enumerate() {
        let visible = match scope.kind() {
            "function_definition" => true,
            // Class bodies are only visible to code directly inside them.
            "class_definition" => depth == 0,
            _ => false,
        };
        if visible {
            locals.extend(scope_bindings(scope, text));
        }
    }
    locals
}

/// Parameters of the new function: local names whose first use in the
/// extracted code reads them, in order of that first use.
fn first_reads<'u>(
    uses: impl Iterator<Item = &'u NameUse>,
    locals: &BTreeSet<String>,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut params = Vec::new();
    for name_use in uses {
        // Bindings inside nested scopes are local to those scopes.
        if name_use.in_nested_scope && name_use.binds() {
            continue;
        }
        if name_use.role == NameRole::Label || !seen.insert(name_use.name.as_str()) {
            continue;
        }
        if name_use.reads() && locals.contains(&name_use.name) {
            params.push(name_use.name.clone());
        }
    }
    params
}

/// Names bound by the extracted statements that are still used after them.
fn live_bindings<'u>(
    inside: impl Iterator<Item = &'u NameUse>,
    scope_uses: &[NameUse],
    end: usize,
) -> Vec<String> {
    let used_after: HashSet<&str> = scope_uses
        .iter()
        .filter(|name_use| {
            usize::from(name_use.range.start()) >= end && name_use.role != NameRole::Label
        })
        .map(|name_use| name_use.name.as_str())
        .collect();

    let mut returns: Vec<String> = Vec::new();
    for name_use in inside {
        if name_use.in_nested_scope || !name_use.binds() {
            continue;
        }
        if used_after.contains(name_use.name.as_str()) && !returns.contains(&name_use.name) {
            returns.push(name_use.name.clone());
        }
    }
    returns
}

fn fresh_name(
    ctx: &RefactorContext,
    root: Node<'_>,
    text: &str,
    base: &str,
) -> Result<String, UnavailableReason> {
    let taken = taken_names(root, text);
    ctx.naming
        .fresh_name(base, &taken)
        .ok_or(UnavailableReason::CollisionUnresolvable)
}

/// A run of statements being moved into a function body.
struct Body<'t> {
    text: &'t str,
    start: usize,
    end: usize,
    /// Spans of string literals that cross a line break.
    literals: Vec<std::ops::Range<usize>>,
}

impl Body<'_> {
    /// Re-indent the statements as a function body. The first line starts at
    /// the first statement, so it carries no indentation of its own. Lines
    /// that begin inside a string literal are part of its value and stay as
    /// they are.
    fn reindent(&self, base_indent: &str, unit: &str, eol: &str) -> String {
        let mut lines = Vec::new();
        let mut line_start = self.start;
        for (idx, line) in self.text[self.start..self.end].split('\n').enumerate() {
            let offset = line_start;
            line_start += line.len() + 1;
            let line = line.strip_suffix('\r').unwrap_or(line);

            let in_literal = self
                .literals
                .iter()
                .any(|literal| literal.start < offset && offset < literal.end);
            let reindented = if in_literal {
                line.to_string()
            } else if line.trim().is_empty() {
                String::new()
            } else if idx == 0 {
                format!("{unit}{line}")
            } else {
                let line = line
                    .strip_prefix(base_indent)
                    .unwrap_or_else(|| line.trim_start());
                format!("{unit}{line}")
            };
            lines.push(reindented);
        }
        lines.join(eol)
    }
}

fn multiline_strings(statements: &[Node<'_>]) -> Vec<std::ops::Range<usize>> {
    let mut literals = Vec::new();
    let mut stack = statements.to_vec();
    while let Some(node) = stack.pop() {
        if node.kind() == "string" {
            if node.start_position().row != node.end_position().row {
                literals.push(node.start_byte()..node.end_byte());
            }
            continue;
        }
        stack.extend(named_children(node));
    }
    literals
}

/// Expressions whose line breaks are already inside their own brackets.
fn is_bracketed(expr: Node<'_>) -> bool {
    match expr.kind() {
        "parenthesized_expression"
        | "generator_expression"
        | "list"
        | "set"
        | "dictionary"
        | "list_comprehension"
        | "set_comprehension"
        | "dictionary_comprehension" => true,
        "tuple" => expr.child(0).is_some_and(|open| open.kind() == "("),
        _ => false,
    }
}

/// `sum(x for x in xs)`: the generator's parentheses double as the call's.
fn is_bare_generator_argument(expr: Node<'_>) -> bool {
    expr.kind() == "generator_expression"
        && expr
            .parent()
            .is_some_and(|parent| parent.kind() == "call" && is_field(parent, "arguments", expr))
}

fn is_field<'a>(parent: Node<'a>, field: &str, node: Node<'a>) -> bool {
    parent.child_by_field_name(field) == Some(node)
}

fn starts_line(text: &str, offset: usize) -> bool {
    text[..offset]
        .chars()
        .rev()
        .take_while(|c| *c != '\n' && *c != '\r')
        .all(|c| c == ' ' || c == '\t')
}

fn line_ending(text: &str) -> &'static str {
    if text.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

fn offset(byte: usize) -> TextSize {
    TextSize::from(byte as u32)
}

fn byte_range(node: Node<'_>) -> TextRange {
    TextRange::new(offset(node.start_byte()), offset(node.end_byte()))
}
