use std::collections::HashSet;

use kestrel_syntax::{visit_nodes, Node, BUILTINS, KEYWORDS};

/// Chooses names for synthesized bindings.
///
/// Implementations must be pure: the same `base` and `taken` always give the
/// same answer.
pub trait NamingPolicy: Send + Sync {
    /// A name derived from `base` that is not in `taken`, or `None` when the
    /// policy gives up.
    fn fresh_name(&self, base: &str, taken: &HashSet<String>) -> Option<String>;
}

/// `base`, then `base1`, `base2`, … up to `max_attempts` suffixes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SuffixNaming {
    pub max_attempts: u32,
}

impl Default for SuffixNaming {
    fn default() -> Self {
        Self { max_attempts: 100 }
    }
}

impl NamingPolicy for SuffixNaming {
    fn fresh_name(&self, base: &str, taken: &HashSet<String>) -> Option<String> {
        if !taken.contains(base) {
            return Some(base.to_string());
        }
        (1..=self.max_attempts)
            .map(|n| format!("{base}{n}"))
            .find(|candidate| !taken.contains(candidate))
    }
}

/// Names a fresh binding in this file must avoid: every identifier spelled
/// anywhere in the file, plus keywords and builtins.
pub(crate) fn taken_names(root: Node<'_>, source: &str) -> HashSet<String> {
    let mut taken: HashSet<String> = BUILTINS
        .iter()
        .chain(KEYWORDS)
        .map(|name| name.to_string())
        .collect();
    visit_nodes(root, &mut |node| {
        if node.kind() == "identifier" {
            taken.insert(source[node.byte_range()].to_string());
        }
    });
    taken
}
