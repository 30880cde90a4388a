//! Persistent binding environments.
//!
//! Extending an environment returns a new one and leaves the original
//! untouched, so sibling branches of the backtracking search can keep
//! their own view without copying.

use ir::{sequence_span, sequences_equal, structurally_equal, EqualityPolicy, NodeId, Position, Span, Tree};
use rpds::RedBlackTreeMapSync;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Value bound to a metavariable: one target node, or the run of siblings
/// absorbed by a variadic metavariable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Binding {
    Node(NodeId),
    /// `at` locates the run when it is empty.
    Seq { nodes: Vec<NodeId>, at: Position },
}

impl Binding {
    pub fn span(&self, tree: &Tree) -> Span {
        match self {
            Binding::Node(id) => tree.span(*id),
            Binding::Seq { nodes, at } => sequence_span(tree, nodes, *at),
        }
    }

    /// Source text of the bound value.
    pub fn text<'t>(&self, tree: &'t Tree) -> &'t str {
        tree.slice(self.span(tree))
    }

    pub fn nodes(&self) -> &[NodeId] {
        match self {
            Binding::Node(id) => std::slice::from_ref(id),
            Binding::Seq { nodes, .. } => nodes,
        }
    }

    /// Structural equality of two values bound in the same target tree.
    pub fn equals(&self, other: &Binding, tree: &Tree, policy: &EqualityPolicy) -> bool {
        match (self, other) {
            (Binding::Node(a), Binding::Node(b)) => {
                a == b || structurally_equal(tree, *a, tree, *b, policy)
            }
            (Binding::Seq { nodes: a, .. }, Binding::Seq { nodes: b, .. }) => {
                sequences_equal(tree, a, tree, b, policy)
            }
            _ => false,
        }
    }
}

#[derive(Clone)]
pub struct Env {
    map: RedBlackTreeMapSync<String, Binding>,
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

impl Env {
    pub fn new() -> Self {
        Self {
            map: RedBlackTreeMapSync::new_sync(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.map.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.map.size()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Bindings in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Binding)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// New environment with `name` bound to `value`, replacing any
    /// previous binding. Callers check consistency first.
    pub fn bind(&self, name: &str, value: Binding) -> Env {
        Env {
            map: self.map.insert(name.to_string(), value),
        }
    }

    /// Whether every name bound in both environments has equal values.
    pub fn compatible(&self, other: &Env, tree: &Tree, policy: &EqualityPolicy) -> bool {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small.iter().all(|(name, value)| match large.get(name) {
            Some(existing) => existing.equals(value, tree, policy),
            None => true,
        })
    }

    /// Union of both environments, or `None` when they disagree on a
    /// shared name. Values already in `self` win.
    pub fn join(&self, other: &Env, tree: &Tree, policy: &EqualityPolicy) -> Option<Env> {
        let mut map = self.map.clone();
        for (name, value) in other.iter() {
            match map.get(name) {
                Some(existing) if !existing.equals(value, tree, policy) => return None,
                Some(_) => {}
                None => map = map.insert(name.to_string(), value.clone()),
            }
        }
        Some(Env { map })
    }

    /// `(name, text)` pairs in name order.
    pub fn render(&self, tree: &Tree) -> Vec<(String, String)> {
        self.iter()
            .map(|(name, value)| (name.to_string(), value.text(tree).to_string()))
            .collect()
    }
}

impl PartialEq for Env {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl Eq for Env {}

impl Hash for Env {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for (name, value) in self.iter() {
            name.hash(state);
            value.hash(state);
        }
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
