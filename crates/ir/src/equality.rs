//! Structural equality of subtrees, used for repeated metavariables and for
//! joining environments.
//!
//! Spans and trivia never take part in the comparison. Literal formatting is
//! normalized according to [`EqualityPolicy`].

use serde::{Deserialize, Serialize};

use crate::kind::{ExprKind, Literal, NodeKind};
use crate::tree::{NodeId, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct EqualityPolicy {
    /// `0x10`, `16` and `1_6` compare equal; so do `1.0` and `1.00`.
    pub normalize_numbers: bool,
    /// `'a'` and `"a"` compare equal.
    pub normalize_strings: bool,
    /// Operands of commutative binary operators may appear in either order.
    pub commutative: bool,
}

impl Default for EqualityPolicy {
    fn default() -> Self {
        Self {
            normalize_numbers: true,
            normalize_strings: true,
            commutative: false,
        }
    }
}

impl EqualityPolicy {
    /// Exact syntactic comparison, no normalization at all.
    pub fn syntactic() -> Self {
        Self {
            normalize_numbers: false,
            normalize_strings: false,
            commutative: false,
        }
    }
}

fn parse_int(raw: &str) -> Option<u128> {
    let text: String = raw
        .chars()
        .filter(|c| *c != '_')
        .collect::<String>()
        .to_ascii_lowercase();
    let text = text.trim_end_matches('n');
    let (digits, radix) = if let Some(rest) = text.strip_prefix("0x") {
        (rest, 16)
    } else if let Some(rest) = text.strip_prefix("0o") {
        (rest, 8)
    } else if let Some(rest) = text.strip_prefix("0b") {
        (rest, 2)
    } else {
        (text, 10)
    };
    u128::from_str_radix(digits, radix).ok()
}

fn parse_float(raw: &str) -> Option<f64> {
    let text: String = raw.chars().filter(|c| *c != '_').collect();
    text.parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Canonical text of a literal under `policy`.
fn literal_key(lit: &Literal, policy: &EqualityPolicy) -> String {
    match lit {
        Literal::Int(raw) if policy.normalize_numbers => match parse_int(raw) {
            Some(v) => format!("int:{v}"),
            None => format!("int:{raw}"),
        },
        Literal::Float(raw) if policy.normalize_numbers => match parse_float(raw) {
            Some(v) => format!("float:{:x}", v.to_bits()),
            None => format!("float:{raw}"),
        },
        Literal::Int(raw) => format!("int:{raw}"),
        Literal::Float(raw) => format!("float:{raw}"),
        Literal::Str { value, .. } if policy.normalize_strings => format!("str:{value}"),
        Literal::Str { raw, .. } => format!("str:{raw}"),
        Literal::Bool(b) => format!("bool:{b}"),
        Literal::Null => "null".to_string(),
    }
}

pub fn literal_eq(a: &Literal, b: &Literal, policy: &EqualityPolicy) -> bool {
    match (a, b) {
        (Literal::Int(x), Literal::Int(y)) if policy.normalize_numbers => {
            match (parse_int(x), parse_int(y)) {
                (Some(x), Some(y)) => x == y,
                _ => x == y,
            }
        }
        (Literal::Float(x), Literal::Float(y)) if policy.normalize_numbers => {
            match (parse_float(x), parse_float(y)) {
                (Some(x), Some(y)) => x == y,
                _ => x == y,
            }
        }
        (Literal::Str { value: x, .. }, Literal::Str { value: y, .. })
            if policy.normalize_strings =>
        {
            x == y
        }
        _ => a == b,
    }
}

/// Equality of the node tags alone, children not considered.
pub fn kinds_equal(a: &NodeKind, b: &NodeKind, policy: &EqualityPolicy) -> bool {
    match (a, b) {
        (NodeKind::Expr(ExprKind::Literal(x)), NodeKind::Expr(ExprKind::Literal(y))) => {
            literal_eq(x, y, policy)
        }
        _ => a == b,
    }
}

/// Whether the subtree at `a` in `a_tree` equals the subtree at `b` in
/// `b_tree`. Runs in time proportional to the subtree size, with an extra
/// logarithmic factor when commutative reordering is enabled.
pub fn structurally_equal(
    a_tree: &Tree,
    a: NodeId,
    b_tree: &Tree,
    b: NodeId,
    policy: &EqualityPolicy,
) -> bool {
    if policy.commutative {
        return fingerprint(a_tree, a, policy) == fingerprint(b_tree, b, policy);
    }
    let mut stack = vec![(a, b)];
    while let Some((x, y)) = stack.pop() {
        if !kinds_equal(a_tree.kind(x), b_tree.kind(y), policy) {
            return false;
        }
        let xs = a_tree.children(x);
        let ys = b_tree.children(y);
        if xs.len() != ys.len() {
            return false;
        }
        stack.extend(xs.iter().copied().zip(ys.iter().copied()));
    }
    true
}

/// Equality of two node runs, element by element.
pub fn sequences_equal(
    a_tree: &Tree,
    a: &[NodeId],
    b_tree: &Tree,
    b: &[NodeId],
    policy: &EqualityPolicy,
) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| structurally_equal(a_tree, *x, b_tree, *y, policy))
}

fn kind_key(kind: &NodeKind, policy: &EqualityPolicy) -> String {
    match kind {
        NodeKind::Expr(ExprKind::Literal(lit)) => literal_key(lit, policy),
        other => format!("{other:?}"),
    }
}

/// Canonical hash of a subtree. Two subtrees are structurally equal under
/// `policy` exactly when their fingerprints agree (up to hash collisions).
pub fn fingerprint(tree: &Tree, id: NodeId, policy: &EqualityPolicy) -> blake3::Hash {
    // post-order so every child hash exists before its parent needs it
    let mut order = Vec::new();
    let mut stack = vec![(id, false)];
    while let Some((node, expanded)) = stack.pop() {
        if expanded {
            order.push(node);
            continue;
        }
        stack.push((node, true));
        for child in tree.children(node).iter().rev() {
            stack.push((*child, false));
        }
    }

    let mut hashes: std::collections::HashMap<NodeId, blake3::Hash> =
        std::collections::HashMap::with_capacity(order.len());
    for node in order {
        let kind = tree.kind(node);
        let mut child_hashes: Vec<blake3::Hash> = tree
            .children(node)
            .iter()
            .filter_map(|c| hashes.get(c).copied())
            .collect();
        if policy.commutative {
            if let NodeKind::Expr(ExprKind::Binary(op)) = kind {
                if op.is_commutative() {
                    child_hashes.sort_by(|x, y| x.as_bytes().cmp(y.as_bytes()));
                }
            }
        }
        let mut hasher = blake3::Hasher::new();
        hasher.update(kind_key(kind, policy).as_bytes());
        hasher.update(&(child_hashes.len() as u64).to_le_bytes());
        for h in &child_hashes {
            hasher.update(h.as_bytes());
        }
        hashes.insert(node, hasher.finalize());
    }
    hashes
        .get(&id)
        .copied()
        .unwrap_or_else(|| blake3::hash(b""))
}
