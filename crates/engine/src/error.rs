use ir::NodeId;
use thiserror::Error;

/// Malformed input to the matcher. These point at a bug in a front end or
/// in rule compilation and are never treated as a non-match.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("{path}: pattern marker `{label}` found at node {node} of a program tree")]
    MarkerInTarget {
        path: String,
        node: NodeId,
        label: String,
    },
    #[error("{path}: {found} node {node} sits in a slot of `{parent_label}` {parent} that allows {allowed}")]
    MisplacedNode {
        path: String,
        parent: NodeId,
        parent_label: String,
        node: NodeId,
        found: String,
        allowed: String,
    },
    #[error("{path}: `{label}` node {node} has {found} children, its layout has {expected}")]
    Arity {
        path: String,
        node: NodeId,
        label: String,
        expected: usize,
        found: usize,
    },
    #[error("sub-pattern `{id}` is referenced but was not compiled")]
    MissingPattern { id: String },
    #[error("`{operator}` cannot be evaluated outside an `and`")]
    MisplacedOperator { operator: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("match timed out after {elapsed_ms} ms ({steps} steps)")]
    Timeout { elapsed_ms: u64, steps: u64 },
    #[error("internal error: {0}")]
    Invariant(#[from] InvariantViolation),
}
