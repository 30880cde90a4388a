//! Generic syntax tree shared by patterns and targets.
//!
//! Every language front end lowers into this model and the matcher only
//! ever sees it. Trees are arena-backed and immutable once built, so they
//! can be shared across worker threads without synchronization.

pub mod equality;
pub mod index;
pub mod kind;
pub mod location;
pub mod schema;
pub mod tree;

pub use equality::{fingerprint, kinds_equal, sequences_equal, structurally_equal, EqualityPolicy};
pub use index::AncestorIndex;
pub use kind::{
    ArgKind, AttrKind, BinOp, Category, DeclKind, ExprKind, ListKind, Literal, Marker, NodeKind,
    ParamKind, PatKind, StmtKind, TypeKind, UnOp,
};
pub use location::{sequence_span, LineIndex, Location, Position, Span};
pub use schema::{CategorySet, SchemaError};
pub use tree::{Node, NodeId, Tree, TreeBuilder, TreeError};

#[cfg(test)]
mod tests;
