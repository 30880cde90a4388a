//! Which categories may occupy each child slot of each node kind.
//!
//! Front ends are expected to respect this layout. The matcher consults it
//! while descending so that a malformed target surfaces as an invariant
//! violation instead of a silent non-match.

use std::fmt;
use thiserror::Error;

use crate::kind::{
    ArgKind, AttrKind, Category, DeclKind, ExprKind, ListKind, Marker, NodeKind, ParamKind,
    PatKind, StmtKind, TypeKind,
};
use crate::tree::{NodeId, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CategorySet(u16);

impl CategorySet {
    pub const NONE: CategorySet = CategorySet(0);
    pub const ANY: CategorySet = CategorySet(0x1ff);
    pub const EXPR: CategorySet = CategorySet::of(Category::Expr);
    pub const STMT: CategorySet = CategorySet::of(Category::Stmt).with(Category::Decl);
    pub const BINDING: CategorySet = CategorySet::of(Category::Expr).with(Category::Pattern);
    pub const TYPE: CategorySet = CategorySet::of(Category::Type);
    pub const LIST: CategorySet = CategorySet::of(Category::List);

    const fn bit(cat: Category) -> u16 {
        1 << (cat as u16)
    }

    pub const fn of(cat: Category) -> CategorySet {
        CategorySet(Self::bit(cat))
    }

    pub const fn with(self, cat: Category) -> CategorySet {
        CategorySet(self.0 | Self::bit(cat))
    }

    pub fn contains(self, cat: Category) -> bool {
        self.0 & Self::bit(cat) != 0
    }
}

impl fmt::Display for CategorySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Category::ALL
            .iter()
            .filter(|c| self.contains(**c))
            .map(|c| c.as_str())
            .collect();
        if names.is_empty() {
            f.write_str("nothing")
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

/// Categories allowed for the elements of a list.
pub fn list_element(kind: ListKind) -> CategorySet {
    match kind {
        ListKind::Program | ListKind::Block => CategorySet::STMT,
        ListKind::Args => CategorySet::of(Category::Arg),
        ListKind::Params => CategorySet::of(Category::Param),
        ListKind::Elements => CategorySet::BINDING,
        ListKind::Entries => CategorySet::BINDING,
        ListKind::Attrs => CategorySet::of(Category::Attr),
        ListKind::TypeArgs => CategorySet::TYPE,
    }
}

/// Fixed child layout of a kind, or `None` when the kind takes a variable
/// number of children (lists and opaque nodes).
pub fn layout(kind: &NodeKind) -> Option<Vec<CategorySet>> {
    use CategorySet as C;
    let slots = match kind {
        NodeKind::Expr(e) => match e {
            ExprKind::Ident(_) | ExprKind::Literal(_) => vec![],
            ExprKind::Call | ExprKind::New => vec![C::EXPR, C::LIST],
            ExprKind::Member | ExprKind::Index | ExprKind::Binary(_) | ExprKind::Pair => {
                vec![C::EXPR, C::EXPR]
            }
            ExprKind::Unary(_) => vec![C::EXPR],
            ExprKind::Assign(_) => vec![C::BINDING, C::EXPR],
            ExprKind::Conditional => vec![C::EXPR, C::EXPR, C::EXPR],
            ExprKind::Lambda => vec![C::LIST, C::EXPR.with(Category::Stmt)],
            ExprKind::Array | ExprKind::Object => vec![C::LIST],
            ExprKind::Other(_) => return None,
        },
        NodeKind::Stmt(s) => match s {
            StmtKind::Expr | StmtKind::Throw => vec![C::EXPR],
            StmtKind::Block => vec![C::LIST],
            StmtKind::If { has_else } => {
                let mut v = vec![C::EXPR, C::STMT];
                if *has_else {
                    v.push(C::STMT);
                }
                v
            }
            StmtKind::While => vec![C::EXPR, C::STMT],
            StmtKind::ForEach => vec![C::BINDING.with(Category::Decl), C::EXPR, C::STMT],
            StmtKind::Return { has_value } => {
                if *has_value {
                    vec![C::EXPR]
                } else {
                    vec![]
                }
            }
            StmtKind::Break | StmtKind::Continue | StmtKind::Empty => vec![],
            StmtKind::Other(_) => return None,
        },
        NodeKind::Type(TypeKind::Named(_)) => vec![],
        NodeKind::Type(TypeKind::Generic) => vec![C::TYPE, C::LIST],
        NodeKind::Pattern(PatKind::Array) | NodeKind::Pattern(PatKind::Object) => vec![C::LIST],
        NodeKind::Pattern(PatKind::Rest) => vec![C::BINDING],
        NodeKind::Pattern(PatKind::Pair) => vec![C::EXPR, C::BINDING],
        NodeKind::Param(ParamKind::Plain {
            has_type,
            has_default,
        }) => {
            let mut v = vec![C::BINDING];
            if *has_type {
                v.push(C::TYPE);
            }
            if *has_default {
                v.push(C::EXPR);
            }
            v
        }
        NodeKind::Param(ParamKind::Rest) => vec![C::BINDING],
        NodeKind::Arg(ArgKind::Positional) | NodeKind::Arg(ArgKind::Spread) => vec![C::EXPR],
        NodeKind::Arg(ArgKind::Named) => vec![C::EXPR, C::EXPR],
        NodeKind::Decl(DeclKind::Var { has_type, has_init }) => {
            let mut v = vec![C::LIST, C::BINDING];
            if *has_type {
                v.push(C::TYPE);
            }
            if *has_init {
                v.push(C::EXPR);
            }
            v
        }
        NodeKind::Decl(DeclKind::Function) => vec![C::LIST, C::EXPR, C::LIST, C::STMT],
        NodeKind::Decl(DeclKind::Class) => vec![C::LIST, C::EXPR, C::LIST],
        NodeKind::Attr(AttrKind::Modifier(_)) => vec![],
        NodeKind::Attr(AttrKind::Decorator) | NodeKind::Attr(AttrKind::Extends) => vec![C::EXPR],
        NodeKind::List(_) => return None,
        NodeKind::Marker(Marker::DeepEllipsis) => vec![C::ANY],
        NodeKind::Marker(_) => vec![],
    };
    Some(slots)
}

/// Categories allowed at child position `index` of a node of `kind`.
pub fn slot(kind: &NodeKind, index: usize) -> CategorySet {
    match kind {
        NodeKind::List(list) => list_element(*list),
        _ => match layout(kind) {
            Some(slots) => slots.get(index).copied().unwrap_or(CategorySet::NONE),
            None => CategorySet::ANY,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("{parent} expects {expected} children, found {found}")]
    Arity {
        parent: NodeId,
        expected: usize,
        found: usize,
    },
    #[error("child {child} of {parent} is a {found}, slot allows {allowed}")]
    Slot {
        parent: NodeId,
        child: NodeId,
        found: Category,
        allowed: CategorySet,
    },
    #[error("pattern marker {0} found in a program tree")]
    Marker(NodeId),
}

/// Checks every node of `tree` against the slot layout.
pub fn validate(tree: &Tree, allow_markers: bool) -> Result<(), SchemaError> {
    for id in tree.preorder() {
        let kind = tree.kind(id);
        if kind.is_marker() && !allow_markers {
            return Err(SchemaError::Marker(id));
        }
        let children = tree.children(id);
        if let Some(slots) = layout(kind) {
            if slots.len() != children.len() {
                return Err(SchemaError::Arity {
                    parent: id,
                    expected: slots.len(),
                    found: children.len(),
                });
            }
        }
        for (idx, child) in children.iter().enumerate() {
            let Some(found) = tree.kind(*child).category() else {
                if allow_markers {
                    continue;
                }
                return Err(SchemaError::Marker(*child));
            };
            let allowed = slot(kind, idx);
            if !allowed.contains(found) {
                return Err(SchemaError::Slot {
                    parent: id,
                    child: *child,
                    found,
                    allowed,
                });
            }
        }
    }
    Ok(())
}
