//! Closed node vocabulary of the generic tree.
//!
//! Every node belongs to exactly one [`Category`] and carries a kind from the
//! closed enum of that category. Pattern-only placeholders live in
//! [`Marker`] and never appear in a tree produced from program source.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Expr,
    Stmt,
    Type,
    Pattern,
    Param,
    Arg,
    Decl,
    Attr,
    List,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Expr,
        Category::Stmt,
        Category::Type,
        Category::Pattern,
        Category::Param,
        Category::Arg,
        Category::Decl,
        Category::Attr,
        Category::List,
    ];

    /// Whether a metavariable standing for `self` may bind a node of
    /// category `other`. Declarations are statements, and destructuring
    /// patterns stand where assigned expressions do.
    pub fn accepts(self, other: Category) -> bool {
        self == other
            || (self == Category::Stmt && other == Category::Decl)
            || (self == Category::Expr && other == Category::Pattern)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Expr => "expression",
            Category::Stmt => "statement",
            Category::Type => "type",
            Category::Pattern => "pattern",
            Category::Param => "parameter",
            Category::Arg => "argument",
            Category::Decl => "declaration",
            Category::Attr => "attribute",
            Category::List => "list",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Coalesce,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    In,
    InstanceOf,
}

impl BinOp {
    pub fn from_symbol(sym: &str) -> Option<BinOp> {
        let op = match sym {
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mul,
            "/" => BinOp::Div,
            "%" => BinOp::Rem,
            "**" => BinOp::Pow,
            "==" => BinOp::Eq,
            "!=" => BinOp::NotEq,
            "===" => BinOp::StrictEq,
            "!==" => BinOp::StrictNotEq,
            "<" => BinOp::Lt,
            "<=" => BinOp::Le,
            ">" => BinOp::Gt,
            ">=" => BinOp::Ge,
            "&&" => BinOp::And,
            "||" => BinOp::Or,
            "??" => BinOp::Coalesce,
            "&" => BinOp::BitAnd,
            "|" => BinOp::BitOr,
            "^" => BinOp::BitXor,
            "<<" => BinOp::Shl,
            ">>" => BinOp::Shr,
            ">>>" => BinOp::UShr,
            "in" => BinOp::In,
            "instanceof" => BinOp::InstanceOf,
            _ => return None,
        };
        Some(op)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Pow => "**",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::StrictEq => "===",
            BinOp::StrictNotEq => "!==",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::Coalesce => "??",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::UShr => ">>>",
            BinOp::In => "in",
            BinOp::InstanceOf => "instanceof",
        }
    }

    /// Operators whose operands may be swapped when the equality policy
    /// allows commutative reordering. Short-circuiting and string-concatenating
    /// operators are excluded because their operand order is observable.
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            BinOp::Mul
                | BinOp::Eq
                | BinOp::NotEq
                | BinOp::StrictEq
                | BinOp::StrictNotEq
                | BinOp::BitAnd
                | BinOp::BitOr
                | BinOp::BitXor
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnOp {
    Not,
    Neg,
    Plus,
    BitNot,
    TypeOf,
    Void,
    Delete,
    Await,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

impl UnOp {
    pub fn from_prefix(sym: &str) -> Option<UnOp> {
        let op = match sym {
            "!" => UnOp::Not,
            "-" => UnOp::Neg,
            "+" => UnOp::Plus,
            "~" => UnOp::BitNot,
            "typeof" => UnOp::TypeOf,
            "void" => UnOp::Void,
            "delete" => UnOp::Delete,
            "await" => UnOp::Await,
            "++" => UnOp::PreInc,
            "--" => UnOp::PreDec,
            _ => return None,
        };
        Some(op)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Literal {
    /// Raw integer text as written (`0x1F`, `1_000`).
    Int(String),
    /// Raw float text as written.
    Float(String),
    /// `raw` keeps the quotes, `value` is the unescaped content.
    Str { raw: String, value: String },
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExprKind {
    Ident(String),
    Literal(Literal),
    /// `[callee, List(Args)]`
    Call,
    /// `[callee, List(Args)]`
    New,
    /// `[object, Ident(property)]`
    Member,
    /// `[object, index]`
    Index,
    /// `[lhs, rhs]`
    Binary(BinOp),
    /// `[operand]`
    Unary(UnOp),
    /// `[target, value]`; `Some(op)` for compound assignment.
    Assign(Option<BinOp>),
    /// `[cond, then, else]`
    Conditional,
    /// `[List(Params), body]`
    Lambda,
    /// `[List(Elements)]`
    Array,
    /// `[List(Entries)]`
    Object,
    /// `[key, value]`
    Pair,
    /// Construct the front end could not classify.
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StmtKind {
    /// `[expr]`
    Expr,
    /// `[List(Block)]`
    Block,
    /// `[cond, then]` or `[cond, then, else]`
    If { has_else: bool },
    /// `[cond, body]`
    While,
    /// `[binding, iterable, body]`
    ForEach,
    /// `[]` or `[value]`
    Return { has_value: bool },
    /// `[value]`
    Throw,
    Break,
    Continue,
    Empty,
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Named(String),
    /// `[base, List(TypeArgs)]`
    Generic,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatKind {
    /// `[List(Elements)]`
    Array,
    /// `[List(Entries)]`
    Object,
    /// `[binding]`
    Rest,
    /// `[key, binding]` entry of an object pattern.
    Pair,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamKind {
    /// `[name]`, optionally followed by a type and a default value.
    Plain { has_type: bool, has_default: bool },
    /// `[name]`
    Rest,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArgKind {
    /// `[value]`
    Positional,
    /// `[Ident(name), value]`
    Named,
    /// `[value]`
    Spread,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeclKind {
    /// `[List(Attrs), name]`, optionally followed by a type and an initializer.
    Var { has_type: bool, has_init: bool },
    /// `[List(Attrs), name, List(Params), body]`
    Function,
    /// `[List(Attrs), name, List(Block)]`; the superclass is an
    /// `Extends` attribute.
    Class,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttrKind {
    Modifier(String),
    /// `[expr]`
    Decorator,
    /// `[expr]`, the superclass of a class.
    Extends,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListKind {
    Program,
    Block,
    Args,
    Params,
    Elements,
    Entries,
    Attrs,
    TypeArgs,
}

impl ListKind {
    /// Lists whose element order carries no meaning for matching.
    pub fn is_unordered(self) -> bool {
        matches!(self, ListKind::Attrs | ListKind::Entries)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Marker {
    /// Zero or more siblings in a list, or any single node elsewhere.
    Ellipsis,
    /// `[inner]`: `inner` matched here or at any descendant.
    DeepEllipsis,
    Metavar { name: String, category: Category },
    /// Like [`Marker::Ellipsis`], binding the absorbed run under `name`.
    Variadic { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Expr(ExprKind),
    Stmt(StmtKind),
    Type(TypeKind),
    Pattern(PatKind),
    Param(ParamKind),
    Arg(ArgKind),
    Decl(DeclKind),
    Attr(AttrKind),
    List(ListKind),
    Marker(Marker),
}

impl NodeKind {
    /// Category of a regular node. Markers have none, except that a scalar
    /// metavariable reports the category it stands for.
    pub fn category(&self) -> Option<Category> {
        match self {
            NodeKind::Expr(_) => Some(Category::Expr),
            NodeKind::Stmt(_) => Some(Category::Stmt),
            NodeKind::Type(_) => Some(Category::Type),
            NodeKind::Pattern(_) => Some(Category::Pattern),
            NodeKind::Param(_) => Some(Category::Param),
            NodeKind::Arg(_) => Some(Category::Arg),
            NodeKind::Decl(_) => Some(Category::Decl),
            NodeKind::Attr(_) => Some(Category::Attr),
            NodeKind::List(_) => Some(Category::List),
            NodeKind::Marker(Marker::Metavar { category, .. }) => Some(*category),
            NodeKind::Marker(_) => None,
        }
    }

    pub fn is_marker(&self) -> bool {
        matches!(self, NodeKind::Marker(_))
    }

    pub fn ident(&self) -> Option<&str> {
        match self {
            NodeKind::Expr(ExprKind::Ident(name)) => Some(name),
            _ => None,
        }
    }

    /// Short label used in graph exports and diagnostics.
    pub fn label(&self) -> String {
        match self {
            NodeKind::Expr(ExprKind::Ident(name)) => format!("Ident:{name}"),
            NodeKind::Expr(ExprKind::Literal(Literal::Int(raw)))
            | NodeKind::Expr(ExprKind::Literal(Literal::Float(raw)))
            | NodeKind::Expr(ExprKind::Literal(Literal::Str { raw, .. })) => {
                format!("Literal:{raw}")
            }
            NodeKind::Expr(ExprKind::Literal(lit)) => format!("Literal:{lit:?}"),
            NodeKind::Expr(ExprKind::Binary(op)) => format!("Binary:{}", op.symbol()),
            NodeKind::Expr(ExprKind::Other(kind)) | NodeKind::Stmt(StmtKind::Other(kind)) => {
                format!("Other:{kind}")
            }
            NodeKind::Type(TypeKind::Named(name)) => format!("Type:{name}"),
            NodeKind::Attr(AttrKind::Modifier(name)) => format!("Modifier:{name}"),
            NodeKind::Marker(Marker::Ellipsis) => "...".to_string(),
            NodeKind::Marker(Marker::DeepEllipsis) => "<... ...>".to_string(),
            NodeKind::Marker(Marker::Metavar { name, .. }) => format!("${name}"),
            NodeKind::Marker(Marker::Variadic { name }) => format!("$...{name}"),
            other => format!("{other:?}"),
        }
    }
}
