//! Pattern compilation: parse with the target grammar, then turn
//! metavariable-shaped identifiers and ellipsis placeholders into markers.

use std::collections::{BTreeMap, BTreeSet};

use ir::{
    schema, ArgKind, AttrKind, Category, ExprKind, Marker, NodeId, NodeKind, ParamKind, StmtKind,
    Tree, TreeBuilder, TypeKind,
};
use parsers::{frontend, Language, SyntaxError};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid {language} pattern at {line}:{column}: {message}")]
    Syntax {
        language: Language,
        line: usize,
        column: usize,
        message: String,
    },
    #[error("variadic metavariable `$...{name}` must stand directly in a list")]
    VariadicPosition { name: String },
    #[error("metavariable `{name}` is used both as `${name}` and `$...{name}`")]
    MixedMetavariable { name: String },
    #[error("pattern has no statements")]
    Empty,
    #[error("pattern does not form a valid tree: {0}")]
    Malformed(String),
}

impl ParseError {
    fn syntax(language: Language, err: SyntaxError) -> Self {
        ParseError::Syntax {
            language,
            line: err.line,
            column: err.column,
            message: err.message,
        }
    }
}

/// Where matching starts in a pattern tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternRoot {
    /// A single expression, statement or declaration.
    Node(NodeId),
    /// Several statements, matched against contiguous runs of a statement
    /// list.
    Sequence(Vec<NodeId>),
}

#[derive(Debug, Clone)]
pub struct PatternTree {
    pub tree: Tree,
    pub root: PatternRoot,
    pub language: Language,
    pub source: String,
    /// Every metavariable name the pattern mentions, without `$`.
    pub metavariables: BTreeSet<String>,
}

impl PatternTree {
    pub fn is_sequence(&self) -> bool {
        matches!(self.root, PatternRoot::Sequence(_))
    }
}

/// `^[A-Z_][A-Z0-9_]*$`
pub fn is_metavariable_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase() || c == '_')
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn scalar_name(text: &str) -> Option<&str> {
    text.strip_prefix('$')
        .filter(|rest| !rest.starts_with("..."))
        .filter(|rest| is_metavariable_name(rest))
}

fn variadic_name(text: &str) -> Option<&str> {
    text.strip_prefix("$...").filter(|rest| is_metavariable_name(rest))
}

/// Compiles `source` into a pattern tree for `language`.
///
/// # Example
/// ```
/// use parsers::Language;
/// use patterns::compile_pattern;
/// let p = compile_pattern(Language::Generic, "$X == $X").unwrap();
/// assert!(p.metavariables.contains("X"));
/// ```
pub fn compile_pattern(language: Language, source: &str) -> Result<PatternTree, ParseError> {
    let parsed = frontend(language)
        .parse_pattern(source)
        .map_err(|e| ParseError::syntax(language, e))?;
    let stmts = parsed.children(parsed.root()).to_vec();

    let mut rw = Rewriter {
        old: &parsed,
        b: TreeBuilder::new("<pattern>", language.as_str(), parsed.source()),
    };
    let root = match stmts.as_slice() {
        [] => return Err(ParseError::Empty),
        [only] => {
            let only = *only;
            match parsed.kind(only) {
                // a lone expression statement matches the expression anywhere
                NodeKind::Stmt(StmtKind::Expr) => match parsed.children(only) {
                    [expr] => PatternRoot::Node(rw.rewrite(*expr)?),
                    _ => PatternRoot::Node(rw.rewrite(only)?),
                },
                _ => PatternRoot::Node(rw.rewrite(only)?),
            }
        }
        many => {
            let mut ids = Vec::with_capacity(many.len());
            for stmt in many {
                ids.push(rw.rewrite(*stmt)?);
            }
            PatternRoot::Sequence(ids)
        }
    };
    let top = match &root {
        PatternRoot::Node(id) => *id,
        PatternRoot::Sequence(ids) => {
            let span = parsed.span(parsed.root());
            rw.b
                .push(NodeKind::List(ir::ListKind::Block), ids.clone(), span)
                .map_err(|e| ParseError::Malformed(e.to_string()))?
        }
    };
    let tree = rw
        .b
        .finish(top)
        .map_err(|e| ParseError::Malformed(e.to_string()))?;
    schema::validate(&tree, true).map_err(|e| ParseError::Malformed(e.to_string()))?;
    let metavariables = check_metavariables(&tree)?;
    debug!(
        language = %language,
        nodes = tree.len(),
        metavariables = metavariables.len(),
        "Compiled pattern"
    );
    Ok(PatternTree {
        tree,
        root,
        language,
        source: source.to_string(),
        metavariables,
    })
}

struct Rewriter<'t> {
    old: &'t Tree,
    b: TreeBuilder,
}

impl Rewriter<'_> {
    fn marker(&mut self, id: NodeId, marker: Marker) -> Result<NodeId, ParseError> {
        self.b
            .leaf(NodeKind::Marker(marker), self.old.span(id))
            .map_err(|e| ParseError::Malformed(e.to_string()))
    }

    /// Marker that replaces a wrapper whose only child is a placeholder:
    /// `Stmt::Expr[...]`, `Arg[$...A]`, `Param[...]` and so on.
    fn unwrap_placeholder(&mut self, id: NodeId, category: Category) -> Result<Option<NodeId>, ParseError> {
        let [child] = self.old.children(id) else {
            return Ok(None);
        };
        let child = *child;
        let marker = match self.old.kind(child) {
            NodeKind::Marker(Marker::Ellipsis) => Marker::Ellipsis,
            NodeKind::Expr(ExprKind::Ident(text)) => {
                if let Some(name) = variadic_name(text) {
                    Marker::Variadic { name: name.to_string() }
                } else if let (Some(name), Category::Stmt) = (scalar_name(text), category) {
                    Marker::Metavar {
                        name: name.to_string(),
                        category: Category::Stmt,
                    }
                } else {
                    return Ok(None);
                }
            }
            _ => return Ok(None),
        };
        // the wrapper's span covers trailing `;` or `,`; keep the child's
        let span = self.old.span(child);
        self.b
            .leaf(NodeKind::Marker(marker), span)
            .map(Some)
            .map_err(|e| ParseError::Malformed(e.to_string()))
    }

    fn rewrite(&mut self, id: NodeId) -> Result<NodeId, ParseError> {
        let kind = self.old.kind(id).clone();
        let unwrapped = match &kind {
            NodeKind::Stmt(StmtKind::Expr) => self.unwrap_placeholder(id, Category::Stmt)?,
            NodeKind::Arg(ArgKind::Positional) => self.unwrap_placeholder(id, Category::Arg)?,
            NodeKind::Param(ParamKind::Plain {
                has_type: false,
                has_default: false,
            }) => self.unwrap_placeholder(id, Category::Param)?,
            _ => None,
        };
        if let Some(marker) = unwrapped {
            return Ok(marker);
        }

        let replaced = match &kind {
            NodeKind::Expr(ExprKind::Ident(text)) => {
                if let Some(name) = variadic_name(text) {
                    Some(Marker::Variadic { name: name.to_string() })
                } else {
                    scalar_name(text).map(|name| Marker::Metavar {
                        name: name.to_string(),
                        category: Category::Expr,
                    })
                }
            }
            NodeKind::Type(TypeKind::Named(text)) => scalar_name(text).map(|name| Marker::Metavar {
                name: name.to_string(),
                category: Category::Type,
            }),
            NodeKind::Attr(AttrKind::Modifier(text)) => scalar_name(text).map(|name| Marker::Metavar {
                name: name.to_string(),
                category: Category::Attr,
            }),
            _ => None,
        };
        if let Some(marker) = replaced {
            return self.marker(id, marker);
        }

        let children = self.old.children(id).to_vec();
        let mut rewritten = Vec::with_capacity(children.len());
        for child in children {
            rewritten.push(self.rewrite(child)?);
        }
        self.b
            .push(kind, rewritten, self.old.span(id))
            .map_err(|e| ParseError::Malformed(e.to_string()))
    }
}

/// Rejects variadics outside lists and names used both ways; returns the
/// set of names.
fn check_metavariables(tree: &Tree) -> Result<BTreeSet<String>, ParseError> {
    let mut variadic: BTreeMap<String, bool> = BTreeMap::new();
    let root_is_list = matches!(tree.kind(tree.root()), NodeKind::List(_));
    for id in tree.preorder() {
        let parent_is_list = matches!(tree.kind(id), NodeKind::List(_));
        for child in tree.children(id) {
            if let NodeKind::Marker(Marker::Variadic { name }) = tree.kind(*child) {
                if !parent_is_list {
                    return Err(ParseError::VariadicPosition { name: name.clone() });
                }
            }
        }
        let (name, is_variadic) = match tree.kind(id) {
            NodeKind::Marker(Marker::Metavar { name, .. }) => (name, false),
            NodeKind::Marker(Marker::Variadic { name }) => (name, true),
            _ => continue,
        };
        if id == tree.root() && is_variadic && !root_is_list {
            return Err(ParseError::VariadicPosition { name: name.clone() });
        }
        match variadic.get(name) {
            Some(prev) if *prev != is_variadic => {
                return Err(ParseError::MixedMetavariable { name: name.clone() });
            }
            _ => {
                variadic.insert(name.clone(), is_variadic);
            }
        }
    }
    Ok(variadic.into_keys().collect())
}
