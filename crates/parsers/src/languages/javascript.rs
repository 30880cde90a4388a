//! JavaScript front end: tree-sitter parse, then lowering of the common
//! expression and statement subset into the generic tree.
//!
//! Constructs outside that subset lower to `Other(kind)` with their named
//! children preserved, so searching still reaches inside them.

use ir::{
    ArgKind, AttrKind, BinOp, DeclKind, ExprKind, LineIndex, ListKind, Literal, Marker, NodeId,
    NodeKind, ParamKind, PatKind, Span, StmtKind, Tree, TreeBuilder, UnOp,
};
use tracing::debug;
use tree_sitter::Node;

use crate::{Frontend, Language, SyntaxError};

const ELLIPSIS: &str = "__ellipsis__";
const DEEP: &str = "__deep__";
const VARIADIC: &str = "$__variadic__";

/// Deepest syntax tree the lowering accepts; it recurses once per level.
const MAX_DEPTH: usize = 256;

pub struct JavaScriptFrontend;

impl Frontend for JavaScriptFrontend {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn parse_program(&self, path: &str, source: &str) -> Result<Tree, SyntaxError> {
        parse(path, source.to_string(), false)
    }

    fn parse_pattern(&self, source: &str) -> Result<Tree, SyntaxError> {
        parse("<pattern>", preprocess_pattern(source), true)
    }
}

pub fn parse_javascript(path: &str, source: &str) -> Result<Tree, SyntaxError> {
    parse(path, source.to_string(), false)
}

/// Rewrites pattern-only syntax into placeholder JavaScript so the stock
/// grammar accepts it. String literals are copied untouched.
fn preprocess_pattern(src: &str) -> String {
    let mut out = String::with_capacity(src.len() + 16);
    let mut i = 0;
    while let Some(ch) = src[i..].chars().next() {
        let rest = &src[i..];
        if matches!(ch, '"' | '\'' | '`') {
            let len = quoted_len(rest, ch);
            out.push_str(&rest[..len]);
            i += len;
        } else if rest.starts_with("<...") {
            out.push_str(DEEP);
            out.push('(');
            i += 4;
        } else if rest.starts_with("...>") {
            out.push(')');
            i += 4;
        } else if rest.starts_with("$...") {
            out.push_str(VARIADIC);
            i += 4;
        } else if rest.starts_with("...") {
            let after = &rest[3..];
            let spread = after
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric() || "_$([{\"'`".contains(c));
            if spread {
                out.push_str("...");
            } else {
                out.push_str(ELLIPSIS);
                // `... foo()` on one line needs a separator to stay a statement
                let same_line = after.trim_start_matches([' ', '\t']);
                let needs_semi = same_line
                    .chars()
                    .next()
                    .is_some_and(|c| !matches!(c, '\n' | '\r' | ',' | ';' | ')' | ']' | '}' | '.' | '>'));
                if needs_semi {
                    out.push(';');
                }
            }
            i += 3;
        } else {
            out.push(ch);
            i += ch.len_utf8();
        }
    }
    out
}

fn quoted_len(s: &str, quote: char) -> usize {
    let mut escaped = false;
    for (idx, c) in s.char_indices().skip(1) {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return idx + c.len_utf8();
        }
    }
    s.len()
}

fn parse(path: &str, text: String, pattern: bool) -> Result<Tree, SyntaxError> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(tree_sitter_javascript::language())
        .map_err(|e| SyntaxError::new(format!("cannot load javascript grammar: {e}"), 1, 1))?;
    let Some(ts) = parser.parse(&text, None) else {
        return Err(SyntaxError::new("javascript parser produced no tree", 1, 1));
    };
    let lines = LineIndex::new(&text);
    let root = ts.root_node();
    if root.has_error() {
        return Err(first_error(root, &text, &lines));
    }
    check_depth(root, &lines)?;
    debug!(file = path, pattern, "Lowering javascript tree");
    let mut lower = Lowerer {
        src: &text,
        lines: &lines,
        pattern,
        b: TreeBuilder::new(path, Language::JavaScript.as_str(), text.as_str()),
    };
    let program = lower.program(root)?;
    Ok(lower.b.finish(program)?)
}

fn first_error(root: Node<'_>, src: &str, lines: &LineIndex) -> SyntaxError {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            let pos = lines.position(node.start_byte());
            let message = if node.is_missing() {
                format!("missing `{}`", node.kind())
            } else {
                let text = src.get(node.start_byte()..node.end_byte()).unwrap_or_default();
                let snippet: String = text.chars().take(30).collect();
                format!("unexpected `{snippet}`")
            };
            return SyntaxError::new(message, pos.line, pos.column);
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    let pos = lines.position(root.start_byte());
    SyntaxError::new("invalid javascript", pos.line, pos.column)
}

fn check_depth(root: Node<'_>, lines: &LineIndex) -> Result<(), SyntaxError> {
    let mut cursor = root.walk();
    let mut depth = 0usize;
    loop {
        if depth > MAX_DEPTH {
            let pos = lines.position(cursor.node().start_byte());
            return Err(SyntaxError::new(
                format!("nesting deeper than {MAX_DEPTH} levels"),
                pos.line,
                pos.column,
            ));
        }
        if cursor.goto_first_child() {
            depth += 1;
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return Ok(());
            }
            depth -= 1;
        }
    }
}

fn named<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    let out: Vec<Node<'t>> = node
        .named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .collect();
    out
}

fn unescape(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

struct Lowerer<'s> {
    src: &'s str,
    lines: &'s LineIndex,
    pattern: bool,
    b: TreeBuilder,
}

type LResult<T> = Result<T, SyntaxError>;

impl<'s> Lowerer<'s> {
    fn text(&self, node: Node<'_>) -> &'s str {
        self.src
            .get(node.start_byte()..node.end_byte())
            .unwrap_or_default()
    }

    fn span(&self, start: usize, end: usize) -> Span {
        Span::new(self.lines.position(start), self.lines.position(end.max(start)))
    }

    fn push(&mut self, kind: NodeKind, children: Vec<NodeId>, node: Node<'_>) -> LResult<NodeId> {
        let span = self.span(node.start_byte(), node.end_byte());
        Ok(self.b.push(kind, children, span)?)
    }

    /// List whose span is the interior of a delimited node such as `(..)`.
    fn interior_list(&mut self, kind: ListKind, items: Vec<NodeId>, node: Node<'_>) -> LResult<NodeId> {
        let start = node.start_byte() + 1;
        let end = node.end_byte().saturating_sub(1);
        let span = self.span(start, end);
        Ok(self.b.push(NodeKind::List(kind), items, span)?)
    }

    fn empty_list(&mut self, kind: ListKind, at: usize) -> LResult<NodeId> {
        let span = self.span(at, at);
        Ok(self.b.push(NodeKind::List(kind), vec![], span)?)
    }

    fn is_placeholder(&self, node: Node<'_>, name: &str) -> bool {
        self.pattern
            && matches!(
                node.kind(),
                "identifier"
                    | "property_identifier"
                    | "shorthand_property_identifier"
                    | "shorthand_property_identifier_pattern"
            )
            && self.text(node) == name
    }

    fn program(&mut self, root: Node<'_>) -> LResult<NodeId> {
        let mut stmts = Vec::new();
        for child in named(root) {
            stmts.extend(self.statement(child)?);
        }
        let span = self.span(0, self.src.len());
        Ok(self.b.push(NodeKind::List(ListKind::Program), stmts, span)?)
    }

    fn block(&mut self, node: Node<'_>) -> LResult<NodeId> {
        let mut stmts = Vec::new();
        for child in named(node) {
            stmts.extend(self.statement(child)?);
        }
        let list = self.interior_list(ListKind::Block, stmts, node)?;
        self.push(NodeKind::Stmt(StmtKind::Block), vec![list], node)
    }

    /// Statements lower to zero or more generic statements; a declaration
    /// list with several declarators yields one declaration each.
    fn statement(&mut self, node: Node<'_>) -> LResult<Vec<NodeId>> {
        let stmt = match node.kind() {
            "expression_statement" => {
                let Some(inner) = named(node).into_iter().next() else {
                    return Ok(vec![]);
                };
                let value = if self.is_placeholder(inner, ELLIPSIS) {
                    self.marker(Marker::Ellipsis, inner)?
                } else {
                    self.expr(inner)?
                };
                self.push(NodeKind::Stmt(StmtKind::Expr), vec![value], node)?
            }
            "statement_block" => self.block(node)?,
            "if_statement" => {
                let mut children = Vec::new();
                if let Some(cond) = node.child_by_field_name("condition") {
                    children.push(self.expr(cond)?);
                }
                if let Some(then) = node.child_by_field_name("consequence") {
                    children.push(self.single_statement(then)?);
                }
                if let Some(alt) = node.child_by_field_name("alternative") {
                    let inner = named(alt).into_iter().next().unwrap_or(alt);
                    children.push(self.single_statement(inner)?);
                }
                let has_else = children.len() == 3;
                self.push(NodeKind::Stmt(StmtKind::If { has_else }), children, node)?
            }
            "while_statement" => {
                let mut children = Vec::new();
                if let Some(cond) = node.child_by_field_name("condition") {
                    children.push(self.expr(cond)?);
                }
                if let Some(body) = node.child_by_field_name("body") {
                    children.push(self.single_statement(body)?);
                }
                self.push(NodeKind::Stmt(StmtKind::While), children, node)?
            }
            "for_in_statement" => self.for_in(node)?,
            "return_statement" => {
                let value = named(node).into_iter().next();
                let children = match value {
                    Some(v) => vec![self.expr(v)?],
                    None => vec![],
                };
                let has_value = !children.is_empty();
                self.push(NodeKind::Stmt(StmtKind::Return { has_value }), children, node)?
            }
            "throw_statement" => {
                let value = named(node).into_iter().next();
                let children = match value {
                    Some(v) => vec![self.expr(v)?],
                    None => vec![],
                };
                self.push(NodeKind::Stmt(StmtKind::Throw), children, node)?
            }
            "break_statement" => self.push(NodeKind::Stmt(StmtKind::Break), vec![], node)?,
            "continue_statement" => self.push(NodeKind::Stmt(StmtKind::Continue), vec![], node)?,
            "empty_statement" => self.push(NodeKind::Stmt(StmtKind::Empty), vec![], node)?,
            "lexical_declaration" | "variable_declaration" => {
                return self.var_declarations(node, Vec::new());
            }
            "function_declaration" | "generator_function_declaration" => {
                self.function(node, Vec::new())?
            }
            "class_declaration" => self.class(node, Vec::new())?,
            "export_statement" => return self.export(node),
            "comment" => return Ok(vec![]),
            other => {
                let mut children = Vec::new();
                for child in named(node) {
                    children.push(self.any(child)?);
                }
                self.push(NodeKind::Stmt(StmtKind::Other(other.to_string())), children, node)?
            }
        };
        Ok(vec![stmt])
    }

    /// Statement in a single-statement slot such as an `if` branch.
    fn single_statement(&mut self, node: Node<'_>) -> LResult<NodeId> {
        let mut stmts = self.statement(node)?;
        if stmts.len() == 1 {
            if let Some(stmt) = stmts.pop() {
                return Ok(stmt);
            }
        }
        // several declarators in a branch: wrap them so the slot keeps one
        let list = self.b.push(
            NodeKind::List(ListKind::Block),
            stmts,
            self.span(node.start_byte(), node.end_byte()),
        )?;
        self.push(NodeKind::Stmt(StmtKind::Block), vec![list], node)
    }

    fn any(&mut self, node: Node<'_>) -> LResult<NodeId> {
        let kind = node.kind();
        if kind.ends_with("_statement") || kind.ends_with("_declaration") || kind == "statement_block" {
            self.single_statement(node)
        } else {
            self.expr(node)
        }
    }

    fn for_in(&mut self, node: Node<'_>) -> LResult<NodeId> {
        let mut children = Vec::new();
        if let Some(left) = node.child_by_field_name("left") {
            let binding = match node.child_by_field_name("kind") {
                Some(kw) => {
                    let attrs = self.modifiers_for(kw)?;
                    let name = self.binding(left)?;
                    self.push(
                        NodeKind::Decl(DeclKind::Var {
                            has_type: false,
                            has_init: false,
                        }),
                        vec![attrs, name],
                        left,
                    )?
                }
                None => self.binding(left)?,
            };
            children.push(binding);
        }
        if let Some(right) = node.child_by_field_name("right") {
            children.push(self.expr(right)?);
        }
        if let Some(body) = node.child_by_field_name("body") {
            children.push(self.single_statement(body)?);
        }
        self.push(NodeKind::Stmt(StmtKind::ForEach), children, node)
    }

    fn modifiers_for(&mut self, kw: Node<'_>) -> LResult<NodeId> {
        if self.text(kw) == "const" {
            let modifier = self.push(NodeKind::Attr(AttrKind::Modifier("const".into())), vec![], kw)?;
            let span = self.span(kw.start_byte(), kw.end_byte());
            Ok(self.b.push(NodeKind::List(ListKind::Attrs), vec![modifier], span)?)
        } else {
            self.empty_list(ListKind::Attrs, kw.start_byte())
        }
    }

    fn attrs(&mut self, modifiers: Vec<NodeId>, at: usize) -> LResult<NodeId> {
        if modifiers.is_empty() {
            return self.empty_list(ListKind::Attrs, at);
        }
        let start = modifiers
            .first()
            .and_then(|id| self.b.span(*id))
            .map_or(at, |s| s.start.offset);
        let end = modifiers
            .last()
            .and_then(|id| self.b.span(*id))
            .map_or(at, |s| s.end.offset);
        let span = self.span(start, end);
        Ok(self.b.push(NodeKind::List(ListKind::Attrs), modifiers, span)?)
    }

    fn var_declarations(&mut self, node: Node<'_>, mut extra: Vec<NodeId>) -> LResult<Vec<NodeId>> {
        let keyword = node.child(0).map(|kw| self.text(kw)).unwrap_or("var");
        let mut out = Vec::new();
        for declarator in named(node) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let mut modifiers = std::mem::take(&mut extra);
            if keyword == "const" {
                if let Some(kw) = node.child(0) {
                    modifiers.push(self.push(
                        NodeKind::Attr(AttrKind::Modifier("const".into())),
                        vec![],
                        kw,
                    )?);
                }
            }
            let attrs = self.attrs(modifiers, declarator.start_byte())?;
            let mut children = vec![attrs];
            if let Some(name) = declarator.child_by_field_name("name") {
                children.push(self.binding(name)?);
            }
            let value = declarator.child_by_field_name("value");
            let has_init = value.is_some();
            if let Some(value) = value {
                children.push(self.expr(value)?);
            }
            let span_node = if named(node).len() == 1 { node } else { declarator };
            out.push(self.push(
                NodeKind::Decl(DeclKind::Var {
                    has_type: false,
                    has_init,
                }),
                children,
                span_node,
            )?);
        }
        Ok(out)
    }

    fn export(&mut self, node: Node<'_>) -> LResult<Vec<NodeId>> {
        let Some(decl) = node.child_by_field_name("declaration") else {
            let mut children = Vec::new();
            for child in named(node) {
                children.push(self.any(child)?);
            }
            let stmt = self.push(
                NodeKind::Stmt(StmtKind::Other("export_statement".into())),
                children,
                node,
            )?;
            return Ok(vec![stmt]);
        };
        let mut extra = Vec::new();
        for child in named(node) {
            if child.kind() == "decorator" {
                extra.push(self.decorator(child)?);
            }
        }
        if let Some(kw) = node.child(0) {
            extra.push(self.push(NodeKind::Attr(AttrKind::Modifier("export".into())), vec![], kw)?);
        }
        match decl.kind() {
            "lexical_declaration" | "variable_declaration" => self.var_declarations(decl, extra),
            "function_declaration" | "generator_function_declaration" => {
                Ok(vec![self.function(decl, extra)?])
            }
            "class_declaration" => Ok(vec![self.class(decl, extra)?]),
            _ => self.statement(decl),
        }
    }

    fn decorator(&mut self, node: Node<'_>) -> LResult<NodeId> {
        let mut children = Vec::new();
        if let Some(inner) = named(node).into_iter().next() {
            children.push(self.expr(inner)?);
        }
        self.push(NodeKind::Attr(AttrKind::Decorator), children, node)
    }

    /// Anonymous keyword children (`async`, `static`, ...) as modifiers.
    fn keyword_modifiers(&mut self, node: Node<'_>, into: &mut Vec<NodeId>) -> LResult<()> {
        let mut cursor = node.walk();
        let keywords: Vec<Node<'_>> = node
            .children(&mut cursor)
            .filter(|c| !c.is_named() && matches!(c.kind(), "async" | "static" | "get" | "set"))
            .collect();
        for kw in keywords {
            let name = kw.kind().to_string();
            into.push(self.push(NodeKind::Attr(AttrKind::Modifier(name)), vec![], kw)?);
        }
        Ok(())
    }

    fn function(&mut self, node: Node<'_>, mut modifiers: Vec<NodeId>) -> LResult<NodeId> {
        for child in named(node) {
            if child.kind() == "decorator" {
                modifiers.push(self.decorator(child)?);
            }
        }
        self.keyword_modifiers(node, &mut modifiers)?;
        let attrs = self.attrs(modifiers, node.start_byte())?;
        let name = match node.child_by_field_name("name") {
            Some(name) => self.ident(name)?,
            None => self.synthetic_ident("anonymous", node.start_byte())?,
        };
        let params = match node.child_by_field_name("parameters") {
            Some(p) => self.params(p)?,
            None => self.empty_list(ListKind::Params, node.start_byte())?,
        };
        let body = match node.child_by_field_name("body") {
            Some(b) => self.block(b)?,
            None => {
                let list = self.empty_list(ListKind::Block, node.end_byte())?;
                self.push(NodeKind::Stmt(StmtKind::Block), vec![list], node)?
            }
        };
        self.push(
            NodeKind::Decl(DeclKind::Function),
            vec![attrs, name, params, body],
            node,
        )
    }

    fn class(&mut self, node: Node<'_>, mut modifiers: Vec<NodeId>) -> LResult<NodeId> {
        for child in named(node) {
            match child.kind() {
                "decorator" => modifiers.push(self.decorator(child)?),
                "class_heritage" => {
                    for parent in named(child) {
                        let value = self.expr(parent)?;
                        let extends = self.push(NodeKind::Attr(AttrKind::Extends), vec![value], parent)?;
                        modifiers.push(extends);
                    }
                }
                _ => {}
            }
        }
        let attrs = self.attrs(modifiers, node.start_byte())?;
        let name = match node.child_by_field_name("name") {
            Some(name) => self.ident(name)?,
            None => self.synthetic_ident("anonymous", node.start_byte())?,
        };
        let mut members = Vec::new();
        let body = node.child_by_field_name("body");
        if let Some(body) = body {
            for member in named(body) {
                let lowered = match member.kind() {
                    "method_definition" => self.function(member, Vec::new())?,
                    "field_definition" if self.is_ellipsis_field(member) => {
                        self.marker(Marker::Ellipsis, member)?
                    }
                    "field_definition" => self.field(member)?,
                    _ => {
                        let mut children = Vec::new();
                        for child in named(member) {
                            children.push(self.any(child)?);
                        }
                        self.push(
                            NodeKind::Stmt(StmtKind::Other(member.kind().to_string())),
                            children,
                            member,
                        )?
                    }
                };
                members.push(lowered);
            }
        }
        let members = match body {
            Some(body) => self.interior_list(ListKind::Block, members, body)?,
            None => self.empty_list(ListKind::Block, node.end_byte())?,
        };
        self.push(NodeKind::Decl(DeclKind::Class), vec![attrs, name, members], node)
    }

    /// `...` among class members parses as a bare field.
    fn is_ellipsis_field(&self, node: Node<'_>) -> bool {
        node.child_by_field_name("value").is_none()
            && node
                .child_by_field_name("property")
                .is_some_and(|p| self.is_placeholder(p, ELLIPSIS))
    }

    fn field(&mut self, node: Node<'_>) -> LResult<NodeId> {
        let mut modifiers = Vec::new();
        for child in named(node) {
            if child.kind() == "decorator" {
                modifiers.push(self.decorator(child)?);
            }
        }
        self.keyword_modifiers(node, &mut modifiers)?;
        let attrs = self.attrs(modifiers, node.start_byte())?;
        let mut children = vec![attrs];
        match node.child_by_field_name("property") {
            Some(prop) => children.push(self.ident(prop)?),
            None => children.push(self.synthetic_ident("field", node.start_byte())?),
        }
        let value = node.child_by_field_name("value");
        let has_init = value.is_some();
        if let Some(value) = value {
            children.push(self.expr(value)?);
        }
        self.push(
            NodeKind::Decl(DeclKind::Var {
                has_type: false,
                has_init,
            }),
            children,
            node,
        )
    }

    fn synthetic_ident(&mut self, name: &str, at: usize) -> LResult<NodeId> {
        let span = self.span(at, at);
        Ok(self
            .b
            .leaf(NodeKind::Expr(ExprKind::Ident(name.to_string())), span)?)
    }

    fn marker(&mut self, marker: Marker, node: Node<'_>) -> LResult<NodeId> {
        self.push(NodeKind::Marker(marker), vec![], node)
    }

    fn ident(&mut self, node: Node<'_>) -> LResult<NodeId> {
        let text = self.text(node);
        let name = match text.strip_prefix(VARIADIC) {
            Some(rest) if self.pattern => format!("$...{rest}"),
            _ => text.to_string(),
        };
        self.push(NodeKind::Expr(ExprKind::Ident(name)), vec![], node)
    }

    fn params(&mut self, node: Node<'_>) -> LResult<NodeId> {
        let mut params = Vec::new();
        for p in named(node) {
            let lowered = match p.kind() {
                "identifier" if self.is_placeholder(p, ELLIPSIS) => {
                    let dots = self.marker(Marker::Ellipsis, p)?;
                    self.push(
                        NodeKind::Param(ParamKind::Plain {
                            has_type: false,
                            has_default: false,
                        }),
                        vec![dots],
                        p,
                    )?
                }
                "assignment_pattern" => {
                    let mut children = Vec::new();
                    if let Some(left) = p.child_by_field_name("left") {
                        children.push(self.binding(left)?);
                    }
                    if let Some(right) = p.child_by_field_name("right") {
                        children.push(self.expr(right)?);
                    }
                    self.push(
                        NodeKind::Param(ParamKind::Plain {
                            has_type: false,
                            has_default: true,
                        }),
                        children,
                        p,
                    )?
                }
                "rest_pattern" => {
                    let inner = match named(p).into_iter().next() {
                        Some(inner) => self.binding(inner)?,
                        None => self.synthetic_ident("rest", p.end_byte())?,
                    };
                    self.push(NodeKind::Param(ParamKind::Rest), vec![inner], p)?
                }
                _ => {
                    let binding = self.binding(p)?;
                    self.push(
                        NodeKind::Param(ParamKind::Plain {
                            has_type: false,
                            has_default: false,
                        }),
                        vec![binding],
                        p,
                    )?
                }
            };
            params.push(lowered);
        }
        if node.kind() == "formal_parameters" {
            self.interior_list(ListKind::Params, params, node)
        } else {
            let span = self.span(node.start_byte(), node.end_byte());
            Ok(self.b.push(NodeKind::List(ListKind::Params), params, span)?)
        }
    }

    /// Binding position: identifiers, destructuring patterns, or any
    /// assignable expression.
    fn binding(&mut self, node: Node<'_>) -> LResult<NodeId> {
        match node.kind() {
            "array_pattern" => {
                let mut items = Vec::new();
                for child in named(node) {
                    items.push(self.pattern_element(child)?);
                }
                let list = self.interior_list(ListKind::Elements, items, node)?;
                self.push(NodeKind::Pattern(PatKind::Array), vec![list], node)
            }
            "object_pattern" => {
                let mut items = Vec::new();
                for child in named(node) {
                    let item = match child.kind() {
                        "pair_pattern" => {
                            let mut kv = Vec::new();
                            if let Some(key) = child.child_by_field_name("key") {
                                kv.push(self.property_key(key)?);
                            }
                            if let Some(value) = child.child_by_field_name("value") {
                                kv.push(self.binding(value)?);
                            }
                            self.push(NodeKind::Pattern(PatKind::Pair), kv, child)?
                        }
                        "shorthand_property_identifier_pattern" if self.is_placeholder(child, ELLIPSIS) => {
                            self.marker(Marker::Ellipsis, child)?
                        }
                        "shorthand_property_identifier_pattern" => self.ident(child)?,
                        "rest_pattern" => self.pattern_element(child)?,
                        _ => self.expr(child)?,
                    };
                    items.push(item);
                }
                let list = self.interior_list(ListKind::Entries, items, node)?;
                self.push(NodeKind::Pattern(PatKind::Object), vec![list], node)
            }
            "rest_pattern" => self.pattern_element(node),
            _ => self.expr(node),
        }
    }

    fn pattern_element(&mut self, node: Node<'_>) -> LResult<NodeId> {
        match node.kind() {
            "rest_pattern" => {
                let inner = match named(node).into_iter().next() {
                    Some(inner) => self.binding(inner)?,
                    None => self.synthetic_ident("rest", node.end_byte())?,
                };
                self.push(NodeKind::Pattern(PatKind::Rest), vec![inner], node)
            }
            "assignment_pattern" => {
                let mut children = Vec::new();
                if let Some(left) = node.child_by_field_name("left") {
                    children.push(self.binding(left)?);
                }
                if let Some(right) = node.child_by_field_name("right") {
                    children.push(self.expr(right)?);
                }
                self.push(NodeKind::Expr(ExprKind::Assign(None)), children, node)
            }
            _ => self.binding(node),
        }
    }

    fn property_key(&mut self, node: Node<'_>) -> LResult<NodeId> {
        match node.kind() {
            "property_identifier" | "identifier" | "private_property_identifier" => self.ident(node),
            _ => self.expr(node),
        }
    }

    fn args(&mut self, node: Node<'_>) -> LResult<NodeId> {
        let mut args = Vec::new();
        for a in named(node) {
            let lowered = if a.kind() == "spread_element" {
                let inner = match named(a).into_iter().next() {
                    Some(inner) => self.expr(inner)?,
                    None => self.synthetic_ident("spread", a.end_byte())?,
                };
                self.push(NodeKind::Arg(ArgKind::Spread), vec![inner], a)?
            } else if self.is_placeholder(a, ELLIPSIS) {
                let dots = self.marker(Marker::Ellipsis, a)?;
                self.push(NodeKind::Arg(ArgKind::Positional), vec![dots], a)?
            } else {
                let value = self.expr(a)?;
                self.push(NodeKind::Arg(ArgKind::Positional), vec![value], a)?
            };
            args.push(lowered);
        }
        self.interior_list(ListKind::Args, args, node)
    }

    fn spread(&mut self, node: Node<'_>) -> LResult<NodeId> {
        let mut children = Vec::new();
        for inner in named(node) {
            children.push(self.expr(inner)?);
        }
        self.push(
            NodeKind::Expr(ExprKind::Other("spread".into())),
            children,
            node,
        )
    }

    fn literal(&mut self, lit: Literal, node: Node<'_>) -> LResult<NodeId> {
        self.push(NodeKind::Expr(ExprKind::Literal(lit)), vec![], node)
    }

    fn expr(&mut self, node: Node<'_>) -> LResult<NodeId> {
        match node.kind() {
            "identifier" | "property_identifier" | "shorthand_property_identifier"
            | "private_property_identifier" | "this" | "super" => {
                if self.is_placeholder(node, ELLIPSIS) {
                    return self.marker(Marker::Ellipsis, node);
                }
                self.ident(node)
            }
            "number" => {
                let raw = self.text(node).to_string();
                let lower = raw.to_ascii_lowercase();
                let is_float = !lower.starts_with("0x")
                    && !lower.ends_with('n')
                    && (lower.contains('.') || lower.contains('e'));
                let lit = if is_float {
                    Literal::Float(raw)
                } else {
                    Literal::Int(raw)
                };
                self.literal(lit, node)
            }
            "string" => {
                let raw = self.text(node).to_string();
                let inner = raw
                    .get(1..raw.len().saturating_sub(1))
                    .unwrap_or_default();
                let value = unescape(inner);
                self.literal(Literal::Str { raw, value }, node)
            }
            "true" => self.literal(Literal::Bool(true), node),
            "false" => self.literal(Literal::Bool(false), node),
            "null" => self.literal(Literal::Null, node),
            "parenthesized_expression" => match named(node).into_iter().next() {
                Some(inner) => self.expr(inner),
                None => self.push(NodeKind::Expr(ExprKind::Other("empty".into())), vec![], node),
            },
            "call_expression" => self.call(node),
            "new_expression" => {
                let callee = match node.child_by_field_name("constructor") {
                    Some(c) => self.expr(c)?,
                    None => self.synthetic_ident("anonymous", node.start_byte())?,
                };
                let args = match node.child_by_field_name("arguments") {
                    Some(a) => self.args(a)?,
                    None => self.empty_list(ListKind::Args, node.end_byte())?,
                };
                self.push(NodeKind::Expr(ExprKind::New), vec![callee, args], node)
            }
            "member_expression" => self.pair_fields(node, "object", "property", ExprKind::Member),
            "subscript_expression" => self.pair_fields(node, "object", "index", ExprKind::Index),
            "binary_expression" => {
                let op = node
                    .child_by_field_name("operator")
                    .and_then(|o| BinOp::from_symbol(o.kind()));
                match op {
                    Some(op) => self.pair_fields(node, "left", "right", ExprKind::Binary(op)),
                    None => self.other(node),
                }
            }
            "unary_expression" => {
                let op = node
                    .child_by_field_name("operator")
                    .and_then(|o| UnOp::from_prefix(o.kind()));
                match (op, node.child_by_field_name("argument")) {
                    (Some(op), Some(arg)) => {
                        let operand = self.expr(arg)?;
                        self.push(NodeKind::Expr(ExprKind::Unary(op)), vec![operand], node)
                    }
                    _ => self.other(node),
                }
            }
            "update_expression" => {
                let (Some(op), Some(arg)) = (
                    node.child_by_field_name("operator"),
                    node.child_by_field_name("argument"),
                ) else {
                    return self.other(node);
                };
                let prefix = op.start_byte() < arg.start_byte();
                let op = match (op.kind(), prefix) {
                    ("++", true) => UnOp::PreInc,
                    ("--", true) => UnOp::PreDec,
                    ("++", false) => UnOp::PostInc,
                    _ => UnOp::PostDec,
                };
                let operand = self.expr(arg)?;
                self.push(NodeKind::Expr(ExprKind::Unary(op)), vec![operand], node)
            }
            "await_expression" => match named(node).into_iter().next() {
                Some(arg) => {
                    let operand = self.expr(arg)?;
                    self.push(NodeKind::Expr(ExprKind::Unary(UnOp::Await)), vec![operand], node)
                }
                None => self.other(node),
            },
            "assignment_expression" => {
                self.assignment(node, None)
            }
            "augmented_assignment_expression" => {
                let op = node
                    .child_by_field_name("operator")
                    .and_then(|o| o.kind().strip_suffix('='))
                    .and_then(BinOp::from_symbol);
                match op {
                    Some(op) => self.assignment(node, Some(op)),
                    None => self.other(node),
                }
            }
            "ternary_expression" => {
                let mut children = Vec::new();
                for field in ["condition", "consequence", "alternative"] {
                    if let Some(child) = node.child_by_field_name(field) {
                        children.push(self.expr(child)?);
                    }
                }
                if children.len() != 3 {
                    return self.other(node);
                }
                self.push(NodeKind::Expr(ExprKind::Conditional), children, node)
            }
            "arrow_function" | "function" | "function_expression" | "generator_function" => {
                self.lambda(node)
            }
            "array" => {
                let mut items = Vec::new();
                for child in named(node) {
                    let item = if child.kind() == "spread_element" {
                        self.spread(child)?
                    } else {
                        self.expr(child)?
                    };
                    items.push(item);
                }
                let list = self.interior_list(ListKind::Elements, items, node)?;
                self.push(NodeKind::Expr(ExprKind::Array), vec![list], node)
            }
            "object" => {
                let mut entries = Vec::new();
                for child in named(node) {
                    let entry = match child.kind() {
                        "pair" => {
                            let mut kv = Vec::new();
                            if let Some(key) = child.child_by_field_name("key") {
                                kv.push(self.property_key(key)?);
                            }
                            if let Some(value) = child.child_by_field_name("value") {
                                kv.push(self.expr(value)?);
                            }
                            self.push(NodeKind::Expr(ExprKind::Pair), kv, child)?
                        }
                        "spread_element" => self.spread(child)?,
                        _ => self.expr(child)?,
                    };
                    entries.push(entry);
                }
                let list = self.interior_list(ListKind::Entries, entries, node)?;
                self.push(NodeKind::Expr(ExprKind::Object), vec![list], node)
            }
            "array_pattern" | "object_pattern" | "rest_pattern" => self.binding(node),
            _ => self.other(node),
        }
    }

    fn other(&mut self, node: Node<'_>) -> LResult<NodeId> {
        let mut children = Vec::new();
        for child in named(node) {
            children.push(self.any(child)?);
        }
        self.push(
            NodeKind::Expr(ExprKind::Other(node.kind().to_string())),
            children,
            node,
        )
    }

    fn pair_fields(&mut self, node: Node<'_>, a: &str, b: &str, kind: ExprKind) -> LResult<NodeId> {
        let (Some(x), Some(y)) = (node.child_by_field_name(a), node.child_by_field_name(b)) else {
            return self.other(node);
        };
        let x = self.expr(x)?;
        let y = self.expr(y)?;
        self.push(NodeKind::Expr(kind), vec![x, y], node)
    }

    fn assignment(&mut self, node: Node<'_>, op: Option<BinOp>) -> LResult<NodeId> {
        let (Some(left), Some(right)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("right"),
        ) else {
            return self.other(node);
        };
        let target = self.binding(left)?;
        let value = self.expr(right)?;
        self.push(NodeKind::Expr(ExprKind::Assign(op)), vec![target, value], node)
    }

    fn call(&mut self, node: Node<'_>) -> LResult<NodeId> {
        let callee = node.child_by_field_name("function");
        let args = node.child_by_field_name("arguments");
        if let (Some(callee), Some(args)) = (callee, args) {
            if self.is_placeholder(callee, DEEP) {
                if let [inner] = named(args).as_slice() {
                    let inner = self.expr(*inner)?;
                    return self.push(NodeKind::Marker(Marker::DeepEllipsis), vec![inner], node);
                }
            }
            if args.kind() == "arguments" {
                let callee = self.expr(callee)?;
                let args = self.args(args)?;
                return self.push(NodeKind::Expr(ExprKind::Call), vec![callee, args], node);
            }
        }
        self.other(node)
    }

    fn lambda(&mut self, node: Node<'_>) -> LResult<NodeId> {
        let params = if let Some(p) = node.child_by_field_name("parameters") {
            self.params(p)?
        } else if let Some(p) = node.child_by_field_name("parameter") {
            let binding = self.binding(p)?;
            let param = self.push(
                NodeKind::Param(ParamKind::Plain {
                    has_type: false,
                    has_default: false,
                }),
                vec![binding],
                p,
            )?;
            let span = self.span(p.start_byte(), p.end_byte());
            self.b.push(NodeKind::List(ListKind::Params), vec![param], span)?
        } else {
            self.empty_list(ListKind::Params, node.start_byte())?
        };
        let body = match node.child_by_field_name("body") {
            Some(b) if b.kind() == "statement_block" => self.block(b)?,
            Some(b) => self.expr(b)?,
            None => {
                let list = self.empty_list(ListKind::Block, node.end_byte())?;
                self.push(NodeKind::Stmt(StmtKind::Block), vec![list], node)?
            }
        };
        self.push(NodeKind::Expr(ExprKind::Lambda), vec![params, body], node)
    }
}
