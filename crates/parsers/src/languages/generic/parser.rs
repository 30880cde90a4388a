//! Recursive-descent parser lowering the generic grammar straight into the
//! generic tree.

use ir::{
    ArgKind, AttrKind, BinOp, DeclKind, ExprKind, LineIndex, ListKind, Literal, Marker, NodeId,
    NodeKind, ParamKind, Span, StmtKind, Tree, TreeBuilder, TypeKind, UnOp,
};

use super::lexer::{Tok, Token};
use crate::SyntaxError;

const KEYWORDS: &[&str] = &[
    "let", "var", "const", "fn", "class", "if", "else", "while", "for", "in", "return", "throw",
    "break", "continue", "new", "true", "false", "null", "await",
];

/// Deepest statement or expression nesting accepted before the parser
/// gives up instead of exhausting the stack.
const MAX_NESTING: usize = 100;

const MODIFIERS: &[&str] = &[
    "pub", "static", "async", "const", "export", "private", "public", "protected", "final",
    "readonly",
];

fn binary_op(tok: &Tok) -> Option<(BinOp, u8)> {
    let Tok::Punct(p) = tok else {
        return None;
    };
    let op = BinOp::from_symbol(p)?;
    let prec = match op {
        BinOp::Or | BinOp::Coalesce => 1,
        BinOp::And => 2,
        BinOp::BitOr => 3,
        BinOp::BitXor => 4,
        BinOp::BitAnd => 5,
        BinOp::Eq | BinOp::NotEq | BinOp::StrictEq | BinOp::StrictNotEq => 6,
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => 7,
        BinOp::Shl | BinOp::Shr | BinOp::UShr => 8,
        BinOp::Add | BinOp::Sub => 9,
        BinOp::Mul | BinOp::Div | BinOp::Rem => 10,
        BinOp::Pow => 11,
        BinOp::In | BinOp::InstanceOf => return None,
    };
    Some((op, prec))
}

fn compound_op(p: &str) -> Option<BinOp> {
    p.strip_suffix('=')
        .filter(|sym| !sym.is_empty() && !matches!(*sym, "=" | "!" | "<" | ">" | "==" | "!="))
        .and_then(BinOp::from_symbol)
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Ident(name) => format!("`{name}`"),
        Tok::Int(raw) | Tok::Float(raw) => format!("number `{raw}`"),
        Tok::Str { raw, .. } => format!("string {raw}"),
        Tok::Punct(p) => format!("`{p}`"),
        Tok::Dots => "`...`".into(),
        Tok::DeepOpen => "`<...`".into(),
        Tok::DeepClose => "`...>`".into(),
        Tok::Eof => "end of input".into(),
    }
}

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    last_end: usize,
    depth: usize,
    pattern: bool,
    lines: &'a LineIndex,
    b: TreeBuilder,
}

type PResult<T> = Result<T, SyntaxError>;

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, pattern: bool, lines: &'a LineIndex, b: TreeBuilder) -> Self {
        Self {
            tokens,
            pos: 0,
            last_end: 0,
            depth: 0,
            pattern,
            lines,
            b,
        }
    }

    pub fn parse(mut self) -> PResult<Tree> {
        let mut stmts = Vec::new();
        while !self.at_eof() {
            stmts.push(self.statement()?);
        }
        let end = self.b.source().len();
        let span = self.span(0, end);
        let root = self.b.push(NodeKind::List(ListKind::Program), stmts, span)?;
        Ok(self.b.finish(root)?)
    }

    // ---------------------------------------------------------------------
    // token cursor

    fn cur(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn peek(&self) -> &Tok {
        &self.cur().tok
    }

    fn peek_at(&self, n: usize) -> &Tok {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.pos + n).min(last)].tok
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), Tok::Eof)
    }

    fn at_punct(&self, p: &str) -> bool {
        matches!(self.peek(), Tok::Punct(q) if *q == p)
    }

    fn at_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Tok::Ident(name) if name == kw)
    }

    fn bump(&mut self) -> Token {
        let tok = self.cur().clone();
        if !matches!(tok.tok, Tok::Eof) {
            self.pos += 1;
        }
        self.last_end = tok.end;
        tok
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.at_punct(p) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> PResult<Token> {
        if self.at_punct(p) {
            Ok(self.bump())
        } else {
            Err(self.unexpected(&format!("`{p}`")))
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> PResult<Token> {
        if self.at_keyword(kw) {
            Ok(self.bump())
        } else {
            Err(self.unexpected(&format!("`{kw}`")))
        }
    }

    fn unexpected(&self, expected: &str) -> SyntaxError {
        let tok = self.cur();
        self.error_at(
            tok.start,
            format!("expected {expected}, found {}", describe(&tok.tok)),
        )
    }

    fn error_at(&self, offset: usize, message: String) -> SyntaxError {
        let pos = self.lines.position(offset);
        SyntaxError::new(message, pos.line, pos.column)
    }

    /// Runs `f` one nesting level deeper.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.depth >= MAX_NESTING {
            let at = self.cur().start;
            return Err(self.error_at(at, format!("nesting deeper than {MAX_NESTING} levels")));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Whether a `...` at the cursor stands alone before one of `closers`,
    /// as opposed to prefixing a spread or rest operand.
    fn dots_alone(&self, closers: &[&str]) -> bool {
        matches!(self.peek(), Tok::Dots)
            && matches!(self.peek_at(1), Tok::Punct(p) if *p == "," || closers.contains(p))
    }

    fn pattern_only(&self, what: &str) -> PResult<()> {
        if self.pattern {
            Ok(())
        } else {
            Err(self.error_at(
                self.cur().start,
                format!("{what} is only allowed in patterns"),
            ))
        }
    }

    // ---------------------------------------------------------------------
    // node construction

    fn span(&self, start: usize, end: usize) -> Span {
        Span::new(self.lines.position(start), self.lines.position(end))
    }

    fn node(&mut self, kind: NodeKind, children: Vec<NodeId>, start: usize) -> PResult<NodeId> {
        let span = self.span(start, self.last_end.max(start));
        Ok(self.b.push(kind, children, span)?)
    }

    fn leaf_from(&mut self, kind: NodeKind, tok: &Token) -> PResult<NodeId> {
        let span = self.span(tok.start, tok.end);
        Ok(self.b.leaf(kind, span)?)
    }

    fn list(&mut self, kind: ListKind, items: Vec<NodeId>, start: usize, end: usize) -> PResult<NodeId> {
        let span = self.span(start, end.max(start));
        Ok(self.b.push(NodeKind::List(kind), items, span)?)
    }

    fn ellipsis(&mut self) -> PResult<NodeId> {
        self.pattern_only("`...`")?;
        let tok = self.bump();
        self.leaf_from(NodeKind::Marker(Marker::Ellipsis), &tok)
    }

    fn ident(&mut self) -> PResult<NodeId> {
        match self.peek().clone() {
            Tok::Ident(name) if !KEYWORDS.contains(&name.as_str()) => {
                let tok = self.bump();
                self.leaf_from(NodeKind::Expr(ExprKind::Ident(name)), &tok)
            }
            _ => Err(self.unexpected("an identifier")),
        }
    }

    /// Member names may be keywords (`a.new`, `b.class`).
    fn property(&mut self) -> PResult<NodeId> {
        match self.peek().clone() {
            Tok::Ident(name) => {
                let tok = self.bump();
                self.leaf_from(NodeKind::Expr(ExprKind::Ident(name)), &tok)
            }
            _ => Err(self.unexpected("a property name")),
        }
    }

    // ---------------------------------------------------------------------
    // statements

    fn statement(&mut self) -> PResult<NodeId> {
        self.nested(Self::statement_body)
    }

    fn statement_body(&mut self) -> PResult<NodeId> {
        let start = self.cur().start;
        match self.peek().clone() {
            Tok::Punct("{") => self.block_statement(),
            Tok::Punct(";") => {
                self.bump();
                self.node(NodeKind::Stmt(StmtKind::Empty), vec![], start)
            }
            Tok::Punct("@") => self.declaration(),
            Tok::Dots => {
                let dots = self.ellipsis()?;
                self.eat_punct(";");
                self.node(NodeKind::Stmt(StmtKind::Expr), vec![dots], start)
            }
            Tok::Ident(word) => match word.as_str() {
                "if" => self.if_statement(),
                "while" => self.while_statement(),
                "for" => self.for_statement(),
                "return" => {
                    self.bump();
                    let value = if self.at_punct(";") || self.at_punct("}") || self.at_eof() {
                        None
                    } else {
                        Some(self.expr()?)
                    };
                    self.eat_punct(";");
                    let has_value = value.is_some();
                    self.node(
                        NodeKind::Stmt(StmtKind::Return { has_value }),
                        value.into_iter().collect(),
                        start,
                    )
                }
                "throw" => {
                    self.bump();
                    let value = self.expr()?;
                    self.eat_punct(";");
                    self.node(NodeKind::Stmt(StmtKind::Throw), vec![value], start)
                }
                "break" | "continue" => {
                    self.bump();
                    self.eat_punct(";");
                    let kind = if word == "break" {
                        StmtKind::Break
                    } else {
                        StmtKind::Continue
                    };
                    self.node(NodeKind::Stmt(kind), vec![], start)
                }
                "fn" if self.peek_at(1) == &Tok::Punct("(") => self.expression_statement(),
                "let" | "var" | "fn" | "class" => self.declaration(),
                _ if self.starts_declaration() => self.declaration(),
                _ => self.expression_statement(),
            },
            _ => self.expression_statement(),
        }
    }

    /// Modifiers (or a modifier metavariable) leading into a declaration.
    fn starts_declaration(&self) -> bool {
        let mut n = 0;
        loop {
            match self.peek_at(n) {
                Tok::Ident(w) if matches!(w.as_str(), "let" | "var" | "fn" | "class") => {
                    return n > 0 || w != "fn" || self.peek_at(n + 1) != &Tok::Punct("(");
                }
                Tok::Ident(w) if w == "const" => {
                    return matches!(self.peek_at(n + 1), Tok::Ident(_));
                }
                Tok::Ident(w) if MODIFIERS.contains(&w.as_str()) => n += 1,
                Tok::Ident(w) if self.pattern && w.starts_with('$') && n == 0 => {
                    let before_decl = matches!(self.peek_at(1), Tok::Ident(next)
                        if MODIFIERS.contains(&next.as_str())
                            || matches!(next.as_str(), "let" | "var" | "fn" | "class"));
                    if !before_decl {
                        return false;
                    }
                    n += 1;
                }
                _ => return false,
            }
        }
    }

    fn expression_statement(&mut self) -> PResult<NodeId> {
        let start = self.cur().start;
        let value = self.expr()?;
        self.eat_punct(";");
        self.node(NodeKind::Stmt(StmtKind::Expr), vec![value], start)
    }

    fn block_list(&mut self) -> PResult<NodeId> {
        let open = self.expect_punct("{")?;
        let mut stmts = Vec::new();
        while !self.at_punct("}") {
            if self.at_eof() {
                return Err(self.unexpected("`}`"));
            }
            stmts.push(self.statement()?);
        }
        let close = self.bump();
        self.list(ListKind::Block, stmts, open.end, close.start)
    }

    fn block_statement(&mut self) -> PResult<NodeId> {
        let start = self.cur().start;
        let list = self.block_list()?;
        self.node(NodeKind::Stmt(StmtKind::Block), vec![list], start)
    }

    fn paren_expr(&mut self) -> PResult<NodeId> {
        self.expect_punct("(")?;
        let cond = self.expr()?;
        self.expect_punct(")")?;
        Ok(cond)
    }

    fn if_statement(&mut self) -> PResult<NodeId> {
        let start = self.bump().start;
        let cond = self.paren_expr()?;
        let then = self.statement()?;
        let mut children = vec![cond, then];
        if self.at_keyword("else") {
            self.bump();
            children.push(self.statement()?);
        }
        let has_else = children.len() == 3;
        self.node(NodeKind::Stmt(StmtKind::If { has_else }), children, start)
    }

    fn while_statement(&mut self) -> PResult<NodeId> {
        let start = self.bump().start;
        let cond = self.paren_expr()?;
        let body = self.statement()?;
        self.node(NodeKind::Stmt(StmtKind::While), vec![cond, body], start)
    }

    fn for_statement(&mut self) -> PResult<NodeId> {
        let start = self.bump().start;
        let parens = self.eat_punct("(");
        let binding_start = self.cur().start;
        let binding = if matches!(self.peek(), Tok::Ident(w) if matches!(w.as_str(), "let" | "var" | "const"))
        {
            let kw = self.bump();
            let attrs = if kw.tok == Tok::Ident("const".into()) {
                let modifier =
                    self.leaf_from(NodeKind::Attr(AttrKind::Modifier("const".into())), &kw)?;
                self.list(ListKind::Attrs, vec![modifier], kw.start, kw.end)?
            } else {
                self.list(ListKind::Attrs, vec![], kw.start, kw.start)?
            };
            let name = self.ident()?;
            self.node(
                NodeKind::Decl(DeclKind::Var {
                    has_type: false,
                    has_init: false,
                }),
                vec![attrs, name],
                binding_start,
            )?
        } else {
            self.ident()?
        };
        self.expect_keyword("in")?;
        let iterable = self.expr()?;
        if parens {
            self.expect_punct(")")?;
        }
        let body = self.statement()?;
        self.node(
            NodeKind::Stmt(StmtKind::ForEach),
            vec![binding, iterable, body],
            start,
        )
    }

    // ---------------------------------------------------------------------
    // declarations

    fn declaration(&mut self) -> PResult<NodeId> {
        let start = self.cur().start;
        let mut attrs = Vec::new();
        loop {
            match self.peek().clone() {
                Tok::Punct("@") => {
                    let at = self.bump().start;
                    let target = self.postfix()?;
                    attrs.push(self.node(NodeKind::Attr(AttrKind::Decorator), vec![target], at)?);
                }
                Tok::Ident(w) if w == "const" && !self.const_is_modifier() => break,
                Tok::Ident(w)
                    if MODIFIERS.contains(&w.as_str())
                        || (self.pattern && w.starts_with('$')) =>
                {
                    let tok = self.bump();
                    attrs.push(self.leaf_from(NodeKind::Attr(AttrKind::Modifier(w)), &tok)?);
                }
                _ => break,
            }
        }
        let attrs_end = if attrs.is_empty() { start } else { self.last_end };
        match self.peek().clone() {
            Tok::Ident(w) if matches!(w.as_str(), "let" | "var" | "const") => {
                let kw = self.bump();
                let mut end = attrs_end;
                if w == "const" {
                    attrs.push(self.leaf_from(NodeKind::Attr(AttrKind::Modifier(w)), &kw)?);
                    end = kw.end;
                }
                let attrs = self.list(ListKind::Attrs, attrs, start, end)?;
                self.var_declaration(attrs, start)
            }
            Tok::Ident(w) if w == "fn" => {
                let attrs = self.list(ListKind::Attrs, attrs, start, attrs_end)?;
                self.bump();
                let name = self.ident()?;
                let params = self.params()?;
                let body = self.block_statement()?;
                self.node(
                    NodeKind::Decl(DeclKind::Function),
                    vec![attrs, name, params, body],
                    start,
                )
            }
            Tok::Ident(w) if w == "class" => {
                let attrs = self.list(ListKind::Attrs, attrs, start, attrs_end)?;
                self.bump();
                let name = self.ident()?;
                let members = self.block_list()?;
                self.node(
                    NodeKind::Decl(DeclKind::Class),
                    vec![attrs, name, members],
                    start,
                )
            }
            _ => Err(self.unexpected("`let`, `fn` or `class`")),
        }
    }

    /// `const fn` and `const class` carry a modifier; `const x` declares a
    /// variable.
    fn const_is_modifier(&self) -> bool {
        matches!(self.peek_at(1), Tok::Ident(next)
            if matches!(next.as_str(), "fn" | "class" | "let" | "var")
                || (MODIFIERS.contains(&next.as_str()) && next != "const"))
    }

    fn var_declaration(&mut self, attrs: NodeId, start: usize) -> PResult<NodeId> {
        let name = self.ident()?;
        let mut children = vec![attrs, name];
        let has_type = self.eat_punct(":");
        if has_type {
            children.push(self.type_expr()?);
        }
        let has_init = self.eat_punct("=");
        if has_init {
            children.push(self.expr()?);
        }
        self.eat_punct(";");
        self.node(
            NodeKind::Decl(DeclKind::Var { has_type, has_init }),
            children,
            start,
        )
    }

    fn params(&mut self) -> PResult<NodeId> {
        let open = self.expect_punct("(")?;
        let mut params = Vec::new();
        while !self.at_punct(")") {
            let start = self.cur().start;
            let param = if self.dots_alone(&[")"]) {
                let dots = self.ellipsis()?;
                self.node(
                    NodeKind::Param(ParamKind::Plain {
                        has_type: false,
                        has_default: false,
                    }),
                    vec![dots],
                    start,
                )?
            } else if matches!(self.peek(), Tok::Dots) {
                self.bump();
                let name = self.ident()?;
                self.node(NodeKind::Param(ParamKind::Rest), vec![name], start)?
            } else {
                let name = self.ident()?;
                let mut children = vec![name];
                let has_type = self.eat_punct(":");
                if has_type {
                    children.push(self.type_expr()?);
                }
                let has_default = self.eat_punct("=");
                if has_default {
                    children.push(self.expr()?);
                }
                self.node(
                    NodeKind::Param(ParamKind::Plain {
                        has_type,
                        has_default,
                    }),
                    children,
                    start,
                )?
            };
            params.push(param);
            if !self.eat_punct(",") {
                break;
            }
        }
        let close = self.expect_punct(")")?;
        self.list(ListKind::Params, params, open.end, close.start)
    }

    fn type_expr(&mut self) -> PResult<NodeId> {
        let start = self.cur().start;
        let Tok::Ident(name) = self.peek().clone() else {
            return Err(self.unexpected("a type"));
        };
        let tok = self.bump();
        let base = self.leaf_from(NodeKind::Type(TypeKind::Named(name)), &tok)?;
        if !self.at_punct("<") {
            return Ok(base);
        }
        let open = self.bump();
        let mut args = Vec::new();
        loop {
            args.push(self.type_expr()?);
            if !self.eat_punct(",") {
                break;
            }
        }
        let close_start = self.cur().start;
        self.close_angle()?;
        let list = self.list(ListKind::TypeArgs, args, open.end, close_start)?;
        self.node(NodeKind::Type(TypeKind::Generic), vec![base, list], start)
    }

    /// Consumes one `>`, splitting `>>` and `>>>` produced by maximal munch.
    fn close_angle(&mut self) -> PResult<()> {
        let idx = self.pos;
        let split = match self.peek().clone() {
            Tok::Punct(">") => {
                self.bump();
                return Ok(());
            }
            Tok::Punct(">>") => ">",
            Tok::Punct(">>>") => ">>",
            Tok::Punct(">=") => "=",
            Tok::Punct(">>=") => ">=",
            _ => return Err(self.unexpected("`>`")),
        };
        let tok = &mut self.tokens[idx];
        tok.start += 1;
        tok.tok = Tok::Punct(split);
        self.last_end = tok.start;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // expressions

    fn expr(&mut self) -> PResult<NodeId> {
        self.nested(Self::assignment)
    }

    fn assignment(&mut self) -> PResult<NodeId> {
        let start = self.cur().start;
        let target = self.conditional()?;
        let op = match self.peek() {
            Tok::Punct("=") => None,
            Tok::Punct(p) => match compound_op(p) {
                Some(op) => Some(op),
                None => return Ok(target),
            },
            _ => return Ok(target),
        };
        self.bump();
        let value = self.nested(Self::assignment)?;
        self.node(NodeKind::Expr(ExprKind::Assign(op)), vec![target, value], start)
    }

    fn conditional(&mut self) -> PResult<NodeId> {
        let start = self.cur().start;
        let cond = self.binary(1)?;
        if !self.eat_punct("?") {
            return Ok(cond);
        }
        let then = self.nested(Self::assignment)?;
        self.expect_punct(":")?;
        let otherwise = self.nested(Self::assignment)?;
        self.node(
            NodeKind::Expr(ExprKind::Conditional),
            vec![cond, then, otherwise],
            start,
        )
    }

    fn binary(&mut self, min_prec: u8) -> PResult<NodeId> {
        let start = self.cur().start;
        let mut lhs = self.unary()?;
        while let Some((op, prec)) = binary_op(self.peek()) {
            if prec < min_prec {
                break;
            }
            self.bump();
            let next = if op == BinOp::Pow { prec } else { prec + 1 };
            let rhs = self.nested(|p| p.binary(next))?;
            lhs = self.node(NodeKind::Expr(ExprKind::Binary(op)), vec![lhs, rhs], start)?;
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> PResult<NodeId> {
        let start = self.cur().start;
        let op = match self.peek() {
            Tok::Punct(p) => UnOp::from_prefix(p),
            Tok::Ident(w) if w == "await" => Some(UnOp::Await),
            _ => None,
        };
        match op {
            Some(op) => {
                self.bump();
                let operand = self.nested(Self::unary)?;
                self.node(NodeKind::Expr(ExprKind::Unary(op)), vec![operand], start)
            }
            None => self.postfix(),
        }
    }

    fn postfix(&mut self) -> PResult<NodeId> {
        let start = self.cur().start;
        let mut expr = self.primary()?;
        loop {
            if self.at_punct("(") {
                let args = self.args()?;
                expr = self.node(NodeKind::Expr(ExprKind::Call), vec![expr, args], start)?;
            } else if self.eat_punct(".") {
                let prop = self.property()?;
                expr = self.node(NodeKind::Expr(ExprKind::Member), vec![expr, prop], start)?;
            } else if self.eat_punct("[") {
                let index = self.expr()?;
                self.expect_punct("]")?;
                expr = self.node(NodeKind::Expr(ExprKind::Index), vec![expr, index], start)?;
            } else if self.at_punct("++") || self.at_punct("--") {
                let op = if self.at_punct("++") {
                    UnOp::PostInc
                } else {
                    UnOp::PostDec
                };
                self.bump();
                expr = self.node(NodeKind::Expr(ExprKind::Unary(op)), vec![expr], start)?;
            } else {
                return Ok(expr);
            }
        }
    }

    fn args(&mut self) -> PResult<NodeId> {
        let open = self.expect_punct("(")?;
        let mut args = Vec::new();
        while !self.at_punct(")") {
            let start = self.cur().start;
            let arg = if self.dots_alone(&[")"]) {
                let dots = self.ellipsis()?;
                self.node(NodeKind::Arg(ArgKind::Positional), vec![dots], start)?
            } else if matches!(self.peek(), Tok::Dots) {
                self.bump();
                let value = self.expr()?;
                self.node(NodeKind::Arg(ArgKind::Spread), vec![value], start)?
            } else if matches!(self.peek(), Tok::Ident(_)) && self.peek_at(1) == &Tok::Punct(":") {
                let name = self.ident()?;
                self.bump();
                let value = self.expr()?;
                self.node(NodeKind::Arg(ArgKind::Named), vec![name, value], start)?
            } else {
                let value = self.expr()?;
                self.node(NodeKind::Arg(ArgKind::Positional), vec![value], start)?
            };
            args.push(arg);
            if !self.eat_punct(",") {
                break;
            }
        }
        let close = self.expect_punct(")")?;
        self.list(ListKind::Args, args, open.end, close.start)
    }

    fn spread(&mut self) -> PResult<NodeId> {
        let start = self.bump().start;
        let value = self.expr()?;
        self.node(
            NodeKind::Expr(ExprKind::Other("spread".into())),
            vec![value],
            start,
        )
    }

    fn primary(&mut self) -> PResult<NodeId> {
        let start = self.cur().start;
        match self.peek().clone() {
            Tok::Ident(word) => match word.as_str() {
                "true" | "false" => {
                    let tok = self.bump();
                    self.leaf_from(
                        NodeKind::Expr(ExprKind::Literal(Literal::Bool(word == "true"))),
                        &tok,
                    )
                }
                "null" => {
                    let tok = self.bump();
                    self.leaf_from(NodeKind::Expr(ExprKind::Literal(Literal::Null)), &tok)
                }
                "fn" => self.lambda(),
                "new" => self.new_expr(),
                _ => self.ident(),
            },
            Tok::Int(raw) => {
                let tok = self.bump();
                self.leaf_from(NodeKind::Expr(ExprKind::Literal(Literal::Int(raw))), &tok)
            }
            Tok::Float(raw) => {
                let tok = self.bump();
                self.leaf_from(NodeKind::Expr(ExprKind::Literal(Literal::Float(raw))), &tok)
            }
            Tok::Str { raw, value } => {
                let tok = self.bump();
                self.leaf_from(
                    NodeKind::Expr(ExprKind::Literal(Literal::Str { raw, value })),
                    &tok,
                )
            }
            Tok::Punct("(") => self.paren_expr(),
            Tok::Punct("[") => {
                let open = self.bump();
                let mut items = Vec::new();
                while !self.at_punct("]") {
                    let item = if self.dots_alone(&["]"]) {
                        self.ellipsis()?
                    } else if matches!(self.peek(), Tok::Dots) {
                        self.spread()?
                    } else {
                        self.expr()?
                    };
                    items.push(item);
                    if !self.eat_punct(",") {
                        break;
                    }
                }
                let close = self.expect_punct("]")?;
                let list = self.list(ListKind::Elements, items, open.end, close.start)?;
                self.node(NodeKind::Expr(ExprKind::Array), vec![list], start)
            }
            Tok::Punct("{") => self.object(),
            Tok::Dots => self.ellipsis(),
            Tok::DeepOpen => {
                self.pattern_only("`<...`")?;
                self.bump();
                let inner = self.expr()?;
                if !matches!(self.peek(), Tok::DeepClose) {
                    return Err(self.unexpected("`...>`"));
                }
                self.bump();
                self.node(
                    NodeKind::Marker(Marker::DeepEllipsis),
                    vec![inner],
                    start,
                )
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn object(&mut self) -> PResult<NodeId> {
        let open = self.expect_punct("{")?;
        let mut entries = Vec::new();
        while !self.at_punct("}") {
            let start = self.cur().start;
            let entry = if self.dots_alone(&["}"]) {
                self.ellipsis()?
            } else if matches!(self.peek(), Tok::Dots) {
                self.spread()?
            } else if self.peek_at(1) == &Tok::Punct(":") {
                let key = match self.peek().clone() {
                    Tok::Ident(_) => self.ident()?,
                    Tok::Str { .. } | Tok::Int(_) => self.primary()?,
                    _ => return Err(self.unexpected("a property name")),
                };
                self.bump();
                let value = self.expr()?;
                self.node(NodeKind::Expr(ExprKind::Pair), vec![key, value], start)?
            } else {
                self.ident()?
            };
            entries.push(entry);
            if !self.eat_punct(",") {
                break;
            }
        }
        let close = self.expect_punct("}")?;
        let list = self.list(ListKind::Entries, entries, open.end, close.start)?;
        self.node(NodeKind::Expr(ExprKind::Object), vec![list], open.start)
    }

    fn lambda(&mut self) -> PResult<NodeId> {
        let start = self.bump().start;
        let params = self.params()?;
        let body = if self.eat_punct("=>") {
            self.expr()?
        } else {
            self.block_statement()?
        };
        self.node(NodeKind::Expr(ExprKind::Lambda), vec![params, body], start)
    }

    fn new_expr(&mut self) -> PResult<NodeId> {
        let start = self.bump().start;
        let mut callee = self.primary()?;
        while self.eat_punct(".") {
            let prop = self.property()?;
            callee = self.node(NodeKind::Expr(ExprKind::Member), vec![callee, prop], start)?;
        }
        let args = if self.at_punct("(") {
            self.args()?
        } else {
            let at = self.last_end;
            self.list(ListKind::Args, vec![], at, at)?
        };
        self.node(NodeKind::Expr(ExprKind::New), vec![callee, args], start)
    }
}
