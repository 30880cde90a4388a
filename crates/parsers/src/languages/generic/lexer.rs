//! Tokenizer for the generic C-family grammar.
//!
//! Comments and whitespace are trivia and never reach the parser. Pattern
//! mode additionally recognizes `<...`, `...>` and `$`-prefixed names.

use crate::SyntaxError;
use ir::LineIndex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tok {
    Ident(String),
    Int(String),
    Float(String),
    Str { raw: String, value: String },
    Punct(&'static str),
    /// `...`
    Dots,
    /// `<...`
    DeepOpen,
    /// `...>`
    DeepClose,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub tok: Tok,
    pub start: usize,
    pub end: usize,
}

// longest first so that maximal munch falls out of a linear scan
const PUNCTS: &[&str] = &[
    ">>>=", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&", "||", "??", "==", "!=", "<=", ">=",
    "<<", ">>", "**", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "=>", "++", "--", "+", "-",
    "*", "/", "%", "=", "<", ">", "!", "~", "&", "|", "^", "?", ":", ";", ",", ".", "(", ")",
    "[", "]", "{", "}", "@",
];

pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    pattern: bool,
    lines: &'a LineIndex,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str, pattern: bool, lines: &'a LineIndex) -> Self {
        Self {
            src,
            pos: 0,
            pattern,
            lines,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, SyntaxError> {
        let mut out = Vec::new();
        loop {
            self.skip_trivia()?;
            let start = self.pos;
            let Some(ch) = self.peek_char() else {
                out.push(Token {
                    tok: Tok::Eof,
                    start,
                    end: start,
                });
                return Ok(out);
            };
            let tok = if ch.is_ascii_digit() {
                self.number()
            } else if ch == '"' || ch == '\'' {
                self.string(ch)?
            } else if is_ident_start(ch) {
                Tok::Ident(self.take_while(is_ident_continue).to_string())
            } else if ch == '$' {
                self.metavariable()?
            } else if self.pattern && self.rest().starts_with("<...") {
                self.pos += 4;
                Tok::DeepOpen
            } else if self.pattern && self.rest().starts_with("...>") {
                self.pos += 4;
                Tok::DeepClose
            } else if self.rest().starts_with("...") {
                self.pos += 3;
                Tok::Dots
            } else if let Some(p) = PUNCTS.iter().find(|p| self.rest().starts_with(**p)) {
                self.pos += p.len();
                Tok::Punct(p)
            } else {
                return Err(self.error(start, format!("unexpected character `{ch}`")));
            };
            out.push(Token {
                tok,
                start,
                end: self.pos,
            });
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn take_while(&mut self, pred: fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(ch) = self.peek_char() {
            if !pred(ch) {
                break;
            }
            self.pos += ch.len_utf8();
        }
        &self.src[start..self.pos]
    }

    fn error(&self, offset: usize, message: String) -> SyntaxError {
        let pos = self.lines.position(offset);
        SyntaxError::new(message, pos.line, pos.column)
    }

    fn skip_trivia(&mut self) -> Result<(), SyntaxError> {
        loop {
            self.take_while(char::is_whitespace);
            if self.rest().starts_with("//") {
                self.take_while(|c| c != '\n');
            } else if self.rest().starts_with("/*") {
                let start = self.pos;
                match self.rest()[2..].find("*/") {
                    Some(end) => self.pos += end + 4,
                    None => {
                        return Err(self.error(start, "unterminated block comment".into()));
                    }
                }
            } else {
                return Ok(());
            }
        }
    }

    fn number(&mut self) -> Tok {
        let start = self.pos;
        let rest = self.rest().as_bytes();
        if rest.first() == Some(&b'0')
            && matches!(rest.get(1), Some(b'x' | b'X' | b'o' | b'O' | b'b' | b'B'))
        {
            self.pos += 2;
            self.take_while(|c| c.is_ascii_hexdigit() || c == '_');
            return Tok::Int(self.src[start..self.pos].to_string());
        }
        self.take_while(|c| c.is_ascii_digit() || c == '_');
        let mut float = false;
        let bytes = self.rest().as_bytes();
        if bytes.first() == Some(&b'.') && bytes.get(1).is_some_and(u8::is_ascii_digit) {
            float = true;
            self.pos += 1;
            self.take_while(|c| c.is_ascii_digit() || c == '_');
        }
        let bytes = self.rest().as_bytes();
        if matches!(bytes.first(), Some(b'e') | Some(b'E')) {
            let sign = usize::from(matches!(bytes.get(1), Some(b'+') | Some(b'-')));
            if bytes.get(1 + sign).is_some_and(u8::is_ascii_digit) {
                float = true;
                self.pos += 1 + sign;
                self.take_while(|c| c.is_ascii_digit());
            }
        }
        let raw = self.src[start..self.pos].to_string();
        if float {
            Tok::Float(raw)
        } else {
            Tok::Int(raw)
        }
    }

    fn string(&mut self, quote: char) -> Result<Tok, SyntaxError> {
        let start = self.pos;
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(self.error(start, "unterminated string literal".into()));
                }
                Some(c) if c == quote => break,
                Some('\\') => {
                    let escaped = match self.bump() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some(other) => other,
                        None => {
                            return Err(self.error(start, "unterminated string literal".into()));
                        }
                    };
                    value.push(escaped);
                }
                Some(c) => value.push(c),
            }
        }
        Ok(Tok::Str {
            raw: self.src[start..self.pos].to_string(),
            value,
        })
    }

    fn metavariable(&mut self) -> Result<Tok, SyntaxError> {
        let start = self.pos;
        if !self.pattern {
            return Err(self.error(start, "metavariables are only allowed in patterns".into()));
        }
        self.pos += 1;
        if self.rest().starts_with("...") {
            self.pos += 3;
        }
        let name = self.take_while(is_ident_continue);
        if name.is_empty() {
            return Err(self.error(start, "expected a metavariable name after `$`".into()));
        }
        Ok(Tok::Ident(self.src[start..self.pos].to_string()))
    }
}

fn is_ident_start(ch: char) -> bool {
    ch == '_' || ch.is_alphabetic()
}

fn is_ident_continue(ch: char) -> bool {
    ch == '_' || ch.is_alphanumeric()
}
