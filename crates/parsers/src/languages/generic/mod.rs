//! Front end for the built-in C-family grammar.
//!
//! The grammar is small on purpose: enough statements and expressions to
//! write realistic rules and fixtures without pulling a grammar crate in.

mod lexer;
mod parser;

use ir::{LineIndex, Tree, TreeBuilder};
use tracing::debug;

use crate::{Frontend, Language, SyntaxError};

pub struct GenericFrontend;

fn parse(path: &str, source: &str, pattern: bool) -> Result<Tree, SyntaxError> {
    let lines = LineIndex::new(source);
    let tokens = lexer::Lexer::new(source, pattern, &lines).tokenize()?;
    debug!(file = path, tokens = tokens.len(), pattern, "Tokenized generic source");
    let builder = TreeBuilder::new(path, Language::Generic.as_str(), source);
    parser::Parser::new(tokens, pattern, &lines, builder).parse()
}

impl Frontend for GenericFrontend {
    fn language(&self) -> Language {
        Language::Generic
    }

    fn parse_program(&self, path: &str, source: &str) -> Result<Tree, SyntaxError> {
        parse(path, source, false)
    }

    fn parse_pattern(&self, source: &str) -> Result<Tree, SyntaxError> {
        parse("<pattern>", source, true)
    }
}

pub fn parse_generic(path: &str, source: &str) -> Result<Tree, SyntaxError> {
    parse(path, source, false)
}
