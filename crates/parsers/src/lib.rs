//! Language front ends lowering source text into the generic tree.
//!
//! Every front end parses programs and patterns with the same grammar, so
//! pattern trees and target trees always share one shape.

use anyhow::{Context, Result};
use ir::{Tree, TreeError};
use serde::{Deserialize, Serialize};
use std::{fmt, fs, path::Path, str::FromStr};
use thiserror::Error;
use tracing::debug;

pub mod languages;
pub use languages::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Generic,
    JavaScript,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::Generic, Language::JavaScript];

    pub fn as_str(self) -> &'static str {
        match self {
            Language::Generic => "generic",
            Language::JavaScript => "javascript",
        }
    }

    /// Detects the language from the file extension.
    ///
    /// # Example
    /// ```
    /// use parsers::Language;
    /// assert_eq!(Language::from_path(std::path::Path::new("app.mjs")), Some(Language::JavaScript));
    /// ```
    pub fn from_path(path: &Path) -> Option<Language> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        let detected = match ext.as_str() {
            "gen" => Some(Language::Generic),
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            _ => None,
        };
        match detected {
            Some(lang) => debug!(file = %path.display(), language = lang.as_str(), "Language detected"),
            None => debug!(file = %path.display(), "Unsupported file type"),
        }
        detected
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown language `{0}`")]
pub struct UnknownLanguage(pub String);

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "generic" | "gen" => Ok(Language::Generic),
            "javascript" | "js" => Ok(Language::JavaScript),
            other => Err(UnknownLanguage(other.to_string())),
        }
    }
}

/// Source text rejected by a front end. Lines and columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{line}:{column}: {message}")]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

impl From<TreeError> for SyntaxError {
    fn from(err: TreeError) -> Self {
        SyntaxError::new(format!("malformed tree: {err}"), 1, 1)
    }
}

/// A concrete-syntax front end.
pub trait Frontend: Send + Sync {
    fn language(&self) -> Language;

    /// Parses a complete program. Pattern-only syntax is rejected.
    fn parse_program(&self, path: &str, source: &str) -> Result<Tree, SyntaxError>;

    /// Parses a pattern fragment, accepting ellipses and metavariables.
    fn parse_pattern(&self, source: &str) -> Result<Tree, SyntaxError>;
}

static GENERIC: GenericFrontend = GenericFrontend;
static JAVASCRIPT: JavaScriptFrontend = JavaScriptFrontend;

pub fn frontend(lang: Language) -> &'static dyn Frontend {
    match lang {
        Language::Generic => &GENERIC,
        Language::JavaScript => &JAVASCRIPT,
    }
}

/// Parses in-memory source with the front end of `lang`.
pub fn parse_source(lang: Language, path: &str, source: &str) -> Result<Tree, SyntaxError> {
    frontend(lang).parse_program(path, source)
}

/// Reads a file and produces its generic tree.
///
/// Returns `Ok(None)` when the language cannot be detected. Syntax errors
/// are reported as errors with the file path attached.
///
/// # Example
/// ```
/// use parsers::parse_file;
/// let path = std::env::temp_dir().join("doc_example.gen");
/// std::fs::write(&path, "let x = 1;").unwrap();
/// let tree = parse_file(&path, None).unwrap().unwrap();
/// assert_eq!(tree.language(), "generic");
/// ```
pub fn parse_file(path: &Path, lang_override: Option<Language>) -> Result<Option<Tree>> {
    let Some(lang) = lang_override.or_else(|| Language::from_path(path)) else {
        return Ok(None);
    };
    debug!(file = %path.display(), language = %lang, "Parsing file");
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    let display = path.to_string_lossy();
    let tree = parse_source(lang, &display, &content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    debug!(file = %path.display(), nodes = tree.len(), "Parsed file");
    Ok(Some(tree))
}
