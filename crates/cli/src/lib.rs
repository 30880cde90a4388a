//! Common utilities for the command line interface.
use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

pub mod args;
pub mod config;
pub mod output;
pub mod rules;
pub mod scan;

/// Default maximum size: 5 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// Exit status when a scan reports findings.
pub const EXIT_FINDINGS: u8 = 1;
/// Exit status for fatal errors and internal matcher errors.
pub const EXIT_ERROR: u8 = 2;

/// Converts a basic glob pattern to a regular expression.
///
/// # Example
///
/// ```
/// use structgrep::glob_to_regex;
/// let re = glob_to_regex("src/*.gen").unwrap();
/// assert!(re.is_match("src/main.gen"));
/// assert!(!re.is_match("src/nested/main.gen"));
/// ```
pub fn glob_to_regex(pat: &str) -> Result<Regex, regex::Error> {
    let mut regex = String::from("^");
    let mut chars = pat.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    regex.push_str(".*");
                } else {
                    regex.push_str("[^/]*");
                }
            }
            '?' => regex.push_str("[^/]"),
            '.' | '(' | ')' | '+' | '|' | '^' | '$' | '[' | ']' | '{' | '}' | '\\' => {
                regex.push('\\');
                regex.push(c);
            }
            _ => regex.push(c),
        }
    }
    regex.push('$');
    Regex::new(&regex)
}

/// Transforms a glob-style exclusion string into [`Regex`].
/// A trailing slash excludes everything below the directory.
///
/// # Example
///
/// ```
/// use structgrep::parse_exclude;
/// let re = parse_exclude("**/vendor/").unwrap();
/// assert!(re.is_match("repo/vendor/lib.gen"));
/// ```
pub fn parse_exclude(s: &str) -> Result<Regex, String> {
    let glob_str = if s.ends_with('/') {
        format!("{s}**")
    } else {
        s.to_string()
    };
    glob_to_regex(&glob_str).map_err(|e| e.to_string())
}

/// Default exclusion patterns.
pub fn default_excludes() -> Vec<Regex> {
    ["**/node_modules/**", "**/.git/**"]
        .iter()
        .filter_map(|p| parse_exclude(p).ok())
        .collect()
}

/// Indicates whether a path should be omitted according to patterns or size.
/// Separators are normalised to support Windows and Unix.
///
/// # Example
///
/// ```
/// use structgrep::{is_excluded, parse_exclude};
/// use std::path::Path;
/// let patterns = vec![parse_exclude("build/**").unwrap()];
/// assert!(is_excluded(Path::new("build/out.gen"), &patterns, 0));
/// ```
pub fn is_excluded(path: &Path, patterns: &[Regex], max_file_size: u64) -> bool {
    let path_str = path.to_string_lossy().replace('\\', "/");
    if patterns.iter().any(|re| re.is_match(&path_str)) {
        return true;
    }
    if max_file_size > 0 {
        if let Ok(meta) = fs::metadata(path) {
            if meta.is_file() && meta.len() > max_file_size {
                return true;
            }
        }
    }
    false
}

/// Installs the stderr subscriber. `RUST_LOG` wins over the flags when set.
pub fn init_logging(debug: bool, quiet: bool) {
    let level = if quiet {
        LevelFilter::ERROR
    } else if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    // a second call in the same process keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
