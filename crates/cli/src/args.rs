use clap::{Args as ClapArgs, Parser, Subcommand};
use parsers::Language;
use regex::Regex;
use std::path::PathBuf;

use crate::output::Format;
use crate::DEFAULT_MAX_FILE_SIZE;

fn parse_language(s: &str) -> Result<Language, String> {
    s.parse().map_err(|e: parsers::UnknownLanguage| e.to_string())
}

fn parse_threads(s: &str) -> Result<usize, String> {
    let v: usize = s
        .parse()
        .map_err(|e: std::num::ParseIntError| e.to_string())?;
    if v == 0 {
        Err("threads must be greater than 0".into())
    } else {
        Ok(v)
    }
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Structural code search: find code by its shape, not its text",
    long_about = "structgrep matches code patterns written in the syntax of the target language.
Patterns may contain `...` to skip arguments, statements or nested code and
`$X` metavariables that bind subtrees. Rules combine patterns with boolean
operators and are loaded from YAML files.

Examples:
  structgrep scan src/ --rules rules/            # Run a rule set
  structgrep scan app.js --rules r.yaml --format json
  structgrep match -e 'eval(...)' --lang js src/ # Ad-hoc pattern
  structgrep rules verify rules/                 # Check rule files",
    subcommand_required = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run rule files over a file or directory
    Scan(ScanArgs),
    /// Search for a single pattern
    Match(MatchArgs),
    /// Inspect rule files
    #[command(subcommand, alias = "rule")]
    Rules(RulesCmd),
}

/// Options shared by every command that runs the matcher.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct EngineArgs {
    /// Number of parallel threads to use
    #[arg(long, value_parser = parse_threads)]
    pub threads: Option<usize>,
    /// Time allowance of one rule on one file in milliseconds (0 disables it)
    #[arg(long)]
    pub timeout_rule_ms: Option<u64>,
    /// Matching step allowance of one rule on one file
    #[arg(long)]
    pub max_steps: Option<u64>,
    /// Configuration file (defaults to ./structgrep.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Exclude files matching these glob patterns
    #[arg(long, value_parser = crate::parse_exclude, value_delimiter = ',')]
    pub exclude: Vec<Regex>,
    /// Don't use default exclusion patterns
    #[arg(long)]
    pub no_default_exclude: bool,
    /// Maximum file size to analyze (in bytes, 0 disables the limit)
    #[arg(long, default_value_t = DEFAULT_MAX_FILE_SIZE)]
    pub max_file_size: u64,
    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
    /// Only log errors
    #[arg(long)]
    pub quiet: bool,
}

#[derive(ClapArgs)]
pub struct ScanArgs {
    /// Path to scan (file or directory)
    pub path: PathBuf,
    /// Rule file or directory; repeat to merge several sets
    #[arg(long, required = true)]
    pub rules: Vec<PathBuf>,
    /// Treat every scanned file as this language
    #[arg(long, value_parser = parse_language)]
    pub lang: Option<Language>,
    /// Output format for scan results
    #[arg(long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
    /// File used to cache findings between runs
    #[arg(long)]
    pub cache: Option<PathBuf>,
    /// Write engine metrics as JSON to this file
    #[arg(long)]
    pub metrics: Option<PathBuf>,
    #[command(flatten)]
    pub engine: EngineArgs,
}

#[derive(ClapArgs)]
pub struct MatchArgs {
    /// Pattern to search for
    #[arg(short = 'e', long = "pattern")]
    pub pattern: String,
    /// Language of the pattern and of the searched files
    #[arg(long, value_parser = parse_language)]
    pub lang: Language,
    /// Path to search (file or directory)
    pub path: PathBuf,
    /// Output format for matches
    #[arg(long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
    #[command(flatten)]
    pub engine: EngineArgs,
}

#[derive(Subcommand)]
pub enum RulesCmd {
    /// Load rules and report patterns that failed to compile
    Verify {
        /// Path to the rules directory or file
        path: PathBuf,
        /// Show every rule without truncation
        #[arg(long)]
        full: bool,
    },
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}
