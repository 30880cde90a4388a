use anyhow::{Context, Result};
use engine::EngineConfig;
use ir::EqualityPolicy;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::debug;

use crate::args::EngineArgs;

/// Looked up in the working directory when `--config` is not given.
pub const CONFIG_FILE: &str = "structgrep.toml";

fn default_rule_timeout_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSection {
    /// 0 disables the wall-clock allowance.
    #[serde(default = "default_rule_timeout_ms")]
    pub rule_timeout_ms: u64,
    #[serde(default)]
    pub max_steps: Option<u64>,
    #[serde(default)]
    pub threads: Option<usize>,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            rule_timeout_ms: default_rule_timeout_ms(),
            max_steps: None,
            threads: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EqualitySection {
    #[serde(default = "default_true")]
    pub normalize_numbers: bool,
    #[serde(default = "default_true")]
    pub normalize_strings: bool,
    #[serde(default)]
    pub commutative: bool,
}

impl Default for EqualitySection {
    fn default() -> Self {
        Self {
            normalize_numbers: true,
            normalize_strings: true,
            commutative: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub equality: EqualitySection,
}

impl Config {
    /// Engine settings with command-line flags taking precedence.
    pub fn engine_config(&self, args: &EngineArgs) -> EngineConfig {
        let timeout_ms = args.timeout_rule_ms.unwrap_or(self.engine.rule_timeout_ms);
        EngineConfig {
            rule_timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
            max_steps: args.max_steps.or(self.engine.max_steps),
            equality: EqualityPolicy {
                normalize_numbers: self.equality.normalize_numbers,
                normalize_strings: self.equality.normalize_strings,
                commutative: self.equality.commutative,
            },
            threads: args.threads.or(self.engine.threads),
        }
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).context("failed to parse config")
}

/// Reads `explicit` when given (it must exist), otherwise `structgrep.toml`
/// from the working directory, otherwise the defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => {
            let fallback = PathBuf::from(CONFIG_FILE);
            if !fallback.is_file() {
                return Ok(Config::default());
            }
            fallback
        }
    };
    debug!(path = %path.display(), "Loading configuration");
    let content =
        fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
    parse_config(&content).with_context(|| format!("invalid configuration in {}", path.display()))
}
