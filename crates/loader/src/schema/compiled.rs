use parsers::Language;
use patterns::{Formula, ParseError, PatternId, PatternTree};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
/// Severity associated with a rule or finding.
pub enum Severity {
    Info,
    Error,
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Error => "ERROR",
            Severity::Info => "INFO",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "error" => Ok(Severity::Error),
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            "warning" => Ok(Severity::Medium),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

/// Compiled sub-patterns of one rule for one language, keyed by id.
pub type PatternSet = BTreeMap<PatternId, Arc<PatternTree>>;

#[derive(Debug, Clone)]
/// Representation ready for rule execution.
pub struct CompiledRule {
    pub id: String,
    pub severity: Severity,
    pub message: String,
    /// Languages declared by the rule, in declaration order.
    pub languages: Vec<Language>,
    pub formula: Formula,
    /// Raw text of every sub-pattern, keyed by id.
    pub sources: BTreeMap<PatternId, String>,
    /// Only languages for which every sub-pattern compiled.
    pub patterns: BTreeMap<Language, PatternSet>,
    pub source_file: Option<String>,
    /// blake3 of the rule definition, used to invalidate cached results.
    pub hash: String,
}

impl CompiledRule {
    pub fn applies_to(&self, language: Language) -> bool {
        self.patterns.contains_key(&language)
    }

    pub fn patterns_for(&self, language: Language) -> Option<&PatternSet> {
        self.patterns.get(&language)
    }
}

/// A sub-pattern that failed to compile for one of the rule's languages.
/// The rule stays usable for its other languages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDiagnostic {
    pub rule_id: String,
    pub language: Language,
    pub pattern_id: PatternId,
    pub source_file: Option<String>,
    pub error: ParseError,
}

impl fmt::Display for RuleDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.source_file {
            write!(f, "{file}: ")?;
        }
        write!(
            f,
            "rule `{}` skipped for {} (pattern {}): {}",
            self.rule_id, self.language, self.pattern_id, self.error
        )
    }
}

#[derive(Debug, Clone, Default)]
/// Collection of compiled rules.
pub struct RuleSet {
    pub rules: Vec<CompiledRule>,
    pub diagnostics: Vec<RuleDiagnostic>,
}

impl RuleSet {
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn get(&self, id: &str) -> Option<&CompiledRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Rules with compiled patterns for `language`.
    pub fn for_language(&self, language: Language) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter().filter(move |r| r.applies_to(language))
    }

    pub(crate) fn extend(&mut self, other: RuleSet) {
        self.rules.extend(other.rules);
        self.diagnostics.extend(other.diagnostics);
    }
}

pub(crate) fn log_rule_summary(rule: &CompiledRule) {
    if !tracing::level_enabled!(tracing::Level::DEBUG) {
        return;
    }
    let languages: Vec<&str> = rule.patterns.keys().map(|l| l.as_str()).collect();
    debug!(
        rule_id = %rule.id,
        severity = %rule.severity,
        formula = %rule.formula,
        patterns = rule.sources.len(),
        languages = ?languages,
        file = ?rule.source_file,
        "compiled rule"
    );
}
