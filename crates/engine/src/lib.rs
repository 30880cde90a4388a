//! Structural matching engine: binds metavariables, searches target trees,
//! evaluates rule formulas and turns the surviving matches into findings.
//! Files are analyzed in parallel; every (rule, file) pair runs under its
//! own budget so one pathological rule cannot stall the rest.

use ir::{AncestorIndex, EqualityPolicy, Tree};
pub use loader::{CompiledRule, RuleSet, Severity};
use parsers::Language;
use patterns::PatternTree;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

mod budget;
pub mod cache;
pub mod debug;
mod env;
mod error;
mod finding;
pub mod formula;
mod matcher;

pub use budget::Budget;
pub use cache::FindingCache;
pub use debug::{set_debug_sink, DebugEvent, DebugSink};
pub use env::{Binding, Env};
pub use error::{InvariantViolation, MatchError};
pub use finding::{dedup_findings, interpolate, BoundValue, Finding};
pub use formula::{evaluate, EvalContext};
pub use matcher::{Found, Match, Matcher, Matches};

use crate::debug::emit;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Wall-clock allowance of one (rule, file) evaluation.
    pub rule_timeout: Option<Duration>,
    /// Step allowance of one (rule, file) evaluation.
    pub max_steps: Option<u64>,
    pub equality: EqualityPolicy,
    /// Size of the global rayon pool. Analysis runs on that pool; the
    /// binary sizes it once at startup.
    pub threads: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rule_timeout: Some(Duration::from_secs(5)),
            max_steps: None,
            equality: EqualityPolicy::default(),
            threads: None,
        }
    }
}

impl EngineConfig {
    fn budget(&self) -> Budget {
        Budget::new(self.rule_timeout, self.max_steps)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    Completed(Vec<Finding>),
    TimedOut { elapsed_ms: u64 },
    Internal(InvariantViolation),
}

#[derive(Debug, Clone)]
pub struct RuleReport {
    pub rule_id: String,
    pub outcome: RuleOutcome,
    pub cached: bool,
    pub elapsed: Duration,
    cache_key: String,
}

/// Outcomes of every applicable rule on one file, in rule order.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: String,
    pub rules: Vec<RuleReport>,
    pub elapsed: Duration,
}

impl FileReport {
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.rules.iter().flat_map(|r| match &r.outcome {
            RuleOutcome::Completed(findings) => findings.as_slice(),
            _ => &[],
        })
    }

    pub fn timed_out(&self) -> impl Iterator<Item = &RuleReport> {
        self.rules
            .iter()
            .filter(|r| matches!(r.outcome, RuleOutcome::TimedOut { .. }))
    }

    pub fn internal_errors(&self) -> impl Iterator<Item = (&str, &InvariantViolation)> {
        self.rules.iter().filter_map(|r| match &r.outcome {
            RuleOutcome::Internal(v) => Some((r.rule_id.as_str(), v)),
            _ => None,
        })
    }
}

#[derive(Debug, Default, Serialize)]
pub struct EngineMetrics {
    pub file_times_ms: HashMap<String, u128>,
    pub rule_times_ms: HashMap<String, u128>,
    pub findings: usize,
    pub timeouts: usize,
    pub internal_errors: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
}

impl EngineMetrics {
    pub fn from_reports(reports: &[FileReport]) -> Self {
        let mut m = EngineMetrics::default();
        for file in reports {
            m.file_times_ms
                .insert(file.path.clone(), file.elapsed.as_millis());
            for rule in &file.rules {
                *m.rule_times_ms.entry(rule.rule_id.clone()).or_default() +=
                    rule.elapsed.as_millis();
                if rule.cached {
                    m.cache_hits += 1;
                } else {
                    m.cache_misses += 1;
                }
                match &rule.outcome {
                    RuleOutcome::Completed(f) => m.findings += f.len(),
                    RuleOutcome::TimedOut { .. } => m.timeouts += 1,
                    RuleOutcome::Internal(_) => m.internal_errors += 1,
                }
            }
        }
        m
    }
}

/// Every occurrence of a single pattern in `tree`, sorted by range.
pub fn find_matches(
    pattern: &PatternTree,
    tree: &Tree,
    cfg: &EngineConfig,
) -> Result<Vec<Match>, MatchError> {
    let budget = cfg.budget();
    let found = Matcher::new(pattern, tree, cfg.equality, &budget)
        .search()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(formula::sorted(found, tree))
}

/// Runs one rule on one file under a fresh budget.
pub fn evaluate_rule(
    rule: &CompiledRule,
    tree: &Tree,
    index: &AncestorIndex,
    cfg: &EngineConfig,
) -> RuleOutcome {
    let Some(patterns) = tree_language(tree).and_then(|l| rule.patterns_for(l)) else {
        return RuleOutcome::Completed(Vec::new());
    };
    let budget = cfg.budget();
    let ctx = EvalContext {
        tree,
        index,
        patterns,
        policy: cfg.equality,
        budget: &budget,
    };
    let result = ctx
        .collect(&rule.formula)
        .and_then(|matches| evaluate(&rule.formula, &matches, &ctx));
    match result {
        Ok(matches) => {
            let mut findings: Vec<Finding> = matches
                .iter()
                .map(|m| Finding::from_match(rule, tree, m))
                .collect();
            dedup_findings(&mut findings);
            RuleOutcome::Completed(findings)
        }
        Err(MatchError::Timeout { elapsed_ms, .. }) => RuleOutcome::TimedOut { elapsed_ms },
        Err(MatchError::Invariant(v)) => RuleOutcome::Internal(v),
    }
}

fn tree_language(tree: &Tree) -> Option<Language> {
    tree.language().parse().ok()
}

/// Runs every rule applicable to the tree's language. Cached outcomes are
/// reused when `cache` holds the (rule, file) key.
pub fn analyze_tree(
    tree: &Tree,
    rules: &RuleSet,
    cfg: &EngineConfig,
    cache: Option<&FindingCache>,
) -> FileReport {
    let started = Instant::now();
    let path = tree.path().to_string();
    let Some(language) = tree_language(tree) else {
        warn!(path = %path, language = tree.language(), "No rules for unknown language");
        return FileReport {
            path,
            rules: Vec::new(),
            elapsed: started.elapsed(),
        };
    };
    let index = AncestorIndex::build(tree);
    let mut reports = Vec::new();
    for rule in rules.for_language(language) {
        let rule_started = Instant::now();
        emit(DebugEvent::MatchAttempt {
            rule_id: rule.id.clone(),
            file: path.clone(),
        });
        let cache_key = FindingCache::key(rule, tree, &cfg.equality);
        let (outcome, cached) = match cache.and_then(|c| c.get(&cache_key)) {
            Some(hit) => (RuleOutcome::Completed(hit.clone()), true),
            None => (evaluate_rule(rule, tree, &index, cfg), false),
        };
        match &outcome {
            RuleOutcome::Completed(findings) => {
                debug!(rule = %rule.id, path = %path, findings = findings.len(), cached, "Rule evaluated");
                emit(DebugEvent::MatchResult {
                    rule_id: rule.id.clone(),
                    file: path.clone(),
                    findings: findings.len(),
                    cached,
                });
            }
            RuleOutcome::TimedOut { elapsed_ms } => {
                warn!(rule = %rule.id, path = %path, elapsed_ms, "Rule timed out");
                emit(DebugEvent::RuleTimedOut {
                    rule_id: rule.id.clone(),
                    file: path.clone(),
                    elapsed_ms: *elapsed_ms,
                });
            }
            RuleOutcome::Internal(violation) => {
                error!(rule = %rule.id, path = %path, %violation, "Internal matcher error");
                emit(DebugEvent::InternalError {
                    rule_id: rule.id.clone(),
                    file: path.clone(),
                    message: violation.to_string(),
                });
            }
        }
        reports.push(RuleReport {
            rule_id: rule.id.clone(),
            outcome,
            cached,
            elapsed: rule_started.elapsed(),
            cache_key,
        });
    }
    FileReport {
        path,
        rules: reports,
        elapsed: started.elapsed(),
    }
}

/// Analyzes `trees` in parallel. Reports come back in input order, and
/// newly completed outcomes are stored in `cache`.
pub fn analyze_trees(
    trees: &[Tree],
    rules: &RuleSet,
    cfg: &EngineConfig,
    cache: Option<&mut FindingCache>,
) -> Vec<FileReport> {
    debug!(
        "Starting analysis of {} files with {} rules",
        trees.len(),
        rules.len()
    );
    let shared = cache.as_deref();
    let reports: Vec<FileReport> = trees
        .par_iter()
        .map(|tree| analyze_tree(tree, rules, cfg, shared))
        .collect();
    if let Some(cache) = cache {
        for rule in reports.iter().flat_map(|r| &r.rules) {
            if let (false, RuleOutcome::Completed(findings)) = (rule.cached, &rule.outcome) {
                cache.insert(rule.cache_key.clone(), findings.clone());
            }
        }
    }
    reports
}

