pub use engine::*;
use ir::Tree;
use parsers::Language;
use patterns::{compile_pattern, PatternTree};
use std::sync::atomic::{AtomicUsize, Ordering};

mod analyze;
mod formula;
mod invariants;
mod matching;
mod properties;

static FILE_COUNTER: AtomicUsize = AtomicUsize::new(0);

pub(crate) fn program(src: &str) -> Tree {
    let id = FILE_COUNTER.fetch_add(1, Ordering::Relaxed);
    parsers::parse_source(Language::Generic, &format!("file{id}.gen"), src).expect("parse")
}

pub(crate) fn pattern(src: &str) -> PatternTree {
    compile_pattern(Language::Generic, src).expect("pattern")
}

pub(crate) fn matched_with(pat: &str, tree: &Tree, cfg: &EngineConfig) -> Vec<String> {
    find_matches(&pattern(pat), tree, cfg)
        .expect("search")
        .iter()
        .map(|m| tree.slice(m.span).to_string())
        .collect()
}

/// Source text of every match of `pat` in `src`, in order.
pub(crate) fn matched(pat: &str, src: &str) -> Vec<String> {
    matched_with(pat, &program(src), &EngineConfig::default())
}

pub(crate) fn rules(yaml: &str) -> RuleSet {
    loader::load_rules_str(yaml, Some("test.yaml")).expect("rules")
}

pub(crate) fn findings(yaml: &str, src: &str) -> Vec<Finding> {
    let tree = program(src);
    let report = analyze_tree(&tree, &rules(yaml), &EngineConfig::default(), None);
    report.findings().cloned().collect()
}
