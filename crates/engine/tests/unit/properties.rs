use super::*;
use ir::EqualityPolicy;
use std::time::Duration;

fn with_policy(policy: EqualityPolicy) -> EngineConfig {
    EngineConfig {
        equality: policy,
        ..EngineConfig::default()
    }
}

#[test]
fn every_expression_equals_itself() {
    let src = "f(a.b[1], 'x') == f(a.b[1], 'x');\nnew C(0x1f) == new C(0x1f);\n(fn (x) { return x; }) == (fn (x) { return x; });";
    assert_eq!(matched("$X == $X", src).len(), 3);
}

#[test]
fn literal_normalization_follows_policy() {
    let tree = program("0x10 == 16;\n'a' == \"a\";\n1_000 == 1000;");
    let normalized = matched_with("$X == $X", &tree, &EngineConfig::default());
    assert_eq!(normalized.len(), 3);
    let exact = matched_with("$X == $X", &tree, &with_policy(EqualityPolicy::syntactic()));
    assert!(exact.is_empty());
}

#[test]
fn commutative_operands_only_when_enabled() {
    let tree = program("a * b == b * a;");
    assert!(matched_with("$X == $X", &tree, &EngineConfig::default()).is_empty());
    let policy = EqualityPolicy {
        commutative: true,
        ..EqualityPolicy::default()
    };
    assert_eq!(matched_with("$X == $X", &tree, &with_policy(policy)).len(), 1);
}

#[test]
fn ellipsis_only_widens_the_match_set() {
    let src = "foo(1, 2); foo(1, 9, 2); foo(2, 1); foo(1); foo();";
    let exact = matched("foo(1, 2)", src);
    let gap = matched("foo(1, ..., 2)", src);
    let any = matched("foo(...)", src);
    assert!(exact.iter().all(|m| gap.contains(m)));
    assert!(gap.iter().all(|m| any.contains(m)));
    assert_eq!((exact.len(), gap.len(), any.len()), (1, 2, 5));
}

#[test]
fn deep_ellipsis_matches_are_a_subset_of_plain_ones() {
    let src = "g(x); g(y + x); g(y); g(h(x), 1);";
    let deep = matched("g(<... x ...>)", src);
    let plain = matched("g(...)", src);
    assert_eq!(deep, vec!["g(x)", "g(y + x)"]);
    assert!(deep.iter().all(|m| plain.contains(m)));
}

#[test]
fn analysis_is_deterministic() {
    let rs = rules(
        r#"rules:
- id: calls
  message: call to $F
  pattern: $F(...)
- id: self.compare
  message: m
  pattern: $X == $X
"#,
    );
    let trees: Vec<Tree> = (0..8)
        .map(|i| program(&format!("a({i}); b(a == a);\nfn f{i}() {{ c(d(e)); }}")))
        .collect();
    let cfg = EngineConfig::default();
    let collect = |reports: Vec<FileReport>| -> Vec<Finding> {
        reports.iter().flat_map(|r| r.findings().cloned()).collect()
    };
    let first = collect(analyze_trees(&trees, &rs, &cfg, None));
    let second = collect(analyze_trees(&trees, &rs, &cfg, None));
    let sequential = collect(
        trees
            .iter()
            .map(|t| analyze_tree(t, &rs, &cfg, None))
            .collect(),
    );
    assert_eq!(first, second);
    assert_eq!(first, sequential);
    assert_eq!(first.len(), 8 * 5);
}

#[test]
fn timeout_is_confined_to_one_rule_and_file() {
    let ones = vec!["1"; 40].join(", ");
    let tree = program(&format!("g({ones});\nfoo();"));
    let rs = rules(
        r#"rules:
- id: slow
  message: m
  pattern: g(..., $A, ..., $B, ..., $C, ..., 2)
- id: fast
  message: m
  pattern: foo()
"#,
    );
    let cfg = EngineConfig {
        rule_timeout: None,
        max_steps: Some(1_000),
        ..EngineConfig::default()
    };
    let report = analyze_tree(&tree, &rs, &cfg, None);
    assert!(matches!(report.rules[0].outcome, RuleOutcome::TimedOut { .. }));
    match &report.rules[1].outcome {
        RuleOutcome::Completed(found) => assert_eq!(found.len(), 1),
        other => panic!("fast rule did not complete: {other:?}"),
    }
    assert_eq!(report.timed_out().count(), 1);

    let other = program("g(1, 2);");
    let report = analyze_tree(&other, &rs, &cfg, None);
    assert!(report.timed_out().next().is_none());
}

#[test]
fn wall_clock_budget_stops_the_search() {
    let budget = Budget::new(Some(Duration::ZERO), None);
    assert!(matches!(budget.tick(), Err(MatchError::Timeout { .. })));
    // stays exhausted
    assert!(budget.tick().is_err());
    assert!(budget.is_exhausted());

    let unlimited = Budget::unlimited();
    for _ in 0..10_000 {
        unlimited.tick().unwrap();
    }
    assert_eq!(unlimited.steps(), 10_000);
}
