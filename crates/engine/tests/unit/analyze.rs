use super::*;
use ir::{ListKind, NodeKind, Position, Span, TreeBuilder};
use std::sync::{Arc, Mutex};

const RULES: &str = r#"rules:
- id: eval.any
  message: eval of $X
  languages: [generic, js]
  pattern: eval($X)
- id: js.only
  message: m
  languages: js
  pattern: console.log(...)
"#;

#[test]
fn reports_follow_input_order() {
    let rs = rules(RULES);
    let trees = vec![
        program("eval(a);"),
        program("noop();"),
        program("eval(b); eval(c);"),
    ];
    let reports = analyze_trees(&trees, &rs, &EngineConfig::default(), None);
    let paths: Vec<&str> = reports.iter().map(|r| r.path.as_str()).collect();
    let expected: Vec<&str> = trees.iter().map(|t| t.path()).collect();
    assert_eq!(paths, expected);
    let counts: Vec<usize> = reports.iter().map(|r| r.findings().count()).collect();
    assert_eq!(counts, vec![1, 0, 2]);
}

#[test]
fn rules_are_filtered_by_language() {
    let rs = rules(RULES);
    let generic = analyze_tree(&program("console.log(1);"), &rs, &EngineConfig::default(), None);
    let ids: Vec<&str> = generic.rules.iter().map(|r| r.rule_id.as_str()).collect();
    assert_eq!(ids, vec!["eval.any"]);

    let js = parsers::parse_source(
        parsers::Language::JavaScript,
        "app.js",
        "console.log(token);\neval(input);\n",
    )
    .unwrap();
    let report = analyze_tree(&js, &rs, &EngineConfig::default(), None);
    assert_eq!(report.rules.len(), 2);
    let found: Vec<(&str, usize)> = report
        .findings()
        .map(|f| (f.rule_id.as_str(), f.location.start_line))
        .collect();
    assert_eq!(found, vec![("eval.any", 2), ("js.only", 1)]);
}

#[test]
fn unknown_language_runs_no_rules() {
    let span = Span::empty_at(Position::new(1, 1, 0));
    let mut b = TreeBuilder::new("x.cob", "cobol", "");
    let root = b.leaf(NodeKind::List(ListKind::Program), span).unwrap();
    let tree = b.finish(root).unwrap();
    let report = analyze_tree(&tree, &rules(RULES), &EngineConfig::default(), None);
    assert!(report.rules.is_empty());
}

#[test]
fn findings_have_stable_ids() {
    let rs = rules(RULES);
    let tree = program("eval(a);\neval(a);");
    let first: Vec<Finding> = analyze_tree(&tree, &rs, &EngineConfig::default(), None)
        .findings()
        .cloned()
        .collect();
    let again: Vec<Finding> = analyze_tree(&tree, &rs, &EngineConfig::default(), None)
        .findings()
        .cloned()
        .collect();
    assert_eq!(first.len(), 2);
    assert_ne!(first[0].id, first[1].id);
    assert_eq!(first, again);
    assert_eq!(first[0].id.len(), 64);
}

#[test]
fn metrics_summarize_reports() {
    let rs = rules(RULES);
    let trees = vec![program("eval(a);"), program("eval(b); eval(c);")];
    let reports = analyze_trees(&trees, &rs, &EngineConfig::default(), None);
    let metrics = EngineMetrics::from_reports(&reports);
    assert_eq!(metrics.findings, 3);
    assert_eq!(metrics.file_times_ms.len(), 2);
    assert_eq!(metrics.cache_misses, 2);
    assert_eq!(metrics.timeouts, 0);
}

struct Recorder(Arc<Mutex<Vec<DebugEvent>>>);

impl DebugSink for Recorder {
    fn event(&self, event: DebugEvent) {
        self.0.lock().unwrap().push(event);
    }
}

#[test]
fn debug_sink_sees_attempts_and_results() {
    let events = Arc::new(Mutex::new(Vec::new()));
    set_debug_sink(Some(Box::new(Recorder(Arc::clone(&events)))));
    let rs = rules(
        r#"rules:
- id: debug.sink.rule
  message: m
  pattern: probe()
"#,
    );
    let tree = program("probe();");
    analyze_tree(&tree, &rs, &EngineConfig::default(), None);
    set_debug_sink(None);

    let events = events.lock().unwrap();
    let mine: Vec<&DebugEvent> = events
        .iter()
        .filter(|e| match e {
            DebugEvent::MatchAttempt { rule_id, .. } | DebugEvent::MatchResult { rule_id, .. } => {
                rule_id == "debug.sink.rule"
            }
            _ => false,
        })
        .collect();
    assert_eq!(mine.len(), 2);
    assert!(matches!(mine[0], DebugEvent::MatchAttempt { .. }));
    assert!(matches!(
        mine[1],
        DebugEvent::MatchResult {
            findings: 1,
            cached: false,
            ..
        }
    ));
}

#[test]
fn message_interpolation_leaves_unknown_names() {
    let mut bindings = std::collections::BTreeMap::new();
    bindings.insert(
        "X".to_string(),
        BoundValue {
            text: "user".into(),
            location: ir::Location::resolve(&program("user;"), Span::default()),
        },
    );
    assert_eq!(interpolate("$X and $XY, $x, $ and $X1", &bindings), "user and $XY, $x, $ and $X1");
    assert_eq!(interpolate("cost: $X$X", &bindings), "cost: useruser");
}

#[test]
fn same_range_with_different_bindings_stays_separate() {
    let found = findings(
        r#"rules:
- id: either.call
  message: called with $X
  pattern-either:
    - pattern: f($X)
    - pattern: f(1)
"#,
        "f(1);",
    );
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].location, found[1].location);
    assert_ne!(found[0].id, found[1].id);
    let messages: Vec<&str> = found.iter().map(|f| f.message.as_str()).collect();
    assert!(messages.contains(&"called with 1"));
    assert!(found.iter().any(|f| f.bindings.get("X").map(|b| b.text.as_str()) == Some("1")));
}

#[test]
fn dedup_keeps_one_finding_per_environment() {
    let found = findings(
        r#"rules:
- id: pair.args
  message: m
  patterns:
    - pattern: pair($X, $Y)
    - pattern-either:
      - pattern: pair(a, ...)
      - pattern: pair(..., b)
"#,
        "pair(a, b);",
    );
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].bindings["X"].text, "a");
    assert_eq!(found[0].bindings["Y"].text, "b");
}

#[test]
fn thread_count_does_not_change_results() {
    let rs = rules(RULES);
    let trees: Vec<ir::Tree> = (0..8).map(|_| program("eval(a); eval(b);")).collect();
    let cfg = EngineConfig {
        threads: Some(1),
        ..EngineConfig::default()
    };
    let reports = analyze_trees(&trees, &rs, &cfg, None);
    assert_eq!(reports.len(), 8);
    assert!(reports.iter().all(|r| r.findings().count() == 2));
}
