use super::*;
use ir::{ExprKind, ListKind, Marker, NodeKind, Position, Span, StmtKind, TreeBuilder};

fn span(start: usize, end: usize) -> Span {
    Span::new(
        Position::new(1, start + 1, start),
        Position::new(1, end + 1, end),
    )
}

/// `...;` with the ellipsis marker left in a program tree.
fn tree_with_marker() -> Tree {
    let mut b = TreeBuilder::new("marker.gen", "generic", "...;");
    let dots = b.leaf(NodeKind::Marker(Marker::Ellipsis), span(0, 3)).unwrap();
    let stmt = b.push(NodeKind::Stmt(StmtKind::Expr), vec![dots], span(0, 4)).unwrap();
    let root = b.push(NodeKind::List(ListKind::Program), vec![stmt], span(0, 4)).unwrap();
    b.finish(root).unwrap()
}

/// `break();` where the callee slot holds a statement.
fn tree_with_misplaced_callee() -> Tree {
    let mut b = TreeBuilder::new("misplaced.gen", "generic", "break();");
    let brk = b.leaf(NodeKind::Stmt(StmtKind::Break), span(0, 5)).unwrap();
    let args = b.leaf(NodeKind::List(ListKind::Args), span(6, 6)).unwrap();
    let call = b.push(NodeKind::Expr(ExprKind::Call), vec![brk, args], span(0, 7)).unwrap();
    let stmt = b.push(NodeKind::Stmt(StmtKind::Expr), vec![call], span(0, 8)).unwrap();
    let root = b.push(NodeKind::List(ListKind::Program), vec![stmt], span(0, 8)).unwrap();
    b.finish(root).unwrap()
}

#[test]
fn marker_in_target_is_an_internal_error() {
    let tree = tree_with_marker();
    let err = find_matches(&pattern("foo()"), &tree, &EngineConfig::default()).unwrap_err();
    match err {
        MatchError::Invariant(InvariantViolation::MarkerInTarget { path, label, .. }) => {
            assert_eq!(path, "marker.gen");
            assert_eq!(label, "...");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn misplaced_node_is_an_internal_error_not_a_mismatch() {
    let tree = tree_with_misplaced_callee();
    let err = find_matches(&pattern("$F()"), &tree, &EngineConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        MatchError::Invariant(InvariantViolation::MisplacedNode { .. })
    ));
    assert!(err.to_string().contains("misplaced.gen"));
}

#[test]
fn internal_error_is_confined_to_its_rule() {
    let tree = tree_with_misplaced_callee();
    let rs = rules(
        r#"rules:
- id: any.call
  message: m
  pattern: $F()
- id: comparison
  message: m
  pattern: $A == $B
"#,
    );
    let report = analyze_tree(&tree, &rs, &EngineConfig::default(), None);
    assert_eq!(report.rules.len(), 2);
    assert!(matches!(report.rules[0].outcome, RuleOutcome::Internal(_)));
    assert_eq!(report.rules[1].outcome, RuleOutcome::Completed(vec![]));
    let errors: Vec<&str> = report.internal_errors().map(|(id, _)| id).collect();
    assert_eq!(errors, vec!["any.call"]);
}

#[test]
fn unknown_sub_pattern_is_reported() {
    let tree = program("a();");
    let index = ir::AncestorIndex::build(&tree);
    let budget = Budget::unlimited();
    let patterns = loader::PatternSet::new();
    let ctx = EvalContext {
        tree: &tree,
        index: &index,
        patterns: &patterns,
        policy: Default::default(),
        budget: &budget,
    };
    let err = ctx.collect(&patterns::Formula::pattern("p7")).unwrap_err();
    assert_eq!(
        err,
        MatchError::Invariant(InvariantViolation::MissingPattern { id: "p7".into() })
    );
}
