use ir::{ArgKind, Category, ExprKind, ListKind, Marker, NodeKind};
use parsers::Language;
use regex::Regex;

use crate::{compile_pattern, Formula, FormulaError, ParseError, PatternCache, PatternRoot, Predicate};

fn markers(p: &crate::PatternTree) -> Vec<NodeKind> {
    p.tree
        .preorder()
        .map(|id| p.tree.kind(id).clone())
        .filter(NodeKind::is_marker)
        .collect()
}

#[test]
fn lone_expression_statement_roots_at_the_expression() {
    let p = compile_pattern(Language::Generic, "$X == $X;").unwrap();
    let PatternRoot::Node(root) = p.root else {
        panic!("expected a single root");
    };
    assert!(matches!(p.tree.kind(root), NodeKind::Expr(ExprKind::Binary(_))));
    assert_eq!(p.metavariables.iter().collect::<Vec<_>>(), vec!["X"]);
    assert!(!p.is_sequence());
}

#[test]
fn several_statements_form_a_sequence() {
    let p = compile_pattern(Language::Generic, "open($F);\n...\nclose($F);").unwrap();
    let PatternRoot::Sequence(ids) = &p.root else {
        panic!("expected a sequence root");
    };
    assert_eq!(ids.len(), 3);
    assert_eq!(p.tree.kind(ids[1]), &NodeKind::Marker(Marker::Ellipsis));
    assert_eq!(p.tree.kind(p.tree.root()), &NodeKind::List(ListKind::Block));
}

#[test]
fn placeholders_inside_wrappers_become_list_markers() {
    let p = compile_pattern(Language::Generic, "foo($X, ..., $...REST)").unwrap();
    let args = p
        .tree
        .preorder()
        .find(|id| p.tree.kind(*id) == &NodeKind::List(ListKind::Args))
        .unwrap();
    let kinds: Vec<&NodeKind> = p.tree.children(args).iter().map(|id| p.tree.kind(*id)).collect();
    assert_eq!(kinds[0], &NodeKind::Arg(ArgKind::Positional));
    assert_eq!(kinds[1], &NodeKind::Marker(Marker::Ellipsis));
    assert_eq!(
        kinds[2],
        &NodeKind::Marker(Marker::Variadic {
            name: "REST".into()
        })
    );
}

#[test]
fn metavariables_take_the_category_of_their_position() {
    let p = compile_pattern(Language::Generic, "fn $F(...) { $S; }").unwrap();
    let found = markers(&p);
    assert!(found.contains(&NodeKind::Marker(Marker::Metavar {
        name: "F".into(),
        category: Category::Expr,
    })));
    assert!(found.contains(&NodeKind::Marker(Marker::Metavar {
        name: "S".into(),
        category: Category::Stmt,
    })));

    let typed = compile_pattern(Language::Generic, "let x: $T = 1;").unwrap();
    assert!(markers(&typed).contains(&NodeKind::Marker(Marker::Metavar {
        name: "T".into(),
        category: Category::Type,
    })));
}

#[test]
fn lowercase_dollar_names_stay_identifiers() {
    let p = compile_pattern(Language::Generic, "$foo + 1").unwrap();
    assert!(markers(&p).is_empty());
    assert!(p.metavariables.is_empty());
}

#[test]
fn javascript_patterns_share_the_marker_vocabulary() {
    let p = compile_pattern(Language::JavaScript, "eval(<... $X ...>)").unwrap();
    let found = markers(&p);
    assert_eq!(found[0], NodeKind::Marker(Marker::DeepEllipsis));
    assert!(p.metavariables.contains("X"));
}

#[test]
fn misplaced_variadic_is_rejected() {
    let err = compile_pattern(Language::Generic, "$...X + 1").unwrap_err();
    assert_eq!(err, ParseError::VariadicPosition { name: "X".into() });
}

#[test]
fn mixed_scalar_and_variadic_use_is_rejected() {
    let err = compile_pattern(Language::Generic, "f($X, $...X)").unwrap_err();
    assert_eq!(err, ParseError::MixedMetavariable { name: "X".into() });
}

#[test]
fn empty_and_invalid_patterns_fail() {
    assert_eq!(
        compile_pattern(Language::Generic, "  // nothing\n").unwrap_err(),
        ParseError::Empty
    );
    let err = compile_pattern(Language::Generic, "foo(").unwrap_err();
    assert!(matches!(err, ParseError::Syntax { line: 1, .. }), "{err}");
}

#[test]
fn cache_counts_hits_and_misses() {
    let cache = PatternCache::new();
    let a = cache.get_or_compile(Language::Generic, "foo($X)").unwrap();
    let b = cache.get_or_compile(Language::Generic, "foo($X)").unwrap();
    assert!(std::sync::Arc::ptr_eq(&a, &b));
    cache.get_or_compile(Language::JavaScript, "foo($X)").unwrap();
    assert!(cache.get_or_compile(Language::Generic, "foo(").is_err());
    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses, stats.entries), (1, 3, 2));
    cache.clear();
    assert_eq!(cache.stats().entries, 0);
}

#[test]
fn filters_are_conjunct_only() {
    let ok = Formula::And(vec![
        Formula::pattern("p0"),
        Formula::Not(Box::new(Formula::pattern("p1"))),
        Formula::Constraint {
            metavariable: "X".into(),
            predicate: Predicate::Regex(Regex::new("^a").unwrap()),
        },
        Formula::Focus("X".into()),
    ]);
    assert_eq!(ok.validate(), Ok(()));

    let bare = Formula::Not(Box::new(Formula::pattern("p0")));
    assert_eq!(bare.validate(), Err(FormulaError::ConjunctOnly("not")));

    let nested = Formula::Or(vec![Formula::Focus("X".into())]);
    assert_eq!(nested.validate(), Err(FormulaError::ConjunctOnly("focus")));

    let negative_only = Formula::And(vec![Formula::NotInside(Box::new(Formula::pattern("p0")))]);
    assert_eq!(negative_only.validate(), Err(FormulaError::NoPositive));
    assert_eq!(Formula::Or(vec![]).validate(), Err(FormulaError::Empty("or")));
}

#[test]
fn pattern_ids_are_listed_once_in_first_use_order() {
    let f = Formula::And(vec![
        Formula::Inside {
            inner: Box::new(Formula::pattern("p1")),
            outer: Box::new(Formula::pattern("p0")),
        },
        Formula::Constraint {
            metavariable: "X".into(),
            predicate: Predicate::Pattern("p2".into()),
        },
        Formula::Not(Box::new(Formula::pattern("p1"))),
    ]);
    assert_eq!(f.pattern_ids(), vec!["p1", "p0", "p2"]);
    assert_eq!(f.to_string(), "and(inside(p1, p0), where(X, p2), not(p1))");
}
