use super::*;

fn pos(offset: usize) -> Position {
    Position::new(1, offset + 1, offset)
}

fn span(start: usize, end: usize) -> Span {
    Span::new(pos(start), pos(end))
}

fn ident(b: &mut TreeBuilder, name: &str, at: usize) -> NodeId {
    b.leaf(
        NodeKind::Expr(ExprKind::Ident(name.into())),
        span(at, at + name.len()),
    )
    .unwrap()
}

fn int(b: &mut TreeBuilder, raw: &str, at: usize) -> NodeId {
    b.leaf(
        NodeKind::Expr(ExprKind::Literal(Literal::Int(raw.into()))),
        span(at, at + raw.len()),
    )
    .unwrap()
}

/// Builds `lhs op rhs;` as a one-statement program.
fn binary_program(lhs: &str, op: BinOp, rhs: &str) -> Tree {
    let src = format!("{lhs} {} {rhs};", op.symbol());
    let mut b = TreeBuilder::new("t.gen", "generic", src.clone());
    let l = ident(&mut b, lhs, 0);
    let r_at = lhs.len() + op.symbol().len() + 2;
    let r = ident(&mut b, rhs, r_at);
    let bin = b
        .push(
            NodeKind::Expr(ExprKind::Binary(op)),
            vec![l, r],
            span(0, r_at + rhs.len()),
        )
        .unwrap();
    let stmt = b
        .push(NodeKind::Stmt(StmtKind::Expr), vec![bin], span(0, src.len()))
        .unwrap();
    let prog = b
        .push(NodeKind::List(ListKind::Program), vec![stmt], span(0, src.len()))
        .unwrap();
    b.finish(prog).unwrap()
}

#[test]
fn builder_rejects_reused_child() {
    let mut b = TreeBuilder::new("t", "generic", "a");
    let a = ident(&mut b, "a", 0);
    b.push(NodeKind::Stmt(StmtKind::Expr), vec![a], span(0, 1))
        .unwrap();
    let err = b
        .push(NodeKind::Stmt(StmtKind::Expr), vec![a], span(0, 1))
        .unwrap_err();
    assert_eq!(err, TreeError::ChildReused(a));
}

#[test]
fn builder_rejects_orphans_and_unknown_root() {
    let mut b = TreeBuilder::new("t", "generic", "a b");
    let a = ident(&mut b, "a", 0);
    let stray = ident(&mut b, "b", 2);
    let stmt = b
        .push(NodeKind::Stmt(StmtKind::Expr), vec![a], span(0, 1))
        .unwrap();
    assert_eq!(b.finish(stmt).unwrap_err(), TreeError::Orphan(stray));

    let b = TreeBuilder::new("t", "generic", "");
    let missing = {
        let mut other = TreeBuilder::new("t", "generic", "x");
        ident(&mut other, "x", 0)
    };
    assert_eq!(b.finish(missing).unwrap_err(), TreeError::UnknownNode(missing));
}

#[test]
fn preorder_visits_parents_before_children_left_to_right() {
    let tree = binary_program("a", BinOp::Add, "b");
    let labels: Vec<String> = tree.preorder().map(|id| tree.kind(id).label()).collect();
    assert_eq!(
        labels,
        vec!["List(Program)", "Stmt(Expr)", "Binary:+", "Ident:a", "Ident:b"]
    );
    assert_eq!(tree.text(tree.children(tree.root())[0]), "a + b;");
}

#[test]
fn ancestor_index_resolves_chain_without_parent_pointers() {
    let tree = binary_program("a", BinOp::Add, "b");
    let index = AncestorIndex::build(&tree);
    let leaf = tree.preorder().last().unwrap();
    let chain: Vec<NodeId> = index.ancestors(leaf).collect();
    assert_eq!(chain.len(), 3);
    assert_eq!(*chain.last().unwrap(), tree.root());
    assert_eq!(index.depth(leaf), 3);
    assert!(index.is_ancestor_or_self(tree.root(), leaf));
    assert!(!index.is_ancestor_or_self(leaf, tree.root()));
    let stmt = index.enclosing(&tree, leaf, |k| matches!(k, NodeKind::Stmt(_)));
    assert_eq!(stmt, Some(tree.children(tree.root())[0]));
}

#[test]
fn equality_ignores_spans() {
    let a = binary_program("a", BinOp::Eq, "b");
    let b = binary_program("a", BinOp::Eq, "b");
    let policy = EqualityPolicy::default();
    assert!(structurally_equal(&a, a.root(), &b, b.root(), &policy));
    let c = binary_program("a", BinOp::Eq, "c");
    assert!(!structurally_equal(&a, a.root(), &c, c.root(), &policy));
}

#[test]
fn equality_is_reflexive_for_every_node() {
    let tree = binary_program("left", BinOp::Mul, "right");
    for policy in [
        EqualityPolicy::default(),
        EqualityPolicy::syntactic(),
        EqualityPolicy {
            commutative: true,
            ..EqualityPolicy::default()
        },
    ] {
        for id in tree.preorder() {
            assert!(structurally_equal(&tree, id, &tree, id, &policy));
        }
    }
}

#[test]
fn commutative_policy_is_opt_in() {
    let ab = binary_program("a", BinOp::Eq, "b");
    let ba = binary_program("b", BinOp::Eq, "a");
    assert!(!structurally_equal(
        &ab,
        ab.root(),
        &ba,
        ba.root(),
        &EqualityPolicy::default()
    ));
    let commutative = EqualityPolicy {
        commutative: true,
        ..EqualityPolicy::default()
    };
    assert!(structurally_equal(&ab, ab.root(), &ba, ba.root(), &commutative));

    let sub_ab = binary_program("a", BinOp::Sub, "b");
    let sub_ba = binary_program("b", BinOp::Sub, "a");
    assert!(!structurally_equal(
        &sub_ab,
        sub_ab.root(),
        &sub_ba,
        sub_ba.root(),
        &commutative
    ));
}

#[test]
fn numeric_normalization_follows_policy() {
    let mut b = TreeBuilder::new("t", "generic", "0x10 16 1_6");
    let hex = int(&mut b, "0x10", 0);
    let dec = int(&mut b, "16", 5);
    let sep = int(&mut b, "1_6", 8);
    let list = b
        .push(
            NodeKind::List(ListKind::Elements),
            vec![hex, dec, sep],
            span(0, 11),
        )
        .unwrap();
    let tree = b.finish(list).unwrap();

    let normalized = EqualityPolicy::default();
    assert!(structurally_equal(&tree, hex, &tree, dec, &normalized));
    assert!(structurally_equal(&tree, sep, &tree, dec, &normalized));
    let strict = EqualityPolicy::syntactic();
    assert!(!structurally_equal(&tree, hex, &tree, dec, &strict));
}

#[test]
fn string_quote_style_is_normalized() {
    let single = Literal::Str {
        raw: "'x'".into(),
        value: "x".into(),
    };
    let double = Literal::Str {
        raw: "\"x\"".into(),
        value: "x".into(),
    };
    assert!(equality::literal_eq(&single, &double, &EqualityPolicy::default()));
    assert!(!equality::literal_eq(&single, &double, &EqualityPolicy::syntactic()));
    let f1 = Literal::Float("1.0".into());
    let f2 = Literal::Float("1.00".into());
    assert!(equality::literal_eq(&f1, &f2, &EqualityPolicy::default()));
}

#[test]
fn span_overlap_and_containment() {
    let outer = span(0, 10);
    let inner = span(2, 4);
    assert!(outer.contains(&inner));
    assert!(outer.overlaps(&inner));
    assert!(!span(0, 2).overlaps(&span(2, 4)));
    assert!(span(0, 4).overlaps(&Span::empty_at(pos(2))));
    assert_eq!(span(3, 5).cover(span(1, 2)), span(1, 5));
}

#[test]
fn sequence_span_collapses_when_empty() {
    let tree = binary_program("a", BinOp::Add, "b");
    let empty = sequence_span(&tree, &[], pos(3));
    assert!(empty.is_empty());
    assert_eq!(empty.start.offset, 3);
    let leaves: Vec<NodeId> = tree
        .preorder()
        .filter(|id| tree.kind(*id).ident().is_some())
        .collect();
    let covered = sequence_span(&tree, &leaves, pos(0));
    assert_eq!(tree.slice(covered), "a + b");
}

#[test]
fn line_index_maps_offsets() {
    let index = LineIndex::new("ab\ncd\n");
    assert_eq!(index.position(0), Position::new(1, 1, 0));
    assert_eq!(index.position(4), Position::new(2, 2, 4));
    assert_eq!(index.position(6), Position::new(3, 1, 6));
}

#[test]
fn schema_accepts_well_formed_program() {
    let tree = binary_program("a", BinOp::Add, "b");
    assert!(schema::validate(&tree, false).is_ok());
}

#[test]
fn schema_rejects_misplaced_category() {
    let mut b = TreeBuilder::new("t", "generic", "a");
    let a = ident(&mut b, "a", 0);
    // an expression directly inside a program list
    let prog = b
        .push(NodeKind::List(ListKind::Program), vec![a], span(0, 1))
        .unwrap();
    let tree = b.finish(prog).unwrap();
    let err = schema::validate(&tree, false).unwrap_err();
    assert!(matches!(err, SchemaError::Slot { found: Category::Expr, .. }));
}

#[test]
fn schema_rejects_markers_in_programs() {
    let mut b = TreeBuilder::new("t", "generic", "...");
    let dots = b
        .leaf(NodeKind::Marker(Marker::Ellipsis), span(0, 3))
        .unwrap();
    let prog = b
        .push(NodeKind::List(ListKind::Program), vec![dots], span(0, 3))
        .unwrap();
    let tree = b.finish(prog).unwrap();
    assert!(matches!(
        schema::validate(&tree, false),
        Err(SchemaError::Marker(_))
    ));
    assert!(schema::validate(&tree, true).is_ok());
}

#[test]
fn tree_serializes_to_json_and_dot() {
    let tree = binary_program("a", BinOp::Add, "b");
    let json = tree.to_json().unwrap();
    let back: Tree = serde_json::from_str(&json).unwrap();
    assert_eq!(back.len(), tree.len());
    assert_eq!(back.content_hash(), tree.content_hash());
    assert!(tree.to_dot().contains("Binary:+"));
}
