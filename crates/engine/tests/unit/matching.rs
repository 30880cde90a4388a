use super::*;

#[test]
fn ellipsis_arguments_match_any_call() {
    assert_eq!(
        matched("foo(...)", "foo(); foo(1, 2); bar(3); x.foo(4);"),
        vec!["foo()", "foo(1, 2)"]
    );
}

#[test]
fn ellipsis_absorbs_only_what_fits() {
    let src = "foo(1, 3); foo(1, 2, 3); foo(1, 2, 2, 3); foo(1, 2); foo(3, 1);";
    assert_eq!(
        matched("foo(1, ..., 3)", src),
        vec!["foo(1, 3)", "foo(1, 2, 3)", "foo(1, 2, 2, 3)"]
    );
}

#[test]
fn leading_and_trailing_ellipsis() {
    let src = "f(a, b, secret); f(secret); f(a); f(secret, b);";
    assert_eq!(
        matched("f(..., secret)", src),
        vec!["f(a, b, secret)", "f(secret)"]
    );
    assert_eq!(
        matched("f(..., secret, ...)", src),
        vec!["f(a, b, secret)", "f(secret)", "f(secret, b)"]
    );
}

#[test]
fn repeated_metavariable_requires_equal_bindings() {
    let src = "a == a; a == b; f(1) == f(1); f(1)==f( 1 ); x.y == x.z;";
    assert_eq!(
        matched("$X == $X", src),
        vec!["a == a", "f(1) == f(1)", "f(1)==f( 1 )"]
    );
}

#[test]
fn metavariable_binding_is_reported() {
    let tree = program("log(user.name);");
    let found = find_matches(&pattern("log($ARG)"), &tree, &EngineConfig::default()).unwrap();
    assert_eq!(found.len(), 1);
    let bound = found[0].env.get("ARG").expect("ARG bound");
    assert_eq!(bound.text(&tree), "user.name");
    assert!(matches!(bound, Binding::Node(_)));
}

#[test]
fn variadic_binds_the_absorbed_run() {
    let tree = program("foo(1, 2, 3);\nfoo();");
    let found = find_matches(&pattern("foo($...ARGS)"), &tree, &EngineConfig::default()).unwrap();
    assert_eq!(found.len(), 2);

    let args = found[0].env.get("ARGS").unwrap();
    assert_eq!(args.nodes().len(), 3);
    assert_eq!(args.text(&tree), "1, 2, 3");

    let empty = found[1].env.get("ARGS").unwrap();
    assert!(empty.nodes().is_empty());
    let span = empty.span(&tree);
    assert!(span.is_empty());
    assert_eq!(span.start.line, 2);
    assert_eq!(span.start.column, 5);
}

#[test]
fn variadic_with_fixed_tail() {
    let tree = program("f(a, b, c);");
    let found = find_matches(&pattern("f($...HEAD, c)"), &tree, &EngineConfig::default()).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].env.get("HEAD").unwrap().text(&tree), "a, b");
}

#[test]
fn deep_ellipsis_reaches_nested_expressions() {
    let src = r#"log("a" + secret); log(other); log(f(g(secret))); log(secret);"#;
    assert_eq!(
        matched("log(<... secret ...>)", src),
        vec![r#"log("a" + secret)"#, "log(f(g(secret)))", "log(secret)"]
    );
}

#[test]
fn statement_sequence_matches_contiguous_run() {
    let src = "let f = open(\"a\");\nread(f);\nclose(f);\nlet g = open(\"b\");\nclose(h);\n";
    let found = matched("let $F = open($P);\n...\nclose($F);", src);
    assert_eq!(found.len(), 1);
    assert!(found[0].starts_with("let f = open(\"a\");"));
    assert!(found[0].ends_with("close(f);"));
}

#[test]
fn statement_sequence_inside_function_body() {
    let src = "fn run() {\n  lock(m);\n  work();\n  unlock(m);\n}\n";
    assert_eq!(
        matched("lock($M);\n...\nunlock($M);", src),
        vec!["lock(m);\n  work();\n  unlock(m);"]
    );
}

#[test]
fn object_entries_match_in_any_order() {
    let src = "f({a: 1, b: 2}); f({a: 1}); f({b: 2, a: 1, c: 3});";
    assert_eq!(matched("f({b: 2, a: 1})", src), vec!["f({a: 1, b: 2})"]);
    assert_eq!(
        matched("f({a: 1, ...})", src),
        vec!["f({a: 1, b: 2})", "f({a: 1})", "f({b: 2, a: 1, c: 3})"]
    );
}

#[test]
fn modifiers_are_an_open_unordered_list() {
    let src = "pub async fn handle(req) { send(req); }\nfn helper() {}\nlet x = 1;";
    let found = matched("fn $F(...) { ... }", src);
    assert_eq!(found.len(), 2);
    assert!(found[0].starts_with("pub async fn handle"));
    assert_eq!(found[1], "fn helper() {}");
    assert_eq!(matched("async pub fn $F(...) { ... }", src).len(), 1);
}

#[test]
fn statement_metavariable_matches_any_statement() {
    let src = "if (ok) return 1;\nif (ok) { x(); }\nif (no) return 2;";
    assert_eq!(
        matched("if (ok) $S;", src),
        vec!["if (ok) return 1;", "if (ok) { x(); }"]
    );
}

#[test]
fn lone_metavariable_matches_every_expression() {
    let found = matched("$E", "f(a);");
    assert_eq!(found, vec!["f(a)", "f", "a"]);
}

#[test]
fn search_yields_preorder_without_duplicates() {
    let tree = program("f(f(1));");
    let found = find_matches(&pattern("f(...)"), &tree, &EngineConfig::default()).unwrap();
    let texts: Vec<&str> = found.iter().map(|m| tree.slice(m.span)).collect();
    assert_eq!(texts, vec!["f(f(1))", "f(1)"]);

    // two deep hits inside one call bind nothing, so they collapse
    let found = find_matches(&pattern("g(<... x ...>)"), &program("g(x + x);"), &EngineConfig::default()).unwrap();
    assert_eq!(found.len(), 1);
}

#[test]
fn metavariables_around_ellipsis_need_their_own_arguments() {
    let tree = program("f(a);\nf(a, b);\nf(a, z, b);");
    let found = find_matches(&pattern("f($X, ..., $Y)"), &tree, &EngineConfig::default()).unwrap();
    let seen: Vec<(&str, &str, &str)> = found
        .iter()
        .map(|m| {
            (
                tree.slice(m.span),
                m.env.get("X").unwrap().text(&tree),
                m.env.get("Y").unwrap().text(&tree),
            )
        })
        .collect();
    assert_eq!(seen, vec![("f(a, b)", "a", "b"), ("f(a, z, b)", "a", "b")]);
}

#[test]
fn lone_statement_pattern_matches_expressions() {
    let src = "a(); b;";
    assert_eq!(matched("$X;", src), matched("$X", src));
    assert_eq!(matched("$X;", src), vec!["a()", "a", "b"]);
}

#[test]
fn failing_sequence_head_is_tried_once_per_statement() {
    let src = "x();\n".repeat(2000);
    let cfg = EngineConfig {
        max_steps: Some(50_000),
        ..EngineConfig::default()
    };
    let tree = program(&src);
    assert!(find_matches(&pattern("a();\n...\nb();"), &tree, &cfg)
        .unwrap()
        .is_empty());

    let src = format!("a();\n{}b();\n", "x();\n".repeat(500));
    let found = matched_with("a();\n...\nb();", &program(&src), &cfg);
    assert_eq!(found.len(), 1);
    assert!(found[0].starts_with("a();") && found[0].ends_with("b();"));
}

fn js_matches(pat: &str, src: &str) -> Vec<(String, Vec<String>)> {
    let tree = parsers::parse_source(parsers::Language::JavaScript, "app.js", src).expect("parse");
    let pattern = patterns::compile_pattern(parsers::Language::JavaScript, pat).expect("pattern");
    find_matches(&pattern, &tree, &EngineConfig::default())
        .expect("search")
        .iter()
        .map(|m| {
            let bound = m
                .env
                .iter()
                .map(|(name, value)| format!("{name}={}", value.text(&tree)))
                .collect();
            (tree.slice(m.span).to_string(), bound)
        })
        .collect()
}

#[test]
fn javascript_class_heritage_and_body_ellipsis() {
    let src = "class A extends B { m() {} }\nclass C { n() {} }\n";
    let found = js_matches("class $C extends $B { ... }", src);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].1, vec!["B=B", "C=A"]);

    assert_eq!(js_matches("class $C { ... }", src).len(), 2);
    assert!(js_matches("class $C extends D { ... }", src).is_empty());
}

#[test]
fn javascript_destructuring_patterns_match() {
    let src = "const {a, b: [c]} = obj;\nconst {b: d} = obj;\n";
    let found = js_matches("const {b: $X} = obj;", src);
    let bound: Vec<&[String]> = found.iter().map(|(_, b)| b.as_slice()).collect();
    assert_eq!(bound, vec![&["X=d".to_string()][..]]);

    let found = js_matches("const {b: $X, ...} = obj;", src);
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].1, vec!["X=[c]"]);
    assert_eq!(js_matches("const {b: [c], a} = obj;", src).len(), 1);
}
