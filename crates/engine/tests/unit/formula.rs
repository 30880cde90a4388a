use super::*;

fn texts(found: &[Finding]) -> Vec<&str> {
    found.iter().map(|f| f.excerpt.as_str()).collect()
}

#[test]
fn single_pattern_interpolates_message() {
    let found = findings(
        r#"rules:
- id: exec.call
  severity: HIGH
  message: exec of $CMD with $UNBOUND
  pattern: exec($CMD)
"#,
        "exec(user_cmd);",
    );
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].message, "exec of user_cmd with $UNBOUND");
    assert_eq!(found[0].severity, Severity::High);
    assert_eq!(found[0].bindings["CMD"].text, "user_cmd");
    assert_eq!(found[0].rule_file.as_deref(), Some("test.yaml"));
    assert_eq!(found[0].location.start_line, 1);
    assert_eq!(found[0].location.start_column, 1);
}

#[test]
fn pattern_not_removes_overlapping_matches() {
    let found = findings(
        r#"rules:
- id: exec.unsafe
  message: m
  patterns:
    - pattern: exec($X)
    - pattern-not: exec("ls")
"#,
        "exec(cmd);\nexec(\"ls\");\nexec(other);",
    );
    assert_eq!(texts(&found), vec!["exec(cmd)", "exec(other)"]);
}

#[test]
fn pattern_either_is_a_union() {
    let found = findings(
        r#"rules:
- id: weak.hash
  message: weak hash $X
  pattern-either:
    - pattern: md5($X)
    - pattern: sha1($X)
"#,
        "md5(a);\nsha256(b);\nsha1(c);",
    );
    assert_eq!(texts(&found), vec!["md5(a)", "sha1(c)"]);
    assert_eq!(found[1].message, "weak hash c");
}

#[test]
fn pattern_inside_restricts_to_enclosing_context() {
    let found = findings(
        r#"rules:
- id: eval.in.fn
  message: eval in $F
  patterns:
    - pattern-inside: |
        fn $F(...) { ... }
    - pattern: eval($X)
"#,
        "eval(a);\nfn run() {\n  eval(b);\n}\n",
    );
    assert_eq!(texts(&found), vec!["eval(b)"]);
    assert_eq!(found[0].message, "eval in run");
    assert_eq!(found[0].bindings["X"].text, "b");
}

#[test]
fn pattern_inside_picks_the_innermost_context() {
    let found = findings(
        r#"rules:
- id: nested
  message: in $F
  patterns:
    - pattern-inside: |
        fn $F(...) { ... }
    - pattern: eval($X)
"#,
        "fn outer() {\n  fn inner() {\n    eval(x);\n  }\n}\n",
    );
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].message, "in inner");
}

#[test]
fn pattern_not_inside_drops_guarded_matches() {
    let found = findings(
        r#"rules:
- id: log.outside.test
  message: m
  patterns:
    - pattern: log($X)
    - pattern-not-inside: |
        fn test(...) { ... }
"#,
        "log(a);\nfn test() {\n  log(b);\n}\nfn prod() {\n  log(c);\n}\n",
    );
    assert_eq!(texts(&found), vec!["log(a)", "log(c)"]);
}

#[test]
fn conjunction_joins_environments_across_ranges() {
    let found = findings(
        r#"rules:
- id: tainted.exec
  message: $V flows into exec
  patterns:
    - pattern: let $V = input();
    - pattern: exec($V);
"#,
        "let a = input();\nexec(a);\nlet b = input();\nexec(c);\n",
    );
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].excerpt, "let a = input();");
    assert_eq!(found[0].message, "a flows into exec");
}

#[test]
fn metavariable_regex_filters_bindings() {
    let found = findings(
        r#"rules:
- id: weak.hash
  message: m
  patterns:
    - pattern: $F($X)
    - metavariable-regex:
        metavariable: $F
        regex: ^(md5|sha1)$
"#,
        "md5(a);\nsha256(b);\nsha1(c);\nmy_md5(d);",
    );
    assert_eq!(texts(&found), vec!["md5(a)", "sha1(c)"]);
}

#[test]
fn metavariable_pattern_searches_inside_the_binding() {
    let found = findings(
        r#"rules:
- id: sql.concat
  message: query built from $B
  patterns:
    - pattern: query($Q)
    - metavariable-pattern:
        metavariable: $Q
        pattern: $A + $B
"#,
        "query(\"select \" + id);\nquery(\"static\");\nquery(build(\"a\" + name));",
    );
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].message, "query built from id");
    assert_eq!(found[1].message, "query built from name");
    assert_eq!(found[0].bindings["A"].text, "\"select \"");
}

#[test]
fn focus_narrows_the_reported_range() {
    let found = findings(
        r#"rules:
- id: secret.var
  message: m
  patterns:
    - pattern: let $V = secret($X);
    - focus-metavariable: $V
"#,
        "let key = secret(\"k\");",
    );
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].excerpt, "key");
    assert_eq!(found[0].location.start_column, 5);
    assert_eq!(found[0].location.end_column, 8);
}

#[test]
fn results_are_sorted_by_range() {
    let found = findings(
        r#"rules:
- id: any.call
  message: m
  pattern-either:
    - pattern: b()
    - pattern: a()
"#,
        "a();\nb();\na();",
    );
    let lines: Vec<usize> = found.iter().map(|f| f.location.start_line).collect();
    assert_eq!(lines, vec![1, 2, 3]);
}

#[test]
fn evaluate_reports_every_environment() {
    let tree = program("pair(a, b);");
    let rs = rules(
        r#"rules:
- id: pair
  message: m
  patterns:
    - pattern: pair($X, $Y)
    - pattern: $Z
"#,
    );
    let rule = &rs.rules[0];
    let index = ir::AncestorIndex::build(&tree);
    let budget = Budget::unlimited();
    let ctx = EvalContext {
        tree: &tree,
        index: &index,
        patterns: rule.patterns_for(parsers::Language::Generic).unwrap(),
        policy: Default::default(),
        budget: &budget,
    };
    let operands = ctx.collect(&rule.formula).unwrap();
    let out = evaluate(&rule.formula, &operands, &ctx).unwrap();
    // one environment per expression bound to Z, all at the call's range
    assert_eq!(out.len(), 4);
    assert!(out.iter().all(|m| tree.slice(m.span) == "pair(a, b)"));
    let zs: Vec<&str> = out
        .iter()
        .map(|m| m.env.get("Z").unwrap().text(&tree))
        .collect();
    assert_eq!(zs, vec!["a", "b", "pair", "pair(a, b)"]);
}
