//! Synthetic sources and rules shared by the benchmarks.

use std::fmt::Write;

/// Rules exercising the main formula operators on the generated programs.
pub const RULES: &str = r#"rules:
  - id: unchecked-open
    languages: [generic]
    severity: HIGH
    message: $F opened without close
    patterns:
      - pattern: open($F, ...)
      - pattern-inside: |
          fn $NAME(...) { ... }
      - pattern-not-inside: |
          fn $NAME(...) { ...; close($H); ... }
  - id: self-compare
    languages: [generic]
    severity: LOW
    message: $X compared with itself
    pattern: $X == $X
  - id: debug-call
    languages: [generic]
    severity: INFO
    message: debug output
    pattern-either:
      - pattern: print(...)
      - pattern: log.debug(...)
  - id: secret-name
    languages: [generic]
    severity: MEDIUM
    message: secret stored in $V
    patterns:
      - pattern: let $V = $E;
      - metavariable-regex:
          metavariable: $V
          regex: (?i)secret|token
"#;

/// A program with `functions` functions mixing the constructs the rules
/// look for. Sizes grow linearly with `functions`.
pub fn generic_program(functions: usize) -> String {
    let mut src = String::new();
    for i in 0..functions {
        let _ = writeln!(src, "fn handler_{i}(req, res) {{");
        let _ = writeln!(src, "    let token_{i} = req.header(\"x-{i}\");");
        let _ = writeln!(src, "    let f = open(req.path, \"r\", {i});");
        if i % 3 == 0 {
            let _ = writeln!(src, "    close(f);");
        }
        let _ = writeln!(src, "    if (req.id == req.id) {{ print(\"same\", {i}); }}");
        let _ = writeln!(src, "    for item in req.items {{ log.debug(item, {i}); }}");
        let _ = writeln!(src, "    return res.send(f.read(), {{ status: 200, id: {i} }});");
        let _ = writeln!(src, "}}");
    }
    src
}

/// A single call with `args` identical arguments, the worst case for
/// patterns with several ellipses.
pub fn wide_call(args: usize) -> String {
    format!("g({});\n", vec!["a"; args].join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_parse_and_rules_load() {
        let src = generic_program(4);
        parsers::parse_source(parsers::Language::Generic, "bench.gen", &src).unwrap();
        parsers::parse_source(parsers::Language::Generic, "wide.gen", &wide_call(8)).unwrap();
        let rules = loader::load_rules_str(RULES, Some("bench.yaml")).unwrap();
        assert_eq!(rules.len(), 4);
        assert!(rules.diagnostics.is_empty());
    }
}
