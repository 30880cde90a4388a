use assert_cmd::prelude::*;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

const RULES: &str = r#"rules:
  - id: no-eval
    languages: [generic, javascript]
    severity: HIGH
    message: eval called with $X
    pattern: eval($X)
"#;

fn write_project(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all(root.join("src"))?;
    fs::write(
        root.join("src/app.gen"),
        "fn main() {\n    eval(input);\n    print(input);\n}\n",
    )?;
    fs::write(root.join("src/clean.gen"), "let x = 1;\n")?;
    fs::write(root.join("src/web.js"), "eval(location.hash);\n")?;
    fs::write(root.join("rules.yaml"), RULES)?;
    Ok(())
}

fn scan(root: &Path) -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("structgrep")?;
    cmd.arg("scan")
        .arg(root.join("src"))
        .arg("--rules")
        .arg(root.join("rules.yaml"));
    Ok(cmd)
}

#[test]
fn findings_set_exit_code_one() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    write_project(tmp.path())?;
    scan(tmp.path())?
        .assert()
        .code(1)
        .stdout(
            contains("app.gen:2:5")
                .and(contains("no-eval"))
                .and(contains("eval called with input"))
                .and(contains("web.js:1:1"))
                .and(contains("Total: 2")),
        );
    Ok(())
}

#[test]
fn clean_tree_exits_zero() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    write_project(tmp.path())?;
    Command::cargo_bin("structgrep")?
        .arg("scan")
        .arg(tmp.path().join("src/clean.gen"))
        .arg("--rules")
        .arg(tmp.path().join("rules.yaml"))
        .assert()
        .success()
        .stdout(contains("No issues found"));
    Ok(())
}

#[test]
fn json_output_is_sorted_by_file_and_range() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    write_project(tmp.path())?;
    fs::write(
        tmp.path().join("src/app.gen"),
        "eval(b);\neval(a);\n",
    )?;
    let output = scan(tmp.path())?.arg("--format").arg("json").output()?;
    assert_eq!(output.status.code(), Some(1));
    let json: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(json["total"], 3);
    let findings = json["findings"].as_array().unwrap();
    let places: Vec<(String, u64)> = findings
        .iter()
        .map(|f| {
            let loc = &f["location"];
            let file = Path::new(loc["path"].as_str().unwrap())
                .file_name()
                .unwrap()
                .to_string_lossy()
                .into_owned();
            (file, loc["start_line"].as_u64().unwrap())
        })
        .collect();
    assert_eq!(
        places,
        vec![
            ("app.gen".to_string(), 1),
            ("app.gen".to_string(), 2),
            ("web.js".to_string(), 1),
        ]
    );
    assert_eq!(findings[1]["bindings"]["X"]["text"], "a");
    assert_eq!(findings[0]["severity"], "HIGH");
    Ok(())
}

#[test]
fn lang_flag_restricts_the_walk() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    write_project(tmp.path())?;
    scan(tmp.path())?
        .arg("--lang")
        .arg("js")
        .assert()
        .code(1)
        .stdout(contains("web.js").and(contains("app.gen").not()));
    Ok(())
}

#[test]
fn rule_sets_are_merged() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    write_project(tmp.path())?;
    fs::write(
        tmp.path().join("more.yaml"),
        "rules:\n  - id: no-print\n    languages: [generic]\n    severity: LOW\n    message: print\n    pattern: print(...)\n",
    )?;
    scan(tmp.path())?
        .arg("--rules")
        .arg(tmp.path().join("more.yaml"))
        .assert()
        .code(1)
        .stdout(contains("no-print").and(contains("app.gen:3:5")));
    Ok(())
}

#[test]
fn duplicate_ids_across_rule_sets_fail() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    write_project(tmp.path())?;
    scan(tmp.path())?
        .arg("--rules")
        .arg(tmp.path().join("rules.yaml"))
        .assert()
        .code(2)
        .stderr(contains("duplicate rule id: no-eval"));
    Ok(())
}

#[test]
fn parse_errors_are_reported_not_fatal() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    write_project(tmp.path())?;
    fs::write(tmp.path().join("src/broken.gen"), "let = ;\n")?;
    scan(tmp.path())?
        .arg("--format")
        .arg("json")
        .assert()
        .code(1)
        .stdout(contains("\"kind\": \"parse\"").and(contains("broken.gen")));
    Ok(())
}

#[test]
fn step_budget_reports_timeouts() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let args = vec!["a"; 40].join(", ");
    fs::create_dir(tmp.path().join("src"))?;
    fs::write(tmp.path().join("src/big.gen"), format!("g({args});\n"))?;
    fs::write(
        tmp.path().join("rules.yaml"),
        "rules:\n  - id: slow\n    languages: [generic]\n    severity: LOW\n    message: slow\n    pattern: g(..., $X, ..., $Y, ..., $X, ...)\n",
    )?;
    scan(tmp.path())?
        .arg("--max-steps")
        .arg("100")
        .arg("--format")
        .arg("json")
        .assert()
        .success()
        .stdout(contains("\"kind\": \"timeout\"").and(contains("\"rule_id\": \"slow\"")));
    Ok(())
}

#[test]
fn metrics_and_cache_files_are_written() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    write_project(tmp.path())?;
    let cache = tmp.path().join("cache.json");
    let metrics = tmp.path().join("metrics.json");
    for _ in 0..2 {
        scan(tmp.path())?
            .arg("--cache")
            .arg(&cache)
            .arg("--metrics")
            .arg(&metrics)
            .assert()
            .code(1);
    }
    assert!(cache.exists());
    let metrics: Value = serde_json::from_str(&fs::read_to_string(&metrics)?)?;
    assert_eq!(metrics["findings"], 2);
    assert_eq!(metrics["cache_hits"], 3);
    Ok(())
}

#[test]
fn quiet_hides_info_logs() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    write_project(tmp.path())?;
    scan(tmp.path())?
        .env_remove("RUST_LOG")
        .assert()
        .stderr(contains("Scan started").and(contains("Files queued")));
    scan(tmp.path())?
        .env_remove("RUST_LOG")
        .arg("--quiet")
        .assert()
        .stderr(contains("Scan started").not());
    Ok(())
}

#[test]
fn missing_rules_flag_is_a_usage_error() -> Result<(), Box<dyn std::error::Error>> {
    Command::cargo_bin("structgrep")?
        .arg("scan")
        .arg(".")
        .assert()
        .failure()
        .stderr(contains("--rules"));
    Ok(())
}
