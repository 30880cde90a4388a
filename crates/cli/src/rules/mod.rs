use anyhow::{Context, Result};
use colored::*;
use loader::{has_extension, visit, RuleDiagnostic, RuleSet, Severity};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::{init_logging, EXIT_FINDINGS};

#[derive(Debug, Clone)]
struct RuleError {
    file_path: String,
    error_message: String,
}

/// Outcome of loading every rule file on its own.
#[derive(Debug, Default)]
pub struct Verification {
    pub files: Vec<PathBuf>,
    pub rules: RuleSet,
    errors: Vec<RuleError>,
    duplicate_rules: HashMap<String, Vec<String>>,
}

impl Verification {
    pub fn diagnostics(&self) -> &[RuleDiagnostic] {
        &self.rules.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty() || !self.duplicate_rules.is_empty()
    }

    fn print_errors(&self, full: bool) {
        if !self.errors.is_empty() {
            println!();
            println!("{}", "Errors found:".bright_red().bold());
            for (i, error) in self.errors.iter().enumerate() {
                if full || i < 10 {
                    println!(
                        "  {} {}: {}",
                        "•".bright_red(),
                        error.file_path.bright_white(),
                        error.error_message.bright_red()
                    );
                } else {
                    println!(
                        "  {} {} more errors...",
                        "•".bright_red(),
                        (self.errors.len() - 10).to_string().bright_yellow()
                    );
                    break;
                }
            }
        }
        if !self.duplicate_rules.is_empty() {
            println!();
            println!("{}", "Duplicate rule IDs found:".bright_red().bold());
            let mut ids: Vec<_> = self.duplicate_rules.iter().collect();
            ids.sort();
            for (rule_id, files) in ids {
                println!(
                    "  {} Rule ID '{}' found in:",
                    "•".bright_red(),
                    rule_id.bright_white().bold()
                );
                for file in files {
                    println!("    - {}", file.bright_cyan());
                }
            }
        }
    }
}

/// Loads rule files one by one so that a broken file does not hide the
/// problems of the others. Ids defined in more than one file are
/// reported together with every defining file.
pub fn collect_rules(path: &Path) -> Result<Verification> {
    let mut v = Verification::default();
    let is_file = path.is_file();
    let excl = |p: &Path| p.ends_with(".git");
    visit(path, &excl, &mut |file: &Path| {
        if is_file || has_extension(file, &["yaml", "yml"]) {
            v.files.push(file.to_path_buf());
        }
        Ok(())
    })
    .with_context(|| format!("failed to read {}", path.display()))?;

    let mut owners: HashMap<String, Vec<String>> = HashMap::new();
    for file in &v.files {
        let name = file.display().to_string();
        match loader::load_rules(file) {
            Ok(set) => {
                for rule in &set.rules {
                    owners.entry(rule.id.clone()).or_default().push(name.clone());
                }
                v.rules.rules.extend(set.rules);
                v.rules.diagnostics.extend(set.diagnostics);
            }
            Err(err) => v.errors.push(RuleError {
                file_path: name,
                error_message: format!("{err:#}"),
            }),
        }
    }
    v.duplicate_rules = owners.into_iter().filter(|(_, f)| f.len() > 1).collect();
    let duplicates = &v.duplicate_rules;
    v.rules.rules.retain(|r| !duplicates.contains_key(&r.id));
    Ok(v)
}

fn severity_label(severity: Severity) -> ColoredString {
    let label = severity.to_string().to_lowercase();
    match severity {
        Severity::Critical | Severity::Error => label.bright_red(),
        Severity::High => label.bright_magenta(),
        Severity::Medium => label.bright_yellow(),
        Severity::Low => label.bright_blue(),
        Severity::Info => label.bright_cyan(),
    }
}

/// Prints what loaded, what failed and which patterns were skipped.
/// Exits with status 1 when anything needs attention.
pub fn verify_rules(path: &Path, full: bool) -> Result<ExitCode> {
    init_logging(false, true);
    println!("{}", "Verifying rules...".bright_blue().bold());
    println!("Path: {}", path.display().to_string().bright_white());
    let v = collect_rules(path)?;

    if !v.files.is_empty() {
        println!();
        println!("{}", "Rule files found:".bright_cyan().bold());
        for (i, file) in v.files.iter().enumerate() {
            if full || i < 5 {
                println!("  {} {}", "•".bright_white(), file.display());
            } else {
                println!(
                    "  {} {} more files...",
                    "•".bright_white(),
                    (v.files.len() - 5).to_string().bright_yellow()
                );
                break;
            }
        }
    }

    if v.has_errors() {
        v.print_errors(full);
    }

    if !v.diagnostics().is_empty() {
        println!();
        println!("{}", "Patterns skipped:".bright_yellow().bold());
        for d in v.diagnostics() {
            println!("  {} {}", "•".bright_yellow(), d);
        }
    }

    let rule_count = v.rules.len();
    if rule_count > 0 {
        println!();
        println!("{}", "Rules loaded:".bright_cyan().bold());
        for (i, rule) in v.rules.rules.iter().enumerate() {
            if full || i < 5 {
                let languages: Vec<&str> = rule.patterns.keys().map(|l| l.as_str()).collect();
                println!(
                    "  {} {} ({}) [{}]",
                    "•".bright_white(),
                    rule.id.bright_white().bold(),
                    severity_label(rule.severity),
                    languages.join(", ")
                );
                if full {
                    println!("      {}", rule.formula);
                }
            } else {
                println!(
                    "  {} {} more rules...",
                    "•".bright_white(),
                    (rule_count - 5).to_string().bright_yellow()
                );
                break;
            }
        }
    }

    println!();
    println!("{}", "Statistics:".bright_cyan().bold());
    println!("  Rule files: {}", v.files.len().to_string().bright_yellow());
    println!("  Rules loaded: {}", rule_count.to_string().bright_yellow());
    println!(
        "  Patterns skipped: {}",
        v.diagnostics().len().to_string().bright_yellow()
    );

    if v.has_errors() || !v.diagnostics().is_empty() {
        println!();
        println!("{}", "Issues found during rule loading".bright_yellow().bold());
        Ok(ExitCode::from(EXIT_FINDINGS))
    } else {
        println!();
        println!("{}", "Rules loaded successfully".bright_green().bold());
        Ok(ExitCode::SUCCESS)
    }
}
