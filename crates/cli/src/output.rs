use clap::ValueEnum;
use colored::{ColoredString, Colorize};
use engine::{BoundValue, Finding, Severity};
use ir::Location;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};

/// Supported output formats for scan results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// The file could not be read or parsed.
    Parse,
    /// A rule ran out of time or steps on the file.
    Timeout,
    /// The matcher met a tree it cannot handle.
    Internal,
}

/// A file or (rule, file) pair that produced no result.
#[derive(Debug, Clone, Serialize)]
pub struct ScanError {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanInfo {
    pub rules_loaded: usize,
    pub files_analyzed: usize,
    pub failed_files: usize,
    pub duration_ms: u64,
}

/// One hit of an ad-hoc pattern.
#[derive(Debug, Clone, Serialize)]
pub struct MatchRecord {
    pub location: Location,
    pub excerpt: String,
    pub bindings: BTreeMap<String, BoundValue>,
}

#[derive(Serialize)]
struct FindingsOut<'a> {
    findings: &'a [Finding],
    errors: &'a [ScanError],
    total: usize,
    stats: &'a ScanInfo,
}

#[derive(Serialize)]
struct MatchesOut<'a> {
    matches: &'a [MatchRecord],
    errors: &'a [ScanError],
    total: usize,
}

fn color_severity(sev: Severity) -> ColoredString {
    let text = sev.to_string();
    match sev {
        Severity::Info | Severity::Low => text.green(),
        Severity::Medium => text.yellow(),
        Severity::High | Severity::Error | Severity::Critical => text.red(),
    }
}

fn write_errors<W: Write>(out: &mut W, errors: &[ScanError]) -> io::Result<()> {
    if errors.is_empty() {
        return Ok(());
    }
    writeln!(out, "{}", "Errors:".bright_red().bold())?;
    for e in errors {
        let kind = match e.kind {
            ErrorKind::Parse => "parse",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Internal => "internal",
        };
        match &e.rule_id {
            Some(rule) => writeln!(out, "  • [{kind}] {} {rule}: {}", e.path, e.message)?,
            None => writeln!(out, "  • [{kind}] {}: {}", e.path, e.message)?,
        }
    }
    writeln!(out)
}

pub fn write_findings<W: Write>(
    out: &mut W,
    findings: &[Finding],
    errors: &[ScanError],
    fmt: Format,
    info: &ScanInfo,
) -> io::Result<()> {
    match fmt {
        Format::Text => {
            writeln!(
                out,
                "Scanned {} files with {} rules in {} ms\n",
                info.files_analyzed, info.rules_loaded, info.duration_ms
            )?;
            write_errors(out, errors)?;
            if findings.is_empty() {
                writeln!(out, "✔ No issues found.")?;
                return Ok(());
            }
            for f in findings {
                writeln!(
                    out,
                    "{} {}:{}:{} {}",
                    color_severity(f.severity),
                    f.location.path,
                    f.location.start_line,
                    f.location.start_column,
                    f.rule_id.bold()
                )?;
                writeln!(out, "    {}", f.message)?;
                writeln!(out, "    ↳  {}", f.excerpt.trim())?;
                writeln!(out)?;
            }
            writeln!(out, "Total: {}", findings.len())?;
        }
        Format::Json => {
            let json = FindingsOut {
                findings,
                errors,
                total: findings.len(),
                stats: info,
            };
            serde_json::to_writer_pretty(&mut *out, &json)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

pub fn write_matches<W: Write>(
    out: &mut W,
    matches: &[MatchRecord],
    errors: &[ScanError],
    fmt: Format,
) -> io::Result<()> {
    match fmt {
        Format::Text => {
            write_errors(out, errors)?;
            for m in matches {
                writeln!(
                    out,
                    "{}:{}:{}: {}",
                    m.location.path, m.location.start_line, m.location.start_column, m.excerpt
                )?;
                for (name, value) in &m.bindings {
                    writeln!(out, "    ${name} = {}", value.text)?;
                }
            }
        }
        Format::Json => {
            let json = MatchesOut {
                matches,
                errors,
                total: matches.len(),
            };
            serde_json::to_writer_pretty(&mut *out, &json)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

pub fn print_findings(
    findings: &[Finding],
    errors: &[ScanError],
    fmt: Format,
    info: &ScanInfo,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_findings(&mut out, findings, errors, fmt, info)?;
    Ok(())
}

pub fn print_matches(
    matches: &[MatchRecord],
    errors: &[ScanError],
    fmt: Format,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_matches(&mut out, matches, errors, fmt)?;
    Ok(())
}
