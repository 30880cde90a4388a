use anyhow::{Context, Result};
use engine::{
    analyze_trees, find_matches, BoundValue, EngineConfig, EngineMetrics, FileReport, Finding,
    FindingCache, MatchError, RuleOutcome,
};
use ir::{Location, Tree};
use loader::{visit, RuleSet};
use parsers::Language;
use patterns::PatternCache;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::args::{EngineArgs, MatchArgs, ScanArgs};
use crate::config::load_config;
use crate::output::{self, ErrorKind, MatchRecord, ScanError, ScanInfo};
use crate::{default_excludes, init_logging, is_excluded, EXIT_ERROR, EXIT_FINDINGS};

fn configure_threads(threads: Option<usize>) {
    if let Some(n) = threads {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
        {
            error!("Failed to build global thread pool: {e}");
        }
    }
}

fn engine_config(args: &EngineArgs) -> Result<EngineConfig> {
    let config = load_config(args.config.as_deref()).context("failed to load configuration")?;
    let cfg = config.engine_config(args);
    debug!(?cfg, "Engine configuration");
    configure_threads(cfg.threads);
    Ok(cfg)
}

/// Loads every rule path and merges them into one set. Rule ids must be
/// unique across all of them.
pub fn load_rule_sets(paths: &[PathBuf]) -> Result<RuleSet> {
    let mut sets = Vec::with_capacity(paths.len());
    for path in paths {
        let set = loader::load_rules(path)
            .with_context(|| format!("failed to load rules from {}", path.display()))?;
        debug!(path = %path.display(), rules = set.len(), "Rule set loaded");
        sets.push(set);
    }
    loader::merge(sets)
}

/// Files under `root` paired with the language they are parsed as.
///
/// A single file is parsed as `lang` whatever its extension. While walking
/// a directory only files whose extension maps to a language are kept,
/// and with `lang` set only files of that language.
pub fn collect_files(
    root: &Path,
    lang: Option<Language>,
    args: &EngineArgs,
) -> Result<Vec<(PathBuf, Language)>> {
    let mut patterns = args.exclude.clone();
    if !args.no_default_exclude {
        patterns.extend(default_excludes());
    }
    if root.is_file() {
        return Ok(lang
            .or_else(|| Language::from_path(root))
            .map(|l| vec![(root.to_path_buf(), l)])
            .unwrap_or_default());
    }
    let mut files = Vec::new();
    let excludes = |p: &Path| is_excluded(p, &patterns, args.max_file_size);
    visit(root, &excludes, &mut |p: &Path| {
        match Language::from_path(p) {
            Some(detected) if lang.map_or(true, |l| l == detected) => {
                files.push((p.to_path_buf(), detected));
            }
            _ => {}
        }
        Ok(())
    })
    .with_context(|| format!("failed to walk {}", root.display()))?;
    Ok(files)
}

/// Parses files in parallel, keeping input order. Unreadable or
/// unparsable files become errors instead of aborting the run.
pub fn parse_all(files: &[(PathBuf, Language)]) -> (Vec<Tree>, Vec<ScanError>) {
    let parsed: Vec<Result<Option<Tree>, ScanError>> = files
        .par_iter()
        .map(|(path, lang)| {
            parsers::parse_file(path, Some(*lang)).map_err(|err| {
                warn!(file = %path.display(), "Failed to parse: {err:#}");
                ScanError {
                    path: path.to_string_lossy().into_owned(),
                    rule_id: None,
                    kind: ErrorKind::Parse,
                    message: format!("{err:#}"),
                }
            })
        })
        .collect();
    let mut trees = Vec::with_capacity(parsed.len());
    let mut errors = Vec::new();
    for item in parsed {
        match item {
            Ok(Some(tree)) => trees.push(tree),
            Ok(None) => {}
            Err(e) => errors.push(e),
        }
    }
    (trees, errors)
}

/// Timeouts and internal errors of every (rule, file) pair.
pub fn report_errors(reports: &[FileReport]) -> Vec<ScanError> {
    let mut errors = Vec::new();
    for file in reports {
        for rule in &file.rules {
            let (kind, message) = match &rule.outcome {
                RuleOutcome::Completed(_) => continue,
                RuleOutcome::TimedOut { elapsed_ms } => {
                    (ErrorKind::Timeout, format!("timed out after {elapsed_ms} ms"))
                }
                RuleOutcome::Internal(v) => (ErrorKind::Internal, v.to_string()),
            };
            errors.push(ScanError {
                path: file.path.clone(),
                rule_id: Some(rule.rule_id.clone()),
                kind,
                message,
            });
        }
    }
    errors
}

fn exit_code(has_results: bool, errors: &[ScanError]) -> ExitCode {
    if errors.iter().any(|e| e.kind == ErrorKind::Internal) {
        ExitCode::from(EXIT_ERROR)
    } else if has_results {
        ExitCode::from(EXIT_FINDINGS)
    } else {
        ExitCode::SUCCESS
    }
}

pub fn run_scan(args: ScanArgs) -> Result<ExitCode> {
    init_logging(args.engine.debug, args.engine.quiet);
    let started = Instant::now();
    let cfg = engine_config(&args.engine)?;
    info!(target = %args.path.display(), "Scan started");

    let rules = load_rule_sets(&args.rules)?;
    for diagnostic in &rules.diagnostics {
        warn!("{diagnostic}");
    }
    info!(rules = rules.len(), "Rules loaded");

    let files = collect_files(&args.path, args.lang, &args.engine)?;
    info!(files = files.len(), "Files queued");
    let (trees, mut errors) = parse_all(&files);

    let mut cache = args.cache.as_deref().map(FindingCache::load);
    let reports = analyze_trees(&trees, &rules, &cfg, cache.as_mut());
    if let (Some(cache), Some(path)) = (&cache, &args.cache) {
        if let Err(err) = cache.save(path) {
            warn!("Failed to write cache: {err:#}");
        }
    }

    let mut findings: Vec<Finding> = reports
        .iter()
        .flat_map(|r| r.findings().cloned())
        .collect();
    findings.sort_by(|a, b| {
        a.location
            .cmp(&b.location)
            .then_with(|| a.rule_id.cmp(&b.rule_id))
    });
    errors.extend(report_errors(&reports));

    if let Some(path) = &args.metrics {
        let metrics = EngineMetrics::from_reports(&reports);
        let data = serde_json::to_string_pretty(&metrics).context("failed to serialize metrics")?;
        fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))?;
    }

    let info = ScanInfo {
        rules_loaded: rules.len(),
        files_analyzed: trees.len(),
        failed_files: files.len() - trees.len(),
        duration_ms: started.elapsed().as_millis() as u64,
    };
    info!(
        findings = findings.len(),
        errors = errors.len(),
        duration_ms = info.duration_ms,
        "Scan completed"
    );
    output::print_findings(&findings, &errors, args.format, &info)?;
    Ok(exit_code(!findings.is_empty(), &errors))
}

fn match_record(tree: &Tree, m: &engine::Match) -> MatchRecord {
    let bindings = m
        .env
        .iter()
        .map(|(name, value)| {
            let bound = BoundValue {
                text: value.text(tree).to_string(),
                location: Location::resolve(tree, value.span(tree)),
            };
            (name.to_string(), bound)
        })
        .collect::<BTreeMap<_, _>>();
    MatchRecord {
        location: Location::resolve(tree, m.span),
        excerpt: tree
            .slice(m.span)
            .lines()
            .next()
            .unwrap_or_default()
            .trim_end()
            .to_string(),
        bindings,
    }
}

pub fn run_match(args: MatchArgs) -> Result<ExitCode> {
    init_logging(args.engine.debug, args.engine.quiet);
    let cfg = engine_config(&args.engine)?;
    let pattern = PatternCache::global()
        .get_or_compile(args.lang, &args.pattern)
        .with_context(|| format!("invalid pattern `{}`", args.pattern))?;
    debug!(metavariables = ?pattern.metavariables, "Pattern compiled");

    let files = collect_files(&args.path, Some(args.lang), &args.engine)?;
    let (trees, mut errors) = parse_all(&files);
    let results: Vec<Result<Vec<MatchRecord>, ScanError>> = trees
        .par_iter()
        .map(|tree| match find_matches(&pattern, tree, &cfg) {
            Ok(found) => Ok(found.iter().map(|m| match_record(tree, m)).collect()),
            Err(err) => {
                let kind = match err {
                    MatchError::Timeout { .. } => ErrorKind::Timeout,
                    MatchError::Invariant(_) => ErrorKind::Internal,
                };
                warn!(file = tree.path(), "{err}");
                Err(ScanError {
                    path: tree.path().to_string(),
                    rule_id: None,
                    kind,
                    message: err.to_string(),
                })
            }
        })
        .collect();

    let mut matches = Vec::new();
    for result in results {
        match result {
            Ok(found) => matches.extend(found),
            Err(e) => errors.push(e),
        }
    }
    info!(files = trees.len(), matches = matches.len(), "Search completed");
    output::print_matches(&matches, &errors, args.format)?;
    Ok(exit_code(!matches.is_empty(), &errors))
}
