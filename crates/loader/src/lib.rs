//! Loads structural-pattern rules from YAML and compiles them into
//! formulas over per-language pattern trees.

use anyhow::Context;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

mod schema;
mod walk;

pub use schema::compiled::{CompiledRule, PatternSet, RuleDiagnostic, RuleSet, Severity};
pub use schema::yaml::YamlRule;
pub use walk::{has_extension, visit};

const RULE_EXTENSIONS: &[&str] = &["yaml", "yml"];

/// Loads a rule file, or every `.yaml`/`.yml` file below a directory.
///
/// Patterns that fail to compile for a language are reported in
/// [`RuleSet::diagnostics`]; duplicate ids, malformed documents and
/// invalid regexes abort loading.
///
/// # Example
/// ```no_run
/// use loader::load_rules;
/// let rules = load_rules(std::path::Path::new("rules")).unwrap();
/// assert!(!rules.rules.is_empty());
/// ```
pub fn load_rules(path: &Path) -> anyhow::Result<RuleSet> {
    let mut rs = RuleSet::default();
    let mut seen_ids: HashSet<String> = HashSet::new();
    let excl = |p: &Path| {
        p.file_name()
            .and_then(|name| name.to_str())
            .map(|name| name == ".git")
            .unwrap_or(false)
    };
    let is_file = path.is_file();
    visit(path, &excl, &mut |file| {
        if !is_file && !has_extension(file, RULE_EXTENSIONS) {
            debug!(file = %file.display(), "Skipping non-rule file");
            return Ok(());
        }
        debug!(file = %file.display(), "Parsing YAML rule");
        let data = fs::read_to_string(file)
            .with_context(|| format!("Failed to read rule file: {}", file.display()))?;
        let source = relative_name(file, path);
        schema::yaml::load_document(&mut rs, &mut seen_ids, &data, Some(&source))
            .with_context(|| format!("Failed to parse rule file: {}", file.display()))
    })?;
    info!(
        rules = rs.rules.len(),
        diagnostics = rs.diagnostics.len(),
        "Rules loaded"
    );
    Ok(rs)
}

/// Loads rules from an in-memory YAML document. `source` names the
/// document in diagnostics.
pub fn load_rules_str(yaml: &str, source: Option<&str>) -> anyhow::Result<RuleSet> {
    let mut rs = RuleSet::default();
    let mut seen_ids = HashSet::new();
    schema::yaml::load_document(&mut rs, &mut seen_ids, yaml, source)?;
    Ok(rs)
}

/// Merges several rule sets, rejecting ids defined more than once.
pub fn merge(sets: Vec<RuleSet>) -> anyhow::Result<RuleSet> {
    let mut out = RuleSet::default();
    let mut seen = HashSet::new();
    for set in sets {
        if let Some(dup) = set.rules.iter().find(|r| !seen.insert(r.id.clone())) {
            anyhow::bail!("duplicate rule id: {}", dup.id);
        }
        out.extend(set);
    }
    Ok(out)
}

fn relative_name(file: &Path, base: &Path) -> String {
    file.strip_prefix(base)
        .ok()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(file)
        .to_string_lossy()
        .into_owned()
}
