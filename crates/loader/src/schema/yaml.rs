//! YAML rule documents and their translation into rule formulas.

use crate::schema::compiled::{log_rule_summary, CompiledRule, RuleDiagnostic, RuleSet, Severity};
use anyhow::{anyhow, bail, Context};
use parsers::Language;
use patterns::{is_metavariable_name, Formula, PatternCache, PatternId, Predicate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value as YamlValue};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
/// One entry of a rule file's `rules` list.
pub struct YamlRule {
    pub id: String,
    pub message: Option<String>,
    pub severity: Option<String>,
    #[serde(default, deserialize_with = "crate::schema::deserialize_languages")]
    pub languages: Option<Vec<String>>,
    pub pattern: Option<String>,
    pub patterns: Option<Vec<YamlValue>>,
    #[serde(rename = "pattern-either")]
    pub pattern_either: Option<Vec<YamlValue>>,
}

/// Loads every rule of one YAML document into `rs`.
pub(crate) fn load_document(
    rs: &mut RuleSet,
    seen: &mut HashSet<String>,
    data: &str,
    source_file: Option<&str>,
) -> anyhow::Result<()> {
    let doc: YamlValue = serde_yaml::from_str(data)?;
    let Some(rules) = doc.get("rules").and_then(|v| v.as_sequence()) else {
        debug!(file = ?source_file, "Document has no `rules` list");
        return Ok(());
    };
    for raw in rules {
        let yr: YamlRule = serde_yaml::from_value(raw.clone())?;
        if !seen.insert(yr.id.clone()) {
            bail!("duplicate rule id: {}", yr.id);
        }
        let hash = blake3::hash(serde_yaml::to_string(raw)?.as_bytes())
            .to_hex()
            .to_string();
        let id = yr.id.clone();
        compile_yaml_rule(rs, yr, source_file, hash)
            .with_context(|| format!("invalid rule `{id}`"))?;
    }
    Ok(())
}

fn compile_yaml_rule(
    rs: &mut RuleSet,
    yr: YamlRule,
    source_file: Option<&str>,
    hash: String,
) -> anyhow::Result<()> {
    let severity: Severity = yr
        .severity
        .as_deref()
        .unwrap_or("MEDIUM")
        .parse()
        .map_err(|e: String| anyhow!(e))?;
    let languages = parse_languages(yr.languages.as_deref())?;

    let mut builder = FormulaBuilder::default();
    let formula = match (&yr.pattern, &yr.patterns, &yr.pattern_either) {
        (Some(p), None, None) => builder.leaf(p),
        (None, Some(items), None) => builder.conjunction(items)?,
        (None, None, Some(items)) => builder.either(items)?,
        (None, None, None) => bail!("rule needs one of `pattern`, `patterns` or `pattern-either`"),
        _ => bail!("rule may use only one of `pattern`, `patterns` or `pattern-either`"),
    };
    formula.validate()?;

    let cache = PatternCache::global();
    let mut patterns = BTreeMap::new();
    for lang in &languages {
        let mut set = BTreeMap::new();
        let mut failed = false;
        for (pattern_id, src) in &builder.sources {
            match cache.get_or_compile(*lang, src) {
                Ok(tree) => {
                    set.insert(pattern_id.clone(), tree);
                }
                Err(error) => {
                    warn!(rule_id = %yr.id, language = %lang, pattern = %pattern_id, %error, "Pattern failed to compile");
                    rs.diagnostics.push(RuleDiagnostic {
                        rule_id: yr.id.clone(),
                        language: *lang,
                        pattern_id: pattern_id.clone(),
                        source_file: source_file.map(str::to_string),
                        error,
                    });
                    failed = true;
                }
            }
        }
        if !failed {
            patterns.insert(*lang, set);
        }
    }
    if patterns.is_empty() {
        debug!(rule_id = %yr.id, "Rule has no usable language, skipped");
        return Ok(());
    }

    let rule = CompiledRule {
        message: yr.message.unwrap_or_else(|| yr.id.clone()),
        id: yr.id,
        severity,
        languages,
        formula,
        sources: builder.sources.into_iter().collect(),
        patterns,
        source_file: source_file.map(str::to_string),
        hash,
    };
    log_rule_summary(&rule);
    rs.rules.push(rule);
    Ok(())
}

fn parse_languages(raw: Option<&[String]>) -> anyhow::Result<Vec<Language>> {
    let mut out = Vec::new();
    for name in raw.unwrap_or_default() {
        let lang: Language = name.trim().parse()?;
        if !out.contains(&lang) {
            out.push(lang);
        }
    }
    if out.is_empty() {
        out.push(Language::Generic);
    }
    Ok(out)
}

/// Translates the operator keys of a rule into a [`Formula`], naming each
/// pattern string `p0`, `p1`, ... in the order it is met.
#[derive(Default)]
struct FormulaBuilder {
    sources: Vec<(PatternId, String)>,
}

impl FormulaBuilder {
    fn leaf_id(&mut self, source: &str) -> PatternId {
        let id = format!("p{}", self.sources.len());
        self.sources.push((id.clone(), source.to_string()));
        id
    }

    fn leaf(&mut self, source: &str) -> Formula {
        Formula::Pattern(self.leaf_id(source))
    }

    /// Operand of `pattern-not`, `pattern-inside` and friends: a pattern
    /// string or a nested positive operator.
    fn operand(&mut self, value: &YamlValue) -> anyhow::Result<Formula> {
        match value {
            YamlValue::String(s) => Ok(self.leaf(s)),
            YamlValue::Mapping(map) => self.positive(map),
            _ => bail!("expected a pattern string or a mapping"),
        }
    }

    /// A mapping holding exactly one of `pattern`, `patterns`,
    /// `pattern-either`.
    fn positive(&mut self, map: &Mapping) -> anyhow::Result<Formula> {
        let (key, value) = single_entry(map)?;
        match key {
            "pattern" => Ok(self.leaf(as_str(value, key)?)),
            "patterns" => self.conjunction(as_seq(value, key)?),
            "pattern-either" => self.either(as_seq(value, key)?),
            other => bail!("`{other}` cannot be used here"),
        }
    }

    fn either(&mut self, items: &[YamlValue]) -> anyhow::Result<Formula> {
        let mut branches = Vec::with_capacity(items.len());
        for item in items {
            let map = item
                .as_mapping()
                .ok_or_else(|| anyhow!("`pattern-either` entries must be mappings"))?;
            branches.push(self.positive(map)?);
        }
        Ok(Formula::Or(branches))
    }

    fn conjunction(&mut self, items: &[YamlValue]) -> anyhow::Result<Formula> {
        let mut conjuncts = Vec::with_capacity(items.len());
        let mut insides = Vec::new();
        for item in items {
            let map = item
                .as_mapping()
                .ok_or_else(|| anyhow!("`patterns` entries must be mappings"))?;
            let (key, value) = single_entry(map)?;
            let conjunct = match key {
                "pattern" | "patterns" | "pattern-either" => self.positive(map)?,
                "pattern-not" => Formula::Not(Box::new(self.operand(value)?)),
                "pattern-inside" => {
                    insides.push(self.operand(value)?);
                    continue;
                }
                "pattern-not-inside" => Formula::NotInside(Box::new(self.operand(value)?)),
                "metavariable-regex" => {
                    let metavariable = metavariable_field(value, key)?;
                    let raw = str_field(value, "regex", key)?;
                    let re = Regex::new(raw)
                        .with_context(|| format!("invalid regex for `{metavariable}`: {raw}"))?;
                    Formula::Constraint {
                        metavariable,
                        predicate: Predicate::Regex(re),
                    }
                }
                "metavariable-pattern" => {
                    let metavariable = metavariable_field(value, key)?;
                    let source = str_field(value, "pattern", key)?;
                    Formula::Constraint {
                        metavariable,
                        predicate: Predicate::Pattern(self.leaf_id(source)),
                    }
                }
                "focus-metavariable" => Formula::Focus(metavariable_name(as_str(value, key)?)?),
                other => bail!("unsupported operator `{other}`"),
            };
            conjuncts.push(conjunct);
        }
        wrap_insides(&mut conjuncts, insides);
        Ok(Formula::And(conjuncts))
    }
}

/// Each `pattern-inside` restricts the first positive conjunct. Without a
/// positive conjunct the first context becomes the positive itself.
fn wrap_insides(conjuncts: &mut Vec<Formula>, insides: Vec<Formula>) {
    let mut insides = insides.into_iter();
    let slot = match conjuncts.iter().position(Formula::is_positive) {
        Some(idx) => idx,
        None => match insides.next() {
            Some(first) => {
                conjuncts.insert(0, first);
                0
            }
            None => return,
        },
    };
    for outer in insides {
        let inner = std::mem::replace(&mut conjuncts[slot], Formula::And(Vec::new()));
        conjuncts[slot] = Formula::Inside {
            inner: Box::new(inner),
            outer: Box::new(outer),
        };
    }
}

fn single_entry(map: &Mapping) -> anyhow::Result<(&str, &YamlValue)> {
    let mut entries = map.iter();
    match (entries.next(), entries.next()) {
        (Some((k, v)), None) => {
            let key = k.as_str().ok_or_else(|| anyhow!("operator keys must be strings"))?;
            Ok((key, v))
        }
        _ => bail!("each operator mapping must have exactly one key"),
    }
}

fn as_str<'v>(value: &'v YamlValue, key: &str) -> anyhow::Result<&'v str> {
    value
        .as_str()
        .ok_or_else(|| anyhow!("`{key}` expects a string"))
}

fn as_seq<'v>(value: &'v YamlValue, key: &str) -> anyhow::Result<&'v [YamlValue]> {
    value
        .as_sequence()
        .map(Vec::as_slice)
        .ok_or_else(|| anyhow!("`{key}` expects a list"))
}

fn str_field<'v>(value: &'v YamlValue, field: &str, key: &str) -> anyhow::Result<&'v str> {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("`{key}` needs a string `{field}`"))
}

fn metavariable_field(value: &YamlValue, key: &str) -> anyhow::Result<String> {
    metavariable_name(str_field(value, "metavariable", key)?)
}

fn metavariable_name(raw: &str) -> anyhow::Result<String> {
    let name = raw.trim().trim_start_matches('$');
    if !is_metavariable_name(name) {
        bail!("`{raw}` is not a metavariable name");
    }
    Ok(name.to_string())
}
