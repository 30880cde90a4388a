use std::collections::{BTreeMap, HashSet};

use blake3::Hasher;
use ir::{Location, Tree};
use loader::{CompiledRule, Severity};
use serde::{Deserialize, Serialize};

use crate::matcher::Match;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoundValue {
    pub text: String,
    pub location: Location,
}

/// Reported occurrence of a rule in a file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Finding {
    /// Stable identifier derived from rule, file, range and bindings.
    pub id: String,
    pub rule_id: String,
    /// File where the rule is defined.
    pub rule_file: Option<String>,
    pub severity: Severity,
    pub location: Location,
    /// First line of the matched code.
    pub excerpt: String,
    /// Rule message with `$NAME` replaced by the bound text.
    pub message: String,
    pub bindings: BTreeMap<String, BoundValue>,
}

impl Finding {
    pub fn from_match(rule: &CompiledRule, tree: &Tree, m: &Match) -> Self {
        let bindings: BTreeMap<String, BoundValue> = m
            .env
            .iter()
            .map(|(name, value)| {
                let span = value.span(tree);
                let bound = BoundValue {
                    text: tree.slice(span).to_string(),
                    location: Location::resolve(tree, span),
                };
                (name.to_string(), bound)
            })
            .collect();
        let location = Location::resolve(tree, m.span);
        let excerpt = tree
            .slice(m.span)
            .lines()
            .next()
            .unwrap_or_default()
            .trim_end()
            .to_string();
        Finding {
            id: finding_id(&rule.id, &location, &bindings),
            rule_id: rule.id.clone(),
            rule_file: rule.source_file.clone(),
            severity: rule.severity,
            message: interpolate(&rule.message, &bindings),
            location,
            excerpt,
            bindings,
        }
    }
}

fn finding_id(
    rule_id: &str,
    location: &Location,
    bindings: &BTreeMap<String, BoundValue>,
) -> String {
    let mut hasher = Hasher::new();
    hasher.update(rule_id.as_bytes());
    hasher.update(b"\0");
    hasher.update(location.path.as_bytes());
    hasher.update(b"\0");
    hasher.update(&(location.start_byte as u64).to_le_bytes());
    hasher.update(&(location.end_byte as u64).to_le_bytes());
    for (name, value) in bindings {
        hasher.update(b"\0");
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(value.text.as_bytes());
        hasher.update(&(value.location.start_byte as u64).to_le_bytes());
        hasher.update(&(value.location.end_byte as u64).to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Replaces `$NAME` with the text bound to `NAME`. Unbound names and
/// anything not shaped like a metavariable are left as written.
pub fn interpolate(message: &str, bindings: &BTreeMap<String, BoundValue>) -> String {
    let mut out = String::with_capacity(message.len());
    let mut rest = message;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let len = after
            .char_indices()
            .find(|(i, c)| {
                !(c.is_ascii_uppercase() || c == &'_' || (*i > 0 && c.is_ascii_digit()))
            })
            .map_or(after.len(), |(i, _)| i);
        match bindings.get(&after[..len]) {
            Some(value) if len > 0 => out.push_str(&value.text),
            _ => {
                out.push('$');
                out.push_str(&after[..len]);
            }
        }
        rest = &after[len..];
    }
    out.push_str(rest);
    out
}

/// Keeps the first finding of each id. Matches over the same range with
/// different bindings have different ids and are all kept.
pub fn dedup_findings(findings: &mut Vec<Finding>) {
    let mut seen = HashSet::new();
    findings.retain(|f| seen.insert(f.id.clone()));
}
