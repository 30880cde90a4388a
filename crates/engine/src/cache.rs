use anyhow::Context;
use blake3::Hasher;
use ir::{EqualityPolicy, Tree};
use loader::CompiledRule;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::Finding;

/// On-disk memo of completed (rule, file) evaluations.
///
/// Only completed outcomes are stored; timeouts and internal errors are
/// retried on the next run.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FindingCache {
    entries: HashMap<String, Vec<Finding>>,
}

impl FindingCache {
    /// Missing or unreadable files yield an empty cache.
    pub fn load(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let data = serde_json::to_string(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::write(path, data).with_context(|| format!("writing {}", path.display()))
    }

    /// Key of one evaluation: the rule's hash, the file's content and path,
    /// and the equality policy in force.
    pub fn key(rule: &CompiledRule, tree: &Tree, policy: &EqualityPolicy) -> String {
        let mut hasher = Hasher::new();
        hasher.update(rule.hash.as_bytes());
        hasher.update(b"\0");
        hasher.update(tree.content_hash().as_bytes());
        hasher.update(b"\0");
        hasher.update(tree.path().as_bytes());
        hasher.update(&[
            policy.normalize_numbers as u8,
            policy.normalize_strings as u8,
            policy.commutative as u8,
        ]);
        hasher.finalize().to_hex().to_string()
    }

    pub fn get(&self, key: &str) -> Option<&Vec<Finding>> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, findings: Vec<Finding>) {
        self.entries.insert(key, findings);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
