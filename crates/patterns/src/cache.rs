//! Process-wide memo of compiled patterns keyed by `(language, source)`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

use parsers::Language;
use tracing::debug;

use crate::compile::{compile_pattern, ParseError, PatternTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

/// Only successful compilations are memoized; a failing pattern is
/// recompiled (and fails again) on every request.
#[derive(Default)]
pub struct PatternCache {
    entries: RwLock<HashMap<(Language, String), Arc<PatternTree>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

static GLOBAL: OnceLock<PatternCache> = OnceLock::new();

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global() -> &'static PatternCache {
        GLOBAL.get_or_init(PatternCache::new)
    }

    pub fn get_or_compile(
        &self,
        language: Language,
        source: &str,
    ) -> Result<Arc<PatternTree>, ParseError> {
        let key = (language, source.to_string());
        {
            let map = self.entries.read().unwrap_or_else(|e| e.into_inner());
            if let Some(hit) = map.get(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Arc::clone(hit));
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let compiled = Arc::new(compile_pattern(language, source)?);
        debug!(language = %language, "Pattern cache miss");
        let mut map = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let entry = map.entry(key).or_insert(compiled);
        Ok(Arc::clone(entry))
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self
            .entries
            .read()
            .map(|m| m.len())
            .unwrap_or_else(|e| e.into_inner().len());
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries,
        }
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}
