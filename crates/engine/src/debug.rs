use serde::Serialize;
use std::sync::RwLock;

/// Engine progress reported to an optional observer.
#[derive(Debug, Clone, Serialize)]
pub enum DebugEvent {
    MatchAttempt {
        rule_id: String,
        file: String,
    },
    MatchResult {
        rule_id: String,
        file: String,
        findings: usize,
        cached: bool,
    },
    RuleTimedOut {
        rule_id: String,
        file: String,
        elapsed_ms: u64,
    },
    InternalError {
        rule_id: String,
        file: String,
        message: String,
    },
}

pub trait DebugSink: Send + Sync {
    fn event(&self, event: DebugEvent);
}

static DEBUG_SINK: RwLock<Option<Box<dyn DebugSink>>> = RwLock::new(None);

pub fn set_debug_sink(sink: Option<Box<dyn DebugSink>>) {
    *DEBUG_SINK.write().unwrap_or_else(|e| e.into_inner()) = sink;
}

pub(crate) fn emit(event: DebugEvent) {
    if let Some(s) = DEBUG_SINK
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .as_ref()
    {
        s.event(event);
    }
}
