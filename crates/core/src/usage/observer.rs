//! Usage recording observer hook.

use std::sync::{Arc, Mutex};

use crate::errors::Error;

use super::usage_model::UsageEvent;

/// Trait for observing usage recording outcomes.
///
/// The tracker never propagates a recording failure to the action it
/// describes; this hook is how such failures become visible to an
/// observability layer.
///
/// # Design Rules
///
/// - Callbacks must be fast and non-blocking (no network calls, no DB
///   writes)
/// - Failure inside an observer must not affect the primary action
pub trait UsageObserver: Send + Sync {
    /// An event was durably recorded.
    fn on_recorded(&self, event: &UsageEvent);

    /// Recording an event failed; the primary action proceeded anyway.
    fn on_record_failed(&self, event: &UsageEvent, error: &Error);
}

/// No-op implementation for contexts that don't observe usage.
#[derive(Clone, Default)]
pub struct NoOpUsageObserver;

impl UsageObserver for NoOpUsageObserver {
    fn on_recorded(&self, _event: &UsageEvent) {}

    fn on_record_failed(&self, _event: &UsageEvent, _error: &Error) {}
}

/// Mock observer for testing - collects outcomes.
#[derive(Clone, Default)]
pub struct MockUsageObserver {
    recorded: Arc<Mutex<Vec<UsageEvent>>>,
    failures: Arc<Mutex<Vec<String>>>,
}

impl MockUsageObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events that were reported as recorded.
    pub fn recorded(&self) -> Vec<UsageEvent> {
        self.recorded.lock().unwrap().clone()
    }

    /// Error strings from failed recordings.
    pub fn failures(&self) -> Vec<String> {
        self.failures.lock().unwrap().clone()
    }
}

impl UsageObserver for MockUsageObserver {
    fn on_recorded(&self, event: &UsageEvent) {
        self.recorded.lock().unwrap().push(event.clone());
    }

    fn on_record_failed(&self, _event: &UsageEvent, error: &Error) {
        self.failures.lock().unwrap().push(error.to_string());
    }
}
