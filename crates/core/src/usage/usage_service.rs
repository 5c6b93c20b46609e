//! Usage tracker: current-period counting and fire-and-forget recording.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use log::{debug, error, info};

use crate::errors::Result;

use super::observer::{NoOpUsageObserver, UsageObserver};
use super::usage_model::{ActionType, SubjectKey, UsageEvent};
use super::usage_traits::UsageRepositoryTrait;

/// Default rolling window for anonymous sessions, in days.
const DEFAULT_ANONYMOUS_WINDOW_DAYS: i64 = 30;

/// Records usage events and computes current-period counts.
pub struct UsageTracker {
    repository: Arc<dyn UsageRepositoryTrait>,
    observer: Arc<dyn UsageObserver>,
    anonymous_window_days: i64,
}

impl UsageTracker {
    /// Create a tracker with no observer.
    pub fn new(repository: Arc<dyn UsageRepositoryTrait>) -> Self {
        Self::with_observer(repository, Arc::new(NoOpUsageObserver))
    }

    /// Create a tracker that reports recording outcomes to `observer`.
    pub fn with_observer(
        repository: Arc<dyn UsageRepositoryTrait>,
        observer: Arc<dyn UsageObserver>,
    ) -> Self {
        Self {
            repository,
            observer,
            anonymous_window_days: DEFAULT_ANONYMOUS_WINDOW_DAYS,
        }
    }

    /// Override the anonymous rolling window.
    pub fn with_anonymous_window_days(mut self, days: i64) -> Self {
        self.anonymous_window_days = days;
        self
    }

    /// Start of the current accounting period for a subject.
    ///
    /// Authenticated users: the first instant of the current UTC calendar
    /// month, so quotas reset on the billing boundary. Anonymous sessions:
    /// a rolling window ending now, so the quota cannot be reset by
    /// waiting for midnight.
    pub fn period_start(&self, subject: &SubjectKey, now: DateTime<Utc>) -> DateTime<Utc> {
        match subject {
            SubjectKey::User(_) => Utc
                .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
                .unwrap(),
            SubjectKey::Session(_) => now - Duration::days(self.anonymous_window_days),
        }
    }

    /// Count of events for the subject and action in the current period.
    pub fn count_in_current_period(
        &self,
        subject: &SubjectKey,
        action: ActionType,
    ) -> Result<i64> {
        let since = self.period_start(subject, Utc::now());
        self.repository.count_since(subject, action, since)
    }

    /// Record a usage event. Best-effort: a store failure is logged and
    /// reported to the observer, never returned - usage logging must not
    /// fail or roll back the action it describes.
    pub async fn record(
        &self,
        subject: SubjectKey,
        action: ActionType,
        resource_id: Option<String>,
        metadata: Option<String>,
    ) {
        let event = UsageEvent::new(subject, action, resource_id, metadata);

        match self.repository.append(event.clone()).await {
            Ok(()) => {
                debug!("Usage tracked: {} for {}", event.action, event.subject);
                self.observer.on_recorded(&event);
            }
            Err(e) => {
                error!(
                    "Usage recording failed for {} ({}): {}",
                    event.subject, event.action, e
                );
                self.observer.on_record_failed(&event, &e);
            }
        }
    }

    /// Delete events older than `days_to_keep` days.
    pub async fn cleanup(&self, days_to_keep: i64) -> Result<usize> {
        let cutoff = Utc::now() - Duration::days(days_to_keep);
        let deleted = self.repository.delete_before(cutoff).await?;
        info!("Cleaned up {} usage events older than {} days", deleted, days_to_keep);
        Ok(deleted)
    }
}
