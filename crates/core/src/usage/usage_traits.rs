//! Usage store trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::Result;

use super::usage_model::{ActionType, SubjectKey, UsageEvent};

/// Append-only store of usage events.
///
/// Implemented by the persistence layer; tests use in-memory mocks.
#[async_trait]
pub trait UsageRepositoryTrait: Send + Sync {
    /// Append one event. Events are never updated.
    async fn append(&self, event: UsageEvent) -> Result<()>;

    /// Count events for a subject and action with `occurred_at >= since`.
    fn count_since(
        &self,
        subject: &SubjectKey,
        action: ActionType,
        since: DateTime<Utc>,
    ) -> Result<i64>;

    /// Delete events older than the cutoff (retention cleanup only).
    /// Returns the number of deleted events.
    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}
