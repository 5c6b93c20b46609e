//! Usage tracking domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The accounting subject of a usage event: an authenticated user or an
/// anonymous session.
///
/// The distinction matters for period computation: authenticated quotas
/// reset on the calendar-month boundary (aligning with billing cycles),
/// anonymous quotas use a rolling window so they cannot be reset by
/// waiting for midnight.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum SubjectKey {
    /// Authenticated user id.
    User(String),
    /// Anonymous session id.
    Session(String),
}

impl SubjectKey {
    /// Subject for an authenticated user.
    pub fn user(id: impl Into<String>) -> Self {
        Self::User(id.into())
    }

    /// Subject for an anonymous session.
    pub fn session(id: impl Into<String>) -> Self {
        Self::Session(id.into())
    }

    /// The underlying identifier.
    pub fn key(&self) -> &str {
        match self {
            Self::User(id) | Self::Session(id) => id,
        }
    }

    /// True for anonymous sessions.
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Session(_))
    }
}

impl std::fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{}", id),
            Self::Session(id) => write!(f, "session:{}", id),
        }
    }
}

/// Metered action types.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    /// AI chart analysis.
    ChartAnalysis,
    /// Stock quote lookup.
    QuoteLookup,
}

impl ActionType {
    /// Stable string form used in stores and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChartAnalysis => "CHART_ANALYSIS",
            Self::QuoteLookup => "QUOTE_LOOKUP",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable, append-only usage event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UsageEvent {
    /// Event id.
    pub id: String,
    /// Who performed the action.
    pub subject: SubjectKey,
    /// What was done.
    pub action: ActionType,
    /// Optional id of the touched resource (e.g. a stock code).
    pub resource_id: Option<String>,
    /// Optional free-form metadata.
    pub metadata: Option<String>,
    /// When the action completed.
    pub occurred_at: DateTime<Utc>,
}

impl UsageEvent {
    /// Create an event stamped now.
    pub fn new(
        subject: SubjectKey,
        action: ActionType,
        resource_id: Option<String>,
        metadata: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            subject,
            action,
            resource_id,
            metadata,
            occurred_at: Utc::now(),
        }
    }
}
