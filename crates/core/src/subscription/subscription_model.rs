//! Subscription domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Subscription lifecycle status.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    /// Currently in force.
    Active,
    /// Ended by the user (or superseded by an upgrade).
    Cancelled,
    /// Ended by reaching its end date.
    Expired,
}

/// Billing period of a plan, used to derive subscription end dates.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingPeriod {
    Monthly,
    Yearly,
    Lifetime,
}

/// Monthly ceiling for metered actions under a plan.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum QuotaCeiling {
    /// At most this many actions per calendar month.
    Limited(u32),
    /// No ceiling.
    Unlimited,
}

impl QuotaCeiling {
    /// True when the plan has no ceiling.
    pub fn is_unlimited(&self) -> bool {
        matches!(self, Self::Unlimited)
    }

    /// The numeric limit, when one exists.
    pub fn limit(&self) -> Option<u32> {
        match self {
            Self::Limited(max) => Some(*max),
            Self::Unlimited => None,
        }
    }
}

/// A subscription plan. Immutable reference data.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    /// Plan id.
    pub id: String,
    /// Plan name (e.g. "FREE", "PRO").
    pub name: String,
    /// Monthly ceiling for metered actions.
    pub monthly_ceiling: QuotaCeiling,
    /// Billing period, used to derive subscription end dates.
    pub billing_period: BillingPeriod,
    /// Whether the plan is offered to new subscribers.
    pub is_active: bool,
}

/// A user's subscription to a plan.
///
/// At most one Active record exists per user at a time; the policy
/// enforces this by cancelling the current record before creating a new
/// one. Superseded records are kept as history, never deleted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    /// Record id.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Subscribed plan.
    pub plan_id: String,
    /// Lifecycle status.
    pub status: SubscriptionStatus,
    /// When the subscription started.
    pub start_date: DateTime<Utc>,
    /// When it ends; None for lifetime plans.
    pub end_date: Option<DateTime<Utc>>,
    /// Whether the subscription renews automatically.
    pub auto_renew: bool,
    /// When it was cancelled, if it was.
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Why it was cancelled, if it was.
    pub cancellation_reason: Option<String>,
    /// Record creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionRecord {
    /// Create a new Active record starting now.
    pub fn new(
        user_id: impl Into<String>,
        plan_id: impl Into<String>,
        end_date: Option<DateTime<Utc>>,
        auto_renew: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            plan_id: plan_id.into(),
            status: SubscriptionStatus::Active,
            start_date: now,
            end_date,
            auto_renew,
            cancelled_at: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True while the record is Active and its end date (if any) is in
    /// the future.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active
            && self.end_date.map(|end| end > now).unwrap_or(true)
    }

    /// True when the end date has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.end_date.map(|end| end < now).unwrap_or(false)
    }

    /// Cancel the subscription, stamping the time and reason and
    /// clearing auto-renew.
    pub fn cancel(&mut self, reason: impl Into<String>, now: DateTime<Utc>) {
        self.status = SubscriptionStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.cancellation_reason = Some(reason.into());
        self.auto_renew = false;
        self.updated_at = now;
    }

    /// Mark the subscription expired.
    pub fn expire(&mut self, now: DateTime<Utc>) {
        self.status = SubscriptionStatus::Expired;
        self.updated_at = now;
    }

    /// Reactivate the subscription.
    pub fn activate(&mut self, now: DateTime<Utc>) {
        self.status = SubscriptionStatus::Active;
        self.updated_at = now;
    }
}
