//! Subscription store and policy traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::Result;

use super::subscription_model::{SubscriptionPlan, SubscriptionRecord};

/// Store of subscription records.
#[async_trait]
pub trait SubscriptionRepositoryTrait: Send + Sync {
    /// Find the user's Active record, if any.
    fn find_active(&self, user_id: &str) -> Result<Option<SubscriptionRecord>>;

    /// All records for a user, newest first.
    fn find_by_user(&self, user_id: &str) -> Result<Vec<SubscriptionRecord>>;

    /// Active records whose end date is before the cutoff (expiry sweep).
    fn find_active_ending_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<SubscriptionRecord>>;

    /// Insert or update a record by id.
    async fn save(&self, record: SubscriptionRecord) -> Result<SubscriptionRecord>;
}

/// Store of subscription plans (immutable reference data).
pub trait PlanRepositoryTrait: Send + Sync {
    /// Look up a plan by id.
    fn get_plan(&self, plan_id: &str) -> Result<SubscriptionPlan>;

    /// Look up a plan by name (case-insensitive).
    fn get_plan_by_name(&self, name: &str) -> Result<SubscriptionPlan>;

    /// Plans currently offered to new subscribers.
    fn list_active_plans(&self) -> Result<Vec<SubscriptionPlan>>;
}

/// Policy resolving users to plans and driving subscription lifecycle.
#[async_trait]
pub trait SubscriptionPolicyTrait: Send + Sync {
    /// The user's Active subscription, if one is in force right now.
    fn active_subscription(&self, user_id: &str) -> Result<Option<SubscriptionRecord>>;

    /// The plan limits governing the user, or None when the user has no
    /// active subscription (no access - not a default free tier).
    fn plan_limits(&self, user_id: &str) -> Result<Option<SubscriptionPlan>>;

    /// Subscribe the user to a plan, superseding any current Active
    /// record in the same logical operation.
    async fn subscribe(&self, user_id: &str, plan_id: &str) -> Result<SubscriptionRecord>;

    /// Cancel the user's Active subscription.
    async fn cancel(&self, user_id: &str, reason: &str) -> Result<SubscriptionRecord>;

    /// Expire Active records whose end date has passed. Returns how many
    /// records were expired.
    async fn expire_due(&self) -> Result<usize>;

    /// The user's full subscription history.
    fn subscription_history(&self, user_id: &str) -> Result<Vec<SubscriptionRecord>>;
}
