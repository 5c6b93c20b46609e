//! Subscription policy implementation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Months, Utc};
use log::info;

use crate::errors::{Error, Result};

use super::subscription_model::{BillingPeriod, SubscriptionPlan, SubscriptionRecord};
use super::subscription_traits::{
    PlanRepositoryTrait, SubscriptionPolicyTrait, SubscriptionRepositoryTrait,
};

/// Cancellation reason stamped on records superseded by an upgrade.
const UPGRADE_REASON: &str = "upgraded";

/// Resolves users to plan limits and drives subscription lifecycle.
pub struct SubscriptionPolicy {
    subscriptions: Arc<dyn SubscriptionRepositoryTrait>,
    plans: Arc<dyn PlanRepositoryTrait>,
}

impl SubscriptionPolicy {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepositoryTrait>,
        plans: Arc<dyn PlanRepositoryTrait>,
    ) -> Self {
        Self {
            subscriptions,
            plans,
        }
    }

    /// End date for a new subscription under the plan, from now.
    fn end_date_for(plan: &SubscriptionPlan, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match plan.billing_period {
            BillingPeriod::Monthly => Some(now + Months::new(1)),
            BillingPeriod::Yearly => Some(now + Months::new(12)),
            BillingPeriod::Lifetime => None,
        }
    }

    /// Plans currently offered to new subscribers.
    pub fn list_plans(&self) -> Result<Vec<SubscriptionPlan>> {
        self.plans.list_active_plans()
    }

    /// Subscribe by plan name (e.g. "FREE" on signup).
    pub async fn subscribe_by_plan_name(
        &self,
        user_id: &str,
        plan_name: &str,
    ) -> Result<SubscriptionRecord> {
        let plan = self.plans.get_plan_by_name(plan_name)?;
        self.subscribe(user_id, &plan.id).await
    }
}

#[async_trait]
impl SubscriptionPolicyTrait for SubscriptionPolicy {
    fn active_subscription(&self, user_id: &str) -> Result<Option<SubscriptionRecord>> {
        let now = Utc::now();
        // A record past its end date is dead even if the expiry sweep
        // has not stamped it yet.
        Ok(self
            .subscriptions
            .find_active(user_id)?
            .filter(|record| record.is_active(now)))
    }

    fn plan_limits(&self, user_id: &str) -> Result<Option<SubscriptionPlan>> {
        match self.active_subscription(user_id)? {
            None => Ok(None),
            Some(record) => Ok(Some(self.plans.get_plan(&record.plan_id)?)),
        }
    }

    async fn subscribe(&self, user_id: &str, plan_id: &str) -> Result<SubscriptionRecord> {
        let now = Utc::now();
        let plan = self.plans.get_plan(plan_id)?;

        // Supersede, never stack: a user must not hold two Active records.
        if let Some(mut current) = self.active_subscription(user_id)? {
            current.cancel(UPGRADE_REASON, now);
            self.subscriptions.save(current).await?;
            info!(
                "Subscription superseded for user {} before activating plan {}",
                user_id, plan.name
            );
        }

        let auto_renew = !matches!(plan.billing_period, BillingPeriod::Lifetime);
        let record = SubscriptionRecord::new(user_id, plan_id, Self::end_date_for(&plan, now), auto_renew);
        let saved = self.subscriptions.save(record).await?;

        info!("Subscription activated: user {} on plan {}", user_id, plan.name);
        Ok(saved)
    }

    async fn cancel(&self, user_id: &str, reason: &str) -> Result<SubscriptionRecord> {
        let mut record = self
            .active_subscription(user_id)?
            .ok_or_else(|| Error::SubscriptionNotFound(user_id.to_string()))?;

        record.cancel(reason, Utc::now());
        let saved = self.subscriptions.save(record).await?;

        info!("Subscription cancelled for user {}: {}", user_id, reason);
        Ok(saved)
    }

    async fn expire_due(&self) -> Result<usize> {
        let now = Utc::now();
        let due = self.subscriptions.find_active_ending_before(now)?;
        let count = due.len();

        for mut record in due {
            record.expire(now);
            info!("Subscription expired for user {}", record.user_id);
            self.subscriptions.save(record).await?;
        }

        Ok(count)
    }

    fn subscription_history(&self, user_id: &str) -> Result<Vec<SubscriptionRecord>> {
        self.subscriptions.find_by_user(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::{QuotaCeiling, SubscriptionStatus};
    use chrono::Duration;
    use std::sync::RwLock;

    // ============== Mock repositories ==============

    #[derive(Default)]
    struct MockSubscriptionRepository {
        records: RwLock<Vec<SubscriptionRecord>>,
    }

    #[async_trait]
    impl SubscriptionRepositoryTrait for MockSubscriptionRepository {
        fn find_active(&self, user_id: &str) -> Result<Option<SubscriptionRecord>> {
            Ok(self
                .records
                .read()
                .unwrap()
                .iter()
                .find(|r| r.user_id == user_id && r.status == SubscriptionStatus::Active)
                .cloned())
        }

        fn find_by_user(&self, user_id: &str) -> Result<Vec<SubscriptionRecord>> {
            Ok(self
                .records
                .read()
                .unwrap()
                .iter()
                .filter(|r| r.user_id == user_id)
                .cloned()
                .collect())
        }

        fn find_active_ending_before(
            &self,
            cutoff: DateTime<Utc>,
        ) -> Result<Vec<SubscriptionRecord>> {
            Ok(self
                .records
                .read()
                .unwrap()
                .iter()
                .filter(|r| {
                    r.status == SubscriptionStatus::Active
                        && r.end_date.map(|end| end < cutoff).unwrap_or(false)
                })
                .cloned()
                .collect())
        }

        async fn save(&self, record: SubscriptionRecord) -> Result<SubscriptionRecord> {
            let mut records = self.records.write().unwrap();
            match records.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => records.push(record.clone()),
            }
            Ok(record)
        }
    }

    struct MockPlanRepository {
        plans: Vec<SubscriptionPlan>,
    }

    impl MockPlanRepository {
        fn standard() -> Self {
            Self {
                plans: vec![
                    SubscriptionPlan {
                        id: "plan-free".to_string(),
                        name: "FREE".to_string(),
                        monthly_ceiling: QuotaCeiling::Limited(5),
                        billing_period: BillingPeriod::Lifetime,
                        is_active: true,
                    },
                    SubscriptionPlan {
                        id: "plan-pro".to_string(),
                        name: "PRO".to_string(),
                        monthly_ceiling: QuotaCeiling::Unlimited,
                        billing_period: BillingPeriod::Monthly,
                        is_active: true,
                    },
                ],
            }
        }
    }

    impl PlanRepositoryTrait for MockPlanRepository {
        fn get_plan(&self, plan_id: &str) -> Result<SubscriptionPlan> {
            self.plans
                .iter()
                .find(|p| p.id == plan_id)
                .cloned()
                .ok_or_else(|| Error::PlanNotFound(plan_id.to_string()))
        }

        fn get_plan_by_name(&self, name: &str) -> Result<SubscriptionPlan> {
            self.plans
                .iter()
                .find(|p| p.name.eq_ignore_ascii_case(name))
                .cloned()
                .ok_or_else(|| Error::PlanNotFound(name.to_string()))
        }

        fn list_active_plans(&self) -> Result<Vec<SubscriptionPlan>> {
            Ok(self.plans.iter().filter(|p| p.is_active).cloned().collect())
        }
    }

    fn make_policy() -> (SubscriptionPolicy, Arc<MockSubscriptionRepository>) {
        let repository = Arc::new(MockSubscriptionRepository::default());
        let policy = SubscriptionPolicy::new(
            Arc::clone(&repository) as _,
            Arc::new(MockPlanRepository::standard()),
        );
        (policy, repository)
    }

    // ============== Tests ==============

    #[tokio::test]
    async fn test_subscribe_creates_active_record() {
        let (policy, _) = make_policy();

        let record = policy.subscribe("u-1", "plan-pro").await.unwrap();
        assert_eq!(record.status, SubscriptionStatus::Active);
        assert!(record.end_date.is_some());
        assert!(record.auto_renew);

        let active = policy.active_subscription("u-1").unwrap().unwrap();
        assert_eq!(active.plan_id, "plan-pro");
    }

    #[tokio::test]
    async fn test_lifetime_plan_has_no_end_date() {
        let (policy, _) = make_policy();

        let record = policy.subscribe("u-1", "plan-free").await.unwrap();
        assert!(record.end_date.is_none());
        assert!(!record.auto_renew);
    }

    #[tokio::test]
    async fn test_upgrade_leaves_exactly_one_active_record() {
        let (policy, repository) = make_policy();

        policy.subscribe("u-1", "plan-free").await.unwrap();
        policy.subscribe("u-1", "plan-pro").await.unwrap();

        let records = repository.records.read().unwrap().clone();
        assert_eq!(records.len(), 2);

        let active: Vec<_> = records
            .iter()
            .filter(|r| r.status == SubscriptionStatus::Active)
            .collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].plan_id, "plan-pro");

        let cancelled: Vec<_> = records
            .iter()
            .filter(|r| r.status == SubscriptionStatus::Cancelled)
            .collect();
        assert_eq!(cancelled.len(), 1);
        assert!(cancelled[0].cancelled_at.is_some());
        assert_eq!(cancelled[0].cancellation_reason.as_deref(), Some("upgraded"));
    }

    #[tokio::test]
    async fn test_plan_limits_require_active_subscription() {
        let (policy, _) = make_policy();

        // Absent subscription means no access, not a default tier.
        assert!(policy.plan_limits("u-1").unwrap().is_none());

        policy.subscribe("u-1", "plan-free").await.unwrap();
        let plan = policy.plan_limits("u-1").unwrap().unwrap();
        assert_eq!(plan.monthly_ceiling, QuotaCeiling::Limited(5));
    }

    #[tokio::test]
    async fn test_subscribe_by_plan_name_on_signup() {
        let (policy, _) = make_policy();

        let record = policy.subscribe_by_plan_name("u-1", "free").await.unwrap();
        assert_eq!(record.plan_id, "plan-free");

        assert_eq!(policy.list_plans().unwrap().len(), 2);

        let result = policy.subscribe_by_plan_name("u-1", "ENTERPRISE").await;
        assert!(matches!(result, Err(Error::PlanNotFound(_))));
    }

    #[tokio::test]
    async fn test_cancel_without_subscription_errors() {
        let (policy, _) = make_policy();

        let result = policy.cancel("u-1", "changed my mind").await;
        assert!(matches!(result, Err(Error::SubscriptionNotFound(_))));
    }

    #[tokio::test]
    async fn test_cancel_stamps_reason() {
        let (policy, _) = make_policy();

        policy.subscribe("u-1", "plan-pro").await.unwrap();
        let record = policy.cancel("u-1", "too expensive").await.unwrap();

        assert_eq!(record.status, SubscriptionStatus::Cancelled);
        assert_eq!(record.cancellation_reason.as_deref(), Some("too expensive"));
        assert!(policy.active_subscription("u-1").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expiry_sweep() {
        let (policy, repository) = make_policy();

        let mut stale = SubscriptionRecord::new("u-1", "plan-pro", None, true);
        stale.end_date = Some(Utc::now() - Duration::days(1));
        repository.save(stale).await.unwrap();

        let fresh = SubscriptionRecord::new("u-2", "plan-pro", Some(Utc::now() + Duration::days(10)), true);
        repository.save(fresh).await.unwrap();

        let expired = policy.expire_due().await.unwrap();
        assert_eq!(expired, 1);

        let records = repository.records.read().unwrap().clone();
        let u1 = records.iter().find(|r| r.user_id == "u-1").unwrap();
        assert_eq!(u1.status, SubscriptionStatus::Expired);
        let u2 = records.iter().find(|r| r.user_id == "u-2").unwrap();
        assert_eq!(u2.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn test_past_end_date_blocks_plan_limits_before_sweep() {
        let (policy, repository) = make_policy();

        let mut stale = SubscriptionRecord::new("u-1", "plan-pro", None, true);
        stale.end_date = Some(Utc::now() - Duration::days(1));
        repository.save(stale).await.unwrap();

        // The sweep has not run, but the record is already dead.
        assert!(policy.active_subscription("u-1").unwrap().is_none());
        assert!(policy.plan_limits("u-1").unwrap().is_none());
    }
}
