//! The quota gate callers consult before invoking an external gateway.
//!
//! The check-then-invoke-then-commit sequence is deliberately not atomic:
//! under high concurrency, usage can slightly exceed a ceiling. This is a
//! soft limit (abuse deterrent), not billing-grade metering - strict
//! per-user serialization is not worth its cost here.

use std::future::Future;
use std::sync::Arc;

use log::{debug, warn};

use crate::errors::{Error, Result};
use crate::subscription::{QuotaCeiling, SubscriptionPolicyTrait};
use crate::usage::{ActionType, SubjectKey, UsageTracker};

/// Default ceiling for anonymous sessions per rolling window.
const DEFAULT_ANONYMOUS_CEILING: u32 = 5;

/// Quota gate configuration.
#[derive(Clone, Debug)]
pub struct QuotaGateConfig {
    /// Actions allowed per rolling window for anonymous sessions.
    pub anonymous_ceiling: u32,
}

impl Default for QuotaGateConfig {
    fn default() -> Self {
        Self {
            anonymous_ceiling: DEFAULT_ANONYMOUS_CEILING,
        }
    }
}

/// Why a quota check denied the action.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DenialReason {
    /// Authenticated user without an active subscription.
    NoActiveSubscription,
    /// The period ceiling is exhausted.
    CeilingReached,
}

/// Outcome of a quota check.
#[derive(Clone, Debug)]
pub struct QuotaDecision {
    /// Whether the action may proceed.
    pub allowed: bool,
    /// Actions left in the period; None means unlimited.
    pub remaining: Option<i64>,
    /// Set when `allowed` is false.
    pub denial: Option<DenialReason>,
}

impl QuotaDecision {
    fn allow(remaining: Option<i64>) -> Self {
        Self {
            allowed: true,
            remaining,
            denial: None,
        }
    }

    fn deny(reason: DenialReason) -> Self {
        Self {
            allowed: false,
            remaining: Some(0),
            denial: Some(reason),
        }
    }
}

/// Consults the subscription policy and usage tracker before a metered
/// action, and records the usage event after it succeeds.
pub struct QuotaGate {
    policy: Arc<dyn SubscriptionPolicyTrait>,
    usage: Arc<UsageTracker>,
    config: QuotaGateConfig,
}

impl QuotaGate {
    pub fn new(
        policy: Arc<dyn SubscriptionPolicyTrait>,
        usage: Arc<UsageTracker>,
        config: QuotaGateConfig,
    ) -> Self {
        Self {
            policy,
            usage,
            config,
        }
    }

    /// Check whether the subject may perform the action, and how many
    /// actions remain in the current period.
    pub fn check_and_reserve(
        &self,
        subject: &SubjectKey,
        action: ActionType,
    ) -> Result<QuotaDecision> {
        let ceiling = match subject {
            SubjectKey::User(user_id) => match self.policy.plan_limits(user_id)? {
                None => {
                    debug!("Quota: user {} has no active subscription", user_id);
                    return Ok(QuotaDecision::deny(DenialReason::NoActiveSubscription));
                }
                Some(plan) => plan.monthly_ceiling,
            },
            // Anonymous sessions get a fixed ceiling, no plan lookup.
            SubjectKey::Session(_) => QuotaCeiling::Limited(self.config.anonymous_ceiling),
        };

        match ceiling {
            QuotaCeiling::Unlimited => Ok(QuotaDecision::allow(None)),
            QuotaCeiling::Limited(max) => {
                let max = i64::from(max);
                let used = self.usage.count_in_current_period(subject, action)?;
                let remaining = (max - used).max(0);

                if used < max {
                    Ok(QuotaDecision::allow(Some(remaining)))
                } else {
                    debug!(
                        "Quota: {} exhausted {} ({}/{} used)",
                        subject, action, used, max
                    );
                    Ok(QuotaDecision::deny(DenialReason::CeilingReached))
                }
            }
        }
    }

    /// Record the usage event for a completed action. Best-effort; never
    /// fails the caller.
    pub async fn commit(
        &self,
        subject: &SubjectKey,
        action: ActionType,
        resource_id: Option<String>,
    ) {
        self.usage
            .record(subject.clone(), action, resource_id, None)
            .await;
    }

    /// Run a metered operation behind the quota check, committing the
    /// usage event only on success.
    ///
    /// Denials surface as [`Error::QuotaExceeded`] or
    /// [`Error::NoActiveSubscription`] - distinct from service
    /// unavailability and invalid input, because each drives different
    /// user-facing remediation.
    pub async fn invoke<T, F, Fut>(
        &self,
        subject: &SubjectKey,
        action: ActionType,
        resource_id: Option<String>,
        operation: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let decision = self.check_and_reserve(subject, action)?;
        if !decision.allowed {
            warn!("Quota: denying {} for {}", action, subject);
            return Err(match decision.denial {
                Some(DenialReason::NoActiveSubscription) => {
                    Error::NoActiveSubscription(subject.key().to_string())
                }
                _ => Error::QuotaExceeded {
                    action: action.to_string(),
                },
            });
        }

        let value = operation().await?;
        self.commit(subject, action, resource_id).await;
        Ok(value)
    }
}
