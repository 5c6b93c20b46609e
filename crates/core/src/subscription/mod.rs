//! Subscription plans, lifecycle, and quota-ceiling resolution.

mod subscription_model;
mod subscription_service;
mod subscription_traits;

pub use subscription_model::{
    BillingPeriod, QuotaCeiling, SubscriptionPlan, SubscriptionRecord, SubscriptionStatus,
};
pub use subscription_service::SubscriptionPolicy;
pub use subscription_traits::{
    PlanRepositoryTrait, SubscriptionPolicyTrait, SubscriptionRepositoryTrait,
};
