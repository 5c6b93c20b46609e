//! TradeLens Core Crate
//!
//! Quota-gated usage accounting and orchestration on top of the outbound
//! gateways:
//!
//! - [`usage`]: append-only usage events and current-period counting
//! - [`subscription`]: plans, subscription lifecycle, and the policy that
//!   resolves a user to their quota ceiling
//! - [`quota`]: the quota gate callers consult before invoking a gateway
//! - [`stocks`]: validated stock price lookup
//! - [`charts`]: quota-gated chart analysis
//!
//! Persistence is an external collaborator: every store in this crate is a
//! trait, and tests run against in-memory mocks.

pub mod charts;
pub mod errors;
pub mod quota;
pub mod stocks;
pub mod subscription;
pub mod usage;

pub use charts::{ChartAnalysisRequest, ChartAnalysisService};
pub use errors::{Error, Result};
pub use quota::{DenialReason, QuotaDecision, QuotaGate, QuotaGateConfig};
pub use stocks::StockService;
pub use subscription::{
    BillingPeriod, PlanRepositoryTrait, QuotaCeiling, SubscriptionPlan, SubscriptionPolicy,
    SubscriptionPolicyTrait, SubscriptionRecord, SubscriptionRepositoryTrait, SubscriptionStatus,
};
pub use usage::{
    ActionType, MockUsageObserver, NoOpUsageObserver, SubjectKey, UsageEvent, UsageObserver,
    UsageRepositoryTrait, UsageTracker,
};
