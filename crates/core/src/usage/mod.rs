//! Usage event recording and current-period counting.

mod observer;
mod usage_model;
mod usage_service;
mod usage_traits;

pub use observer::{MockUsageObserver, NoOpUsageObserver, UsageObserver};
pub use usage_model::{ActionType, SubjectKey, UsageEvent};
pub use usage_service::UsageTracker;
pub use usage_traits::UsageRepositoryTrait;
