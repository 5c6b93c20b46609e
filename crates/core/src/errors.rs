//! Core error types.
//!
//! The root error keeps the three user-facing failure families distinct,
//! because each drives different remediation: quota denials ("upgrade your
//! plan / wait for the next period"), service unavailability ("try again
//! shortly"), and invalid input ("fix your request").

use thiserror::Error;
use tradelens_market_data::MarketDataError;
use tradelens_vision::VisionError;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the platform core.
#[derive(Error, Debug)]
pub enum Error {
    /// Input validation failed before any external call was made.
    #[error("Input validation failed: {0}")]
    Validation(String),

    /// The subject's usage ceiling for the current period is exhausted.
    #[error("Usage quota exceeded for {action} in the current period")]
    QuotaExceeded {
        /// The metered action that was denied.
        action: String,
    },

    /// The user has no active subscription; access requires an explicit
    /// active record.
    #[error("No active subscription for user {0}")]
    NoActiveSubscription(String),

    /// No subscription record matched the request.
    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(String),

    /// No subscription plan matched the request.
    #[error("Subscription plan not found: {0}")]
    PlanNotFound(String),

    /// A store operation failed.
    #[error("Repository error: {0}")]
    Repository(String),

    /// Market data operation failed.
    #[error("Market data operation failed: {0}")]
    MarketData(#[from] MarketDataError),

    /// Vision analysis failed.
    #[error("Vision analysis failed: {0}")]
    Vision(#[from] VisionError),

    /// Unexpected error.
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl Error {
    /// True when the failure means "try again shortly" rather than a
    /// caller defect or a quota denial.
    pub fn is_service_unavailable(&self) -> bool {
        matches!(
            self,
            Error::MarketData(MarketDataError::Unavailable { .. })
                | Error::Vision(VisionError::Unavailable { .. })
        )
    }
}
