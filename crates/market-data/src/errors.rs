//! Error types and retry classification for market data operations.

use thiserror::Error;
use tradelens_resilience::{RetryClass, Retryable};

/// Errors that can occur while fetching market data.
///
/// Each variant classifies itself through [`Retryable`], which drives the
/// gateway's retry loop and circuit-breaker accounting.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The symbol is malformed or unknown. A caller defect - never
    /// retried and never counted against the circuit breaker.
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Credential acquisition failed. Fatal for the current call; the
    /// cached credential (if any) is left untouched.
    #[error("Token acquisition failed: {message}")]
    TokenAcquisition {
        /// Description of the underlying failure.
        message: String,
    },

    /// The circuit breaker rejected the call before it reached the
    /// remote service.
    #[error("Circuit open: {resource}")]
    CircuitOpen {
        /// The resource with an open circuit.
        resource: String,
    },

    /// The remote call timed out (per-call or caller deadline).
    #[error("Timeout: {resource}")]
    Timeout {
        /// The resource that timed out.
        resource: String,
    },

    /// The provider rate limited the request (HTTP 429).
    #[error("Rate limited: {resource}")]
    RateLimited {
        /// The resource that rate limited the request.
        resource: String,
    },

    /// The provider returned an error response (non-2xx or a failure
    /// result code in the payload).
    #[error("Provider error: {resource} - {message}")]
    Provider {
        /// The resource that returned the error.
        resource: String,
        /// The error message from the provider.
        message: String,
    },

    /// A network error occurred while communicating with the provider.
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service is temporarily unavailable: the circuit was open or
    /// all retries were exhausted. This is the typed fallback surfaced to
    /// callers - never synthetic data.
    #[error("Market data service temporarily unavailable: {resource}")]
    Unavailable {
        /// The resource that is unavailable.
        resource: String,
    },
}

impl Retryable for MarketDataError {
    fn retry_class(&self) -> RetryClass {
        match self {
            Self::InvalidSymbol(_) | Self::TokenAcquisition { .. } | Self::Unavailable { .. } => {
                RetryClass::Terminal
            }
            Self::Timeout { .. }
            | Self::RateLimited { .. }
            | Self::Provider { .. }
            | Self::Transport(_) => RetryClass::Transient,
            Self::CircuitOpen { .. } => RetryClass::CircuitOpen,
        }
    }
}

impl MarketDataError {
    /// True when this error should be recorded as a failure in the
    /// circuit breaker window.
    ///
    /// Caller defects and breaker rejections are not dependency failures
    /// and must not skew the failure rate.
    pub fn counts_against_breaker(&self) -> bool {
        matches!(self.retry_class(), RetryClass::Transient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_symbol_is_terminal() {
        let error = MarketDataError::InvalidSymbol("ABC".to_string());
        assert_eq!(error.retry_class(), RetryClass::Terminal);
        assert!(!error.counts_against_breaker());
    }

    #[test]
    fn test_token_acquisition_is_terminal() {
        let error = MarketDataError::TokenAcquisition {
            message: "401".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::Terminal);
    }

    #[test]
    fn test_timeout_is_transient() {
        let error = MarketDataError::Timeout {
            resource: "market-data".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::Transient);
        assert!(error.counts_against_breaker());
    }

    #[test]
    fn test_rate_limited_is_transient() {
        let error = MarketDataError::RateLimited {
            resource: "market-data".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::Transient);
    }

    #[test]
    fn test_provider_error_is_transient() {
        let error = MarketDataError::Provider {
            resource: "market-data".to_string(),
            message: "internal error".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::Transient);
    }

    #[test]
    fn test_circuit_open_is_not_retried_and_not_counted() {
        let error = MarketDataError::CircuitOpen {
            resource: "market-data".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::CircuitOpen);
        assert!(!error.counts_against_breaker());
    }

    #[test]
    fn test_unavailable_is_terminal() {
        let error = MarketDataError::Unavailable {
            resource: "market-data".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::Terminal);
    }

    #[test]
    fn test_error_display() {
        let error = MarketDataError::InvalidSymbol("00X".to_string());
        assert_eq!(format!("{}", error), "Invalid symbol: 00X");

        let error = MarketDataError::CircuitOpen {
            resource: "market-data".to_string(),
        };
        assert_eq!(format!("{}", error), "Circuit open: market-data");
    }
}
