//! Vision analysis error types.

use thiserror::Error;
use tradelens_resilience::{RetryClass, Retryable};

/// Vision analysis errors.
#[derive(Debug, Error)]
pub enum VisionError {
    /// Invalid input or request.
    #[error("{0}")]
    InvalidInput(String),

    /// No API key configured for the provider.
    #[error("Missing API key for provider {0}")]
    MissingApiKey(String),

    /// The model returned an empty or blank analysis.
    #[error("Analysis result was empty")]
    EmptyAnalysis,

    /// The circuit breaker rejected the call.
    #[error("Circuit open: {resource}")]
    CircuitOpen {
        /// The resource with an open circuit.
        resource: String,
    },

    /// The remote call timed out.
    #[error("Timeout: {resource}")]
    Timeout {
        /// The resource that timed out.
        resource: String,
    },

    /// Provider error (non-2xx or a malformed response).
    #[error("Provider error: {0}")]
    Provider(String),

    /// A network error occurred while communicating with the provider.
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The analysis service is temporarily unavailable: the circuit was
    /// open or all retries were exhausted.
    #[error("Analysis service temporarily unavailable: {resource}")]
    Unavailable {
        /// The resource that is unavailable.
        resource: String,
    },

    /// The background analysis task was cancelled or panicked.
    #[error("Analysis task failed: {0}")]
    TaskFailed(String),
}

impl VisionError {
    /// Create a new invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new provider error.
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Error code for programmatic handling.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::MissingApiKey(_) => "MISSING_API_KEY",
            Self::EmptyAnalysis => "EMPTY_ANALYSIS",
            Self::CircuitOpen { .. } => "CIRCUIT_OPEN",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Provider(_) => "PROVIDER_ERROR",
            Self::Transport(_) => "NETWORK_ERROR",
            Self::Unavailable { .. } => "SERVICE_UNAVAILABLE",
            Self::TaskFailed(_) => "TASK_FAILED",
        }
    }
}

impl Retryable for VisionError {
    fn retry_class(&self) -> RetryClass {
        match self {
            Self::InvalidInput(_)
            | Self::MissingApiKey(_)
            | Self::EmptyAnalysis
            | Self::Unavailable { .. }
            | Self::TaskFailed(_) => RetryClass::Terminal,
            Self::Timeout { .. } | Self::Provider(_) | Self::Transport(_) => RetryClass::Transient,
            Self::CircuitOpen { .. } => RetryClass::CircuitOpen,
        }
    }
}

impl VisionError {
    /// True when this error should be recorded as a failure in the
    /// circuit breaker window.
    pub fn counts_against_breaker(&self) -> bool {
        matches!(self.retry_class(), RetryClass::Transient)
    }
}
