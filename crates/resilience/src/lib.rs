//! TradeLens Resilience Crate
//!
//! Fault-tolerance primitives shared by the outbound gateways:
//!
//! - [`CircuitBreaker`]: per-resource failure-rate state machine that stops
//!   calling a failing dependency for a cooldown period.
//! - [`RetryExecutor`]: bounded retry with constant backoff, driven by the
//!   [`Retryable`] classification of each error.
//! - [`TokenCache`]: single-flight cached bearer credential with an expiry
//!   safety margin.
//! - [`RateLimiter`]: per-resource token-bucket pacing.
//!
//! All state is in-memory and per-process; it resets on restart. Every
//! primitive is an explicit, injectable instance so a test harness can
//! construct a fresh isolated copy — there are no globals here.

mod circuit_breaker;
mod rate_limiter;
mod retry;
mod token_cache;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitMetrics, CircuitState};
pub use rate_limiter::{RateLimit, RateLimiter};
pub use retry::{RetryClass, RetryConfig, RetryExecutor, Retryable};
pub use token_cache::{AccessToken, TokenCache, TokenCacheConfig};

/// Identifier for an external resource gated by these primitives
/// (e.g. "market-data", "vision-api").
pub type ResourceId = std::borrow::Cow<'static, str>;
