//! Quote gateway: resilient orchestration around a quote provider.
//!
//! Order of concerns is explicit and fixed:
//!
//! 1. Symbol validation (a caller defect never reaches the resilience
//!    machinery and is never recorded as a dependency failure)
//! 2. Credential from the single-flight token cache
//! 3. Circuit-breaker permit - the breaker gates *before* any retry cost
//!    is incurred
//! 4. Retry loop; each attempt is rate-limited, bounded by the per-call
//!    timeout (or the caller deadline, whichever is sooner), and its
//!    outcome recorded into the breaker window
//! 5. On circuit-open or retry exhaustion, a typed unavailable error is
//!    surfaced - never synthetic data

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, error, warn};
use tradelens_resilience::{
    CircuitBreaker, CircuitBreakerConfig, RateLimit, RateLimiter, ResourceId, RetryClass,
    RetryConfig, RetryExecutor, Retryable, TokenCache, TokenCacheConfig,
};

use crate::errors::MarketDataError;
use crate::models::{CandleInterval, StockQuote};
use crate::provider::QuoteProvider;

/// Default per-call timeout for quote inquiries.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for a quote gateway - one set per external resource.
#[derive(Clone, Debug)]
pub struct QuoteGatewayConfig {
    /// Circuit breaker settings for the provider resource.
    pub breaker: CircuitBreakerConfig,
    /// Retry budget and backoff.
    pub retry: RetryConfig,
    /// Token cache expiry handling.
    pub token: TokenCacheConfig,
    /// Outbound pacing toward the provider.
    pub rate_limit: RateLimit,
    /// Per-call timeout for a single remote attempt.
    pub call_timeout: Duration,
}

impl Default for QuoteGatewayConfig {
    fn default() -> Self {
        Self {
            breaker: CircuitBreakerConfig::default(),
            retry: RetryConfig {
                max_attempts: 3,
                base_delay: Duration::from_secs(1),
            },
            token: TokenCacheConfig::default(),
            rate_limit: RateLimit::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// Gateway interface exposed to callers.
#[async_trait]
pub trait QuoteGatewayTrait: Send + Sync {
    /// Fetch the current quote for a symbol.
    async fn get_quote(
        &self,
        symbol: &str,
        interval: CandleInterval,
    ) -> Result<StockQuote, MarketDataError>;

    /// Fetch with a caller-supplied deadline that propagates into the
    /// remote call's timeout.
    async fn get_quote_with_deadline(
        &self,
        symbol: &str,
        interval: CandleInterval,
        deadline: Instant,
    ) -> Result<StockQuote, MarketDataError>;
}

/// Resilient gateway around a [`QuoteProvider`].
pub struct QuoteGateway {
    provider: Arc<dyn QuoteProvider>,
    resource: ResourceId,
    tokens: TokenCache,
    breaker: Arc<CircuitBreaker>,
    limiter: Arc<RateLimiter>,
    retry: RetryExecutor,
    call_timeout: Duration,
}

impl QuoteGateway {
    /// Create a gateway owning fresh resilience state.
    pub fn new(provider: Arc<dyn QuoteProvider>, config: QuoteGatewayConfig) -> Self {
        let breaker = Arc::new(CircuitBreaker::with_config(config.breaker.clone()));
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        Self::with_components(provider, config, breaker, limiter)
    }

    /// Create a gateway sharing breaker and limiter instances with other
    /// gateways targeting the same resource.
    pub fn with_components(
        provider: Arc<dyn QuoteProvider>,
        config: QuoteGatewayConfig,
        breaker: Arc<CircuitBreaker>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        let resource: ResourceId = std::borrow::Cow::Borrowed(provider.id());
        Self {
            provider,
            resource,
            tokens: TokenCache::with_config(config.token),
            breaker,
            limiter,
            retry: RetryExecutor::new(config.retry),
            call_timeout: config.call_timeout,
        }
    }

    /// The circuit breaker gating this gateway, for observers and tests.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    fn validate_symbol(symbol: &str) -> Result<(), MarketDataError> {
        if symbol.len() == 6 && symbol.bytes().all(|b| b.is_ascii_digit()) {
            Ok(())
        } else {
            Err(MarketDataError::InvalidSymbol(symbol.to_string()))
        }
    }

    /// Timeout for one attempt: the per-call timeout, shortened by the
    /// caller deadline when one is set. An already-elapsed deadline is a
    /// timeout failure, not a pending call.
    fn attempt_timeout(&self, deadline: Option<Instant>) -> Result<Duration, MarketDataError> {
        match deadline {
            None => Ok(self.call_timeout),
            Some(d) => match d.checked_duration_since(Instant::now()) {
                Some(remaining) => Ok(remaining.min(self.call_timeout)),
                None => Err(MarketDataError::Timeout {
                    resource: self.resource.to_string(),
                }),
            },
        }
    }

    fn unavailable(&self) -> MarketDataError {
        MarketDataError::Unavailable {
            resource: self.resource.to_string(),
        }
    }

    async fn fetch(
        &self,
        symbol: &str,
        interval: CandleInterval,
        deadline: Option<Instant>,
    ) -> Result<StockQuote, MarketDataError> {
        Self::validate_symbol(symbol)?;

        let provider = Arc::clone(&self.provider);
        let token = self
            .tokens
            .get_or_acquire(|| async move { provider.acquire_token().await })
            .await?;

        // Breaker gates before any retry cost is incurred.
        let result = if self.breaker.is_allowed(&self.resource) {
            self.retry
                .execute(self.provider.id(), || {
                    let token = token.clone();
                    async move {
                        self.limiter.acquire(&self.resource).await;
                        let timeout = self.attempt_timeout(deadline);

                        let attempt = match timeout {
                            Ok(t) => {
                                match tokio::time::timeout(
                                    t,
                                    self.provider.fetch_quote(&token, symbol, interval),
                                )
                                .await
                                {
                                    Ok(result) => result,
                                    Err(_) => Err(MarketDataError::Timeout {
                                        resource: self.resource.to_string(),
                                    }),
                                }
                            }
                            Err(e) => Err(e),
                        };

                        match &attempt {
                            Ok(_) => self.breaker.record_success(&self.resource),
                            Err(e) if e.counts_against_breaker() => {
                                self.breaker.record_failure(&self.resource)
                            }
                            Err(_) => {}
                        }

                        attempt
                    }
                })
                .await
        } else {
            debug!("Quote gateway: circuit open for '{}'", self.resource);
            Err(MarketDataError::CircuitOpen {
                resource: self.resource.to_string(),
            })
        };

        match result {
            Ok(quote) => Ok(quote),
            Err(e) => match e.retry_class() {
                // Fallback: surface a typed unavailable error, never
                // placeholder prices.
                RetryClass::Transient => {
                    error!(
                        "Quote gateway: '{}' exhausted retries for {}: {}",
                        self.resource, symbol, e
                    );
                    Err(self.unavailable())
                }
                RetryClass::CircuitOpen => {
                    warn!(
                        "Quote gateway: '{}' rejected {} while circuit open",
                        self.resource, symbol
                    );
                    Err(self.unavailable())
                }
                RetryClass::Terminal => Err(e),
            },
        }
    }
}

#[async_trait]
impl QuoteGatewayTrait for QuoteGateway {
    async fn get_quote(
        &self,
        symbol: &str,
        interval: CandleInterval,
    ) -> Result<StockQuote, MarketDataError> {
        self.fetch(symbol, interval, None).await
    }

    async fn get_quote_with_deadline(
        &self,
        symbol: &str,
        interval: CandleInterval,
        deadline: Instant,
    ) -> Result<StockQuote, MarketDataError> {
        self.fetch(symbol, interval, Some(deadline)).await
    }
}
