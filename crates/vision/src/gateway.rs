//! Vision gateway: resilient orchestration around a vision provider.
//!
//! Same explicit composition as the quote gateway - breaker permit before
//! retry cost, per-attempt timeout, outcomes recorded into the breaker
//! window, typed unavailable fallback - with two differences: calls carry
//! a static API key held by the provider (the degenerate zero-TTL
//! credential case, so there is no token cache), and analysis can be
//! dispatched onto a bounded background worker pool because LLM latency
//! is incompatible with synchronous request handling.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, error, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tradelens_resilience::{
    CircuitBreaker, CircuitBreakerConfig, ResourceId, RetryClass, RetryConfig, RetryExecutor,
    Retryable,
};

use crate::error::VisionError;
use crate::provider::VisionProvider;

/// Default per-call timeout. Vision calls are bounded by LLM inference
/// latency, not quote latency.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Default cooldown while the vision circuit is open.
const DEFAULT_OPEN_DURATION: Duration = Duration::from_secs(30);

/// Default background worker pool size.
const DEFAULT_WORKER_PERMITS: usize = 4;

/// Configuration for the vision gateway.
#[derive(Clone, Debug)]
pub struct VisionGatewayConfig {
    /// Circuit breaker settings for the vision resource.
    pub breaker: CircuitBreakerConfig,
    /// Retry budget and backoff.
    pub retry: RetryConfig,
    /// Per-call timeout for a single remote attempt.
    pub call_timeout: Duration,
    /// Maximum concurrent background analyses.
    pub worker_permits: usize,
}

impl Default for VisionGatewayConfig {
    fn default() -> Self {
        Self {
            breaker: CircuitBreakerConfig {
                open_duration: DEFAULT_OPEN_DURATION,
                ..CircuitBreakerConfig::default()
            },
            retry: RetryConfig {
                max_attempts: 2,
                base_delay: Duration::from_secs(2),
            },
            call_timeout: DEFAULT_CALL_TIMEOUT,
            worker_permits: DEFAULT_WORKER_PERMITS,
        }
    }
}

/// Analyzer interface exposed to callers.
#[async_trait]
pub trait ChartAnalyzerTrait: Send + Sync {
    /// Analyze a chart image inline, blocking the caller for up to the
    /// configured timeout per attempt.
    async fn analyze_chart(&self, prompt: &str, image_base64: &str)
        -> Result<String, VisionError>;

    /// Analyze with a caller-supplied deadline that propagates into the
    /// remote call's timeout.
    async fn analyze_chart_with_deadline(
        &self,
        prompt: &str,
        image_base64: &str,
        deadline: Instant,
    ) -> Result<String, VisionError>;
}

/// Handle to a background analysis dispatched via
/// [`VisionGateway::spawn_analysis`].
pub struct AnalysisHandle {
    inner: JoinHandle<Result<String, VisionError>>,
}

impl AnalysisHandle {
    /// Wait for the analysis to finish and return its result.
    pub async fn join(self) -> Result<String, VisionError> {
        self.inner
            .await
            .map_err(|e| VisionError::TaskFailed(e.to_string()))?
    }

    /// Abort the background analysis.
    pub fn abort(&self) {
        self.inner.abort();
    }
}

/// Resilient gateway around a [`VisionProvider`].
pub struct VisionGateway {
    provider: Arc<dyn VisionProvider>,
    resource: ResourceId,
    breaker: Arc<CircuitBreaker>,
    retry: RetryExecutor,
    call_timeout: Duration,
    workers: Arc<Semaphore>,
}

impl VisionGateway {
    /// Create a gateway owning fresh resilience state.
    pub fn new(provider: Arc<dyn VisionProvider>, config: VisionGatewayConfig) -> Self {
        let breaker = Arc::new(CircuitBreaker::with_config(config.breaker.clone()));
        Self::with_breaker(provider, config, breaker)
    }

    /// Create a gateway sharing a breaker instance.
    pub fn with_breaker(
        provider: Arc<dyn VisionProvider>,
        config: VisionGatewayConfig,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        let resource: ResourceId = std::borrow::Cow::Borrowed(provider.id());
        Self {
            provider,
            resource,
            breaker,
            retry: RetryExecutor::new(config.retry),
            call_timeout: config.call_timeout,
            workers: Arc::new(Semaphore::new(config.worker_permits.max(1))),
        }
    }

    /// The circuit breaker gating this gateway, for observers and tests.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Dispatch an analysis onto the bounded background pool.
    ///
    /// Returns immediately with a handle; the analysis starts as soon as
    /// a worker permit is free. Delivery of the result to an end user is
    /// the caller's concern - this only guarantees asynchronous
    /// initiation.
    pub fn spawn_analysis(
        self: &Arc<Self>,
        prompt: String,
        image_base64: String,
    ) -> AnalysisHandle {
        let gateway = Arc::clone(self);
        let workers = Arc::clone(&self.workers);

        let inner = tokio::spawn(async move {
            let _permit = workers
                .acquire_owned()
                .await
                .map_err(|_| VisionError::TaskFailed("worker pool closed".to_string()))?;
            gateway.analyze_chart(&prompt, &image_base64).await
        });

        AnalysisHandle { inner }
    }

    fn unavailable(&self) -> VisionError {
        VisionError::Unavailable {
            resource: self.resource.to_string(),
        }
    }

    /// Timeout for one attempt: the per-call timeout, shortened by the
    /// caller deadline when one is set. An already-elapsed deadline is a
    /// timeout failure, not a pending call.
    fn attempt_timeout(&self, deadline: Option<Instant>) -> Result<Duration, VisionError> {
        match deadline {
            None => Ok(self.call_timeout),
            Some(d) => match d.checked_duration_since(Instant::now()) {
                Some(remaining) => Ok(remaining.min(self.call_timeout)),
                None => Err(VisionError::Timeout {
                    resource: self.resource.to_string(),
                }),
            },
        }
    }

    async fn analyze(
        &self,
        prompt: &str,
        image_base64: &str,
        deadline: Option<Instant>,
    ) -> Result<String, VisionError> {
        // Breaker gates before any retry cost is incurred.
        let result = if self.breaker.is_allowed(&self.resource) {
            self.retry
                .execute(self.provider.id(), || async move {
                    let started = Instant::now();
                    let timeout = self.attempt_timeout(deadline);

                    let attempt = match timeout {
                        Ok(t) => {
                            match tokio::time::timeout(
                                t,
                                self.provider.analyze(prompt, image_base64),
                            )
                            .await
                            {
                                Ok(result) => result,
                                Err(_) => Err(VisionError::Timeout {
                                    resource: self.resource.to_string(),
                                }),
                            }
                        }
                        Err(e) => Err(e),
                    };

                    match &attempt {
                        Ok(_) => {
                            debug!(
                                "Vision gateway: analysis attempt took {:?}",
                                started.elapsed()
                            );
                            self.breaker.record_success(&self.resource)
                        }
                        Err(e) if e.counts_against_breaker() => {
                            self.breaker.record_failure(&self.resource)
                        }
                        Err(_) => {}
                    }

                    attempt
                })
                .await
        } else {
            debug!("Vision gateway: circuit open for '{}'", self.resource);
            Err(VisionError::CircuitOpen {
                resource: self.resource.to_string(),
            })
        };

        match result {
            Ok(analysis) => Ok(analysis),
            Err(e) => match e.retry_class() {
                RetryClass::Transient => {
                    error!(
                        "Vision gateway: '{}' exhausted retries: {}",
                        self.resource, e
                    );
                    Err(self.unavailable())
                }
                RetryClass::CircuitOpen => {
                    warn!(
                        "Vision gateway: '{}' rejected analysis while circuit open",
                        self.resource
                    );
                    Err(self.unavailable())
                }
                RetryClass::Terminal => Err(e),
            },
        }
    }
}

#[async_trait]
impl ChartAnalyzerTrait for VisionGateway {
    async fn analyze_chart(
        &self,
        prompt: &str,
        image_base64: &str,
    ) -> Result<String, VisionError> {
        self.analyze(prompt, image_base64, None).await
    }

    async fn analyze_chart_with_deadline(
        &self,
        prompt: &str,
        image_base64: &str,
        deadline: Instant,
    ) -> Result<String, VisionError> {
        self.analyze(prompt, image_base64, Some(deadline)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tradelens_resilience::CircuitState;

    struct MockVisionProvider {
        calls: AtomicU32,
        in_flight: AtomicU32,
        max_in_flight: AtomicU32,
        failures_before_success: u32,
        empty_result: bool,
        delay: Option<Duration>,
    }

    impl MockVisionProvider {
        fn healthy() -> Self {
            Self {
                calls: AtomicU32::new(0),
                in_flight: AtomicU32::new(0),
                max_in_flight: AtomicU32::new(0),
                failures_before_success: 0,
                empty_result: false,
                delay: None,
            }
        }
    }

    #[async_trait]
    impl VisionProvider for MockVisionProvider {
        fn id(&self) -> &'static str {
            "mock-vision"
        }

        async fn analyze(&self, _prompt: &str, _image: &str) -> Result<String, VisionError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if call <= self.failures_before_success {
                return Err(VisionError::provider("HTTP 502"));
            }
            if self.empty_result {
                return Err(VisionError::EmptyAnalysis);
            }
            Ok(r#"{"trend":"up"}"#.to_string())
        }
    }

    fn fast_config() -> VisionGatewayConfig {
        VisionGatewayConfig {
            breaker: CircuitBreakerConfig {
                window_size: 4,
                failure_rate_threshold: 50,
                open_duration: Duration::from_secs(60),
                half_open_trial_calls: 2,
            },
            retry: RetryConfig {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
            },
            call_timeout: Duration::from_secs(5),
            worker_permits: 2,
        }
    }

    #[tokio::test]
    async fn test_analysis_success() {
        let provider = Arc::new(MockVisionProvider::healthy());
        let gateway = VisionGateway::new(Arc::clone(&provider) as _, fast_config());

        let result = gateway.analyze_chart("prompt", "aW1hZ2U=").await.unwrap();
        assert_eq!(result, r#"{"trend":"up"}"#);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_retried_then_succeeds() {
        let provider = Arc::new(MockVisionProvider {
            failures_before_success: 1,
            ..MockVisionProvider::healthy()
        });
        let gateway = VisionGateway::new(Arc::clone(&provider) as _, fast_config());

        let result = gateway.analyze_chart("prompt", "aW1hZ2U=").await.unwrap();
        assert!(!result.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_surfaces_unavailable() {
        let provider = Arc::new(MockVisionProvider {
            failures_before_success: 10,
            ..MockVisionProvider::healthy()
        });
        let gateway = VisionGateway::new(Arc::clone(&provider) as _, fast_config());

        let result = gateway.analyze_chart("prompt", "aW1hZ2U=").await;
        assert!(matches!(result, Err(VisionError::Unavailable { .. })));
        // max_attempts is 2 for the vision path.
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_analysis_is_not_retried() {
        let provider = Arc::new(MockVisionProvider {
            empty_result: true,
            ..MockVisionProvider::healthy()
        });
        let gateway = VisionGateway::new(Arc::clone(&provider) as _, fast_config());

        let result = gateway.analyze_chart("prompt", "aW1hZ2U=").await;
        assert!(matches!(result, Err(VisionError::EmptyAnalysis)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_open_circuit_rejects_without_remote_call() {
        let provider = Arc::new(MockVisionProvider::healthy());
        let gateway = VisionGateway::new(Arc::clone(&provider) as _, fast_config());
        let resource: ResourceId = std::borrow::Cow::Borrowed("mock-vision");

        for _ in 0..4 {
            gateway.breaker().record_failure(&resource);
        }
        assert_eq!(gateway.breaker().state(&resource), CircuitState::Open);

        let result = gateway.analyze_chart("prompt", "aW1hZ2U=").await;
        assert!(matches!(result, Err(VisionError::Unavailable { .. })));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_elapsed_deadline_is_a_failure_not_pending() {
        let provider = Arc::new(MockVisionProvider::healthy());
        let gateway = VisionGateway::new(Arc::clone(&provider) as _, fast_config());

        let past = Instant::now() - Duration::from_millis(10);
        let result = gateway
            .analyze_chart_with_deadline("prompt", "aW1hZ2U=", past)
            .await;

        assert!(matches!(result, Err(VisionError::Unavailable { .. })));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        // The elapsed deadline still counts for breaker accounting.
        assert!(gateway.breaker().metrics()[0].window_failures > 0);
    }

    #[tokio::test]
    async fn test_spawn_analysis_returns_result_via_handle() {
        let provider = Arc::new(MockVisionProvider::healthy());
        let gateway = Arc::new(VisionGateway::new(Arc::clone(&provider) as _, fast_config()));

        let handle = gateway.spawn_analysis("prompt".to_string(), "aW1hZ2U=".to_string());
        let result = handle.join().await.unwrap();
        assert_eq!(result, r#"{"trend":"up"}"#);
    }

    #[tokio::test]
    async fn test_worker_pool_bounds_concurrency() {
        let provider = Arc::new(MockVisionProvider {
            delay: Some(Duration::from_millis(20)),
            ..MockVisionProvider::healthy()
        });
        let config = VisionGatewayConfig {
            worker_permits: 1,
            ..fast_config()
        };
        let gateway = Arc::new(VisionGateway::new(Arc::clone(&provider) as _, config));

        let handles: Vec<_> = (0..3)
            .map(|_| gateway.spawn_analysis("prompt".to_string(), "aW1hZ2U=".to_string()))
            .collect();

        for handle in handles {
            handle.join().await.unwrap();
        }

        // A single permit means analyses never overlapped.
        assert_eq!(provider.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }
}
