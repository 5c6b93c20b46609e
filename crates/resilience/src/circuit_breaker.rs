//! Per-resource circuit breaker over a sliding window of call outcomes.
//!
//! The circuit has three states:
//!
//! - **Closed**: normal operation, calls are allowed and outcomes recorded.
//! - **Open**: the failure rate over the window crossed the threshold;
//!   calls are rejected without reaching the remote service.
//! - **HalfOpen**: after the cooldown, a bounded number of trial calls probe
//!   whether the dependency has recovered.
//!
//! Unlike a consecutive-failure counter, the window keeps the most recent
//! `window_size` outcomes (successes and failures) and the breaker opens
//! when the window is full and the failure percentage reaches the
//! configured threshold.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::ResourceId;

/// Default number of recent outcomes retained per resource.
const DEFAULT_WINDOW_SIZE: usize = 10;

/// Default failure-rate threshold in percent.
const DEFAULT_FAILURE_RATE_THRESHOLD: u8 = 50;

/// Default time to wait before transitioning from Open to HalfOpen.
const DEFAULT_OPEN_DURATION: Duration = Duration::from_secs(60);

/// Default number of trial calls permitted in HalfOpen.
const DEFAULT_HALF_OPEN_TRIAL_CALLS: u32 = 3;

/// Circuit breaker state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CircuitState {
    /// Normal operation - calls are allowed.
    Closed,
    /// Dependency is failing - calls are rejected.
    Open,
    /// Testing recovery - a bounded number of trial calls allowed.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    /// Count of most recent outcomes retained in the sliding window.
    pub window_size: usize,
    /// Failure percentage (0-100) at which a full window opens the circuit.
    pub failure_rate_threshold: u8,
    /// Time to wait in Open before probing recovery.
    pub open_duration: Duration,
    /// Number of trial calls permitted in HalfOpen.
    pub half_open_trial_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            failure_rate_threshold: DEFAULT_FAILURE_RATE_THRESHOLD,
            open_duration: DEFAULT_OPEN_DURATION,
            half_open_trial_calls: DEFAULT_HALF_OPEN_TRIAL_CALLS,
        }
    }
}

/// Internal circuit state for a single resource.
#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    /// Sliding window of outcomes; `true` marks a failure.
    window: VecDeque<bool>,
    /// When the circuit last transitioned to Open.
    opened_at: Option<Instant>,
    /// Trial permits left in HalfOpen.
    trial_remaining: u32,
    /// Consecutive trial successes in HalfOpen.
    trial_successes: u32,
}

impl Circuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            window: VecDeque::new(),
            opened_at: None,
            trial_remaining: 0,
            trial_successes: 0,
        }
    }

    fn failures(&self) -> usize {
        self.window.iter().filter(|f| **f).count()
    }
}

/// Per-resource circuit breaker.
///
/// Thread-safe: all reads-then-writes for a resource happen under one lock,
/// so the check-window-maybe-transition sequence is atomic with respect to
/// concurrent callers. Distinct resources are fully independent.
pub struct CircuitBreaker {
    circuits: Mutex<HashMap<String, Circuit>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with default settings.
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    /// Create a circuit breaker with custom configuration.
    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            circuits: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Lock the circuits mutex, recovering from poison if necessary.
    ///
    /// Recovering is safe here: the worst case is slightly stale circuit
    /// state, which beats panicking every caller.
    fn lock_circuits(&self) -> MutexGuard<'_, HashMap<String, Circuit>> {
        self.circuits.lock().unwrap_or_else(|poisoned| {
            warn!("Circuit breaker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Check whether a call to the resource may proceed.
    ///
    /// Returns true in Closed; in HalfOpen while trial permits remain (each
    /// permitted call consumes one); false in Open until the cooldown
    /// elapses, at which point the circuit moves to HalfOpen and the
    /// transitioning call is permitted as the first trial.
    pub fn is_allowed(&self, resource: &ResourceId) -> bool {
        let mut circuits = self.lock_circuits();

        let circuit = circuits
            .entry(resource.to_string())
            .or_insert_with(Circuit::new);

        match circuit.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let cooled_down = circuit
                    .opened_at
                    .map(|at| at.elapsed() >= self.config.open_duration)
                    .unwrap_or(true);

                if cooled_down {
                    info!(
                        "Circuit breaker: transitioning '{}' from Open to HalfOpen",
                        resource
                    );
                    circuit.state = CircuitState::HalfOpen;
                    // The transitioning call is the first trial.
                    circuit.trial_remaining = self.config.half_open_trial_calls.max(1) - 1;
                    circuit.trial_successes = 0;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if circuit.trial_remaining > 0 {
                    circuit.trial_remaining -= 1;
                    true
                } else {
                    debug!(
                        "Circuit breaker: trial budget exhausted for '{}', rejecting",
                        resource
                    );
                    false
                }
            }
        }
    }

    /// Record a successful call outcome for the resource.
    pub fn record_success(&self, resource: &ResourceId) {
        let mut circuits = self.lock_circuits();

        let circuit = circuits
            .entry(resource.to_string())
            .or_insert_with(Circuit::new);

        match circuit.state {
            CircuitState::Closed => {
                Self::push_outcome(circuit, false, self.config.window_size);
            }
            CircuitState::HalfOpen => {
                circuit.trial_successes += 1;
                debug!(
                    "Circuit breaker: trial success for '{}' ({}/{})",
                    resource, circuit.trial_successes, self.config.half_open_trial_calls
                );

                if circuit.trial_successes >= self.config.half_open_trial_calls {
                    info!(
                        "Circuit breaker: closing circuit for '{}' after {} trial successes",
                        resource, circuit.trial_successes
                    );
                    circuit.state = CircuitState::Closed;
                    circuit.window.clear();
                    circuit.opened_at = None;
                    circuit.trial_remaining = 0;
                    circuit.trial_successes = 0;
                }
            }
            CircuitState::Open => {
                // A call admitted before the transition finished late.
                debug!(
                    "Circuit breaker: success for '{}' recorded while Open, ignoring",
                    resource
                );
            }
        }
    }

    /// Record a failed call outcome for the resource.
    ///
    /// In Closed, appends to the window and opens the circuit when the
    /// window is full and the failure rate reaches the threshold. In
    /// HalfOpen, any failure immediately reopens the circuit and discards
    /// the remaining trial budget.
    pub fn record_failure(&self, resource: &ResourceId) {
        let mut circuits = self.lock_circuits();

        let circuit = circuits
            .entry(resource.to_string())
            .or_insert_with(Circuit::new);

        match circuit.state {
            CircuitState::Closed => {
                Self::push_outcome(circuit, true, self.config.window_size);

                let failures = circuit.failures();
                let window_full = circuit.window.len() >= self.config.window_size;
                let threshold_reached = failures * 100
                    >= self.config.failure_rate_threshold as usize * self.config.window_size;

                if window_full && threshold_reached {
                    info!(
                        "Circuit breaker: opening circuit for '{}' ({}/{} failures in window)",
                        resource,
                        failures,
                        circuit.window.len()
                    );
                    circuit.state = CircuitState::Open;
                    circuit.opened_at = Some(Instant::now());
                } else {
                    debug!(
                        "Circuit breaker: failure for '{}' ({}/{} in window)",
                        resource,
                        failures,
                        circuit.window.len()
                    );
                }
            }
            CircuitState::HalfOpen => {
                info!(
                    "Circuit breaker: reopening circuit for '{}' after failure in HalfOpen",
                    resource
                );
                circuit.state = CircuitState::Open;
                circuit.opened_at = Some(Instant::now());
                circuit.trial_remaining = 0;
                circuit.trial_successes = 0;
            }
            CircuitState::Open => {
                // Late failure from a call admitted before the transition.
                debug!(
                    "Circuit breaker: additional failure for '{}' (already open)",
                    resource
                );
            }
        }
    }

    fn push_outcome(circuit: &mut Circuit, is_failure: bool, window_size: usize) {
        circuit.window.push_back(is_failure);
        while circuit.window.len() > window_size {
            circuit.window.pop_front();
        }
    }

    /// Get the current state for a resource.
    pub fn state(&self, resource: &ResourceId) -> CircuitState {
        let circuits = self.lock_circuits();

        circuits
            .get(resource.as_ref())
            .map(|c| c.state)
            .unwrap_or(CircuitState::Closed)
    }

    /// Reset the circuit for a resource to Closed with an empty window.
    pub fn reset(&self, resource: &ResourceId) {
        let mut circuits = self.lock_circuits();

        if circuits.remove(resource.as_ref()).is_some() {
            info!("Circuit breaker: manually reset circuit for '{}'", resource);
        }
    }

    /// Reset all circuits to their initial state.
    pub fn reset_all(&self) {
        let mut circuits = self.lock_circuits();
        circuits.clear();
        info!("Circuit breaker: all circuits reset");
    }

    /// Snapshot metrics for all tracked resources.
    pub fn metrics(&self) -> Vec<CircuitMetrics> {
        let circuits = self.lock_circuits();

        circuits
            .iter()
            .map(|(resource, circuit)| CircuitMetrics {
                resource: resource.clone(),
                state: circuit.state,
                window_failures: circuit.failures(),
                window_len: circuit.window.len(),
                opened_at: circuit.opened_at,
            })
            .collect()
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time metrics for a single circuit.
#[derive(Clone, Debug)]
pub struct CircuitMetrics {
    /// Resource identifier.
    pub resource: String,
    /// Current circuit state.
    pub state: CircuitState,
    /// Failures currently in the window.
    pub window_failures: usize,
    /// Outcomes currently in the window.
    pub window_len: usize,
    /// When the circuit last opened, if it has.
    pub opened_at: Option<Instant>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    fn test_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            window_size: 4,
            failure_rate_threshold: 50,
            open_duration: Duration::from_millis(20),
            half_open_trial_calls: 2,
        }
    }

    #[test]
    fn test_circuit_starts_closed() {
        let cb = CircuitBreaker::new();
        let resource: ResourceId = Cow::Borrowed("MARKET_DATA");

        assert!(cb.is_allowed(&resource));
        assert_eq!(cb.state(&resource), CircuitState::Closed);
    }

    #[test]
    fn test_failures_below_threshold_keep_circuit_closed() {
        let cb = CircuitBreaker::with_config(test_config());
        let resource: ResourceId = Cow::Borrowed("FLAKY");

        // Window of 4, threshold 50%: one failure among three successes
        // is 25% and must not open the circuit.
        cb.record_failure(&resource);
        cb.record_success(&resource);
        cb.record_success(&resource);
        cb.record_success(&resource);

        assert!(cb.is_allowed(&resource));
        assert_eq!(cb.state(&resource), CircuitState::Closed);
    }

    #[test]
    fn test_circuit_opens_at_failure_rate_threshold() {
        let cb = CircuitBreaker::with_config(test_config());
        let resource: ResourceId = Cow::Borrowed("FAILING");

        cb.record_success(&resource);
        cb.record_success(&resource);
        cb.record_failure(&resource);
        assert_eq!(cb.state(&resource), CircuitState::Closed);

        // Fourth outcome fills the window at exactly 50% failures.
        cb.record_failure(&resource);
        assert_eq!(cb.state(&resource), CircuitState::Open);
        assert!(!cb.is_allowed(&resource));
    }

    #[test]
    fn test_partial_window_never_opens() {
        let cb = CircuitBreaker::with_config(test_config());
        let resource: ResourceId = Cow::Borrowed("WARMING_UP");

        // Three consecutive failures are 100% but the window (size 4)
        // is not full yet.
        cb.record_failure(&resource);
        cb.record_failure(&resource);
        cb.record_failure(&resource);

        assert_eq!(cb.state(&resource), CircuitState::Closed);
    }

    #[test]
    fn test_window_slides_old_outcomes_out() {
        let cb = CircuitBreaker::with_config(test_config());
        let resource: ResourceId = Cow::Borrowed("RECOVERED");

        // Two early failures...
        cb.record_failure(&resource);
        cb.record_failure(&resource);
        // ...pushed out by four successes.
        for _ in 0..4 {
            cb.record_success(&resource);
        }

        // A single new failure is 25% of the full window.
        cb.record_failure(&resource);
        assert_eq!(cb.state(&resource), CircuitState::Closed);
    }

    #[test]
    fn test_open_rejects_until_cooldown() {
        let cb = CircuitBreaker::with_config(CircuitBreakerConfig {
            open_duration: Duration::from_secs(60),
            ..test_config()
        });
        let resource: ResourceId = Cow::Borrowed("DOWN");

        for _ in 0..4 {
            cb.record_failure(&resource);
        }
        assert_eq!(cb.state(&resource), CircuitState::Open);

        for _ in 0..10 {
            assert!(!cb.is_allowed(&resource));
        }
        assert_eq!(cb.state(&resource), CircuitState::Open);
    }

    #[test]
    fn test_open_transitions_to_half_open_after_cooldown() {
        let cb = CircuitBreaker::with_config(test_config());
        let resource: ResourceId = Cow::Borrowed("PROBING");

        for _ in 0..4 {
            cb.record_failure(&resource);
        }
        assert!(!cb.is_allowed(&resource));

        std::thread::sleep(Duration::from_millis(30));

        // The transitioning call is permitted as the first trial.
        assert!(cb.is_allowed(&resource));
        assert_eq!(cb.state(&resource), CircuitState::HalfOpen);
    }

    #[test]
    fn test_half_open_trial_budget_is_bounded() {
        let cb = CircuitBreaker::with_config(test_config());
        let resource: ResourceId = Cow::Borrowed("BUDGETED");

        for _ in 0..4 {
            cb.record_failure(&resource);
        }
        std::thread::sleep(Duration::from_millis(30));

        // Budget of 2 trials: two permitted, the third rejected.
        assert!(cb.is_allowed(&resource));
        assert!(cb.is_allowed(&resource));
        assert!(!cb.is_allowed(&resource));
        assert_eq!(cb.state(&resource), CircuitState::HalfOpen);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let cb = CircuitBreaker::with_config(test_config());
        let resource: ResourceId = Cow::Borrowed("RELAPSING");

        for _ in 0..4 {
            cb.record_failure(&resource);
        }
        std::thread::sleep(Duration::from_millis(30));
        assert!(cb.is_allowed(&resource));

        cb.record_failure(&resource);
        assert_eq!(cb.state(&resource), CircuitState::Open);
        assert!(!cb.is_allowed(&resource));
    }

    #[test]
    fn test_half_open_successes_close_and_clear_window() {
        let cb = CircuitBreaker::with_config(test_config());
        let resource: ResourceId = Cow::Borrowed("HEALING");

        for _ in 0..4 {
            cb.record_failure(&resource);
        }
        std::thread::sleep(Duration::from_millis(30));

        assert!(cb.is_allowed(&resource));
        cb.record_success(&resource);
        assert_eq!(cb.state(&resource), CircuitState::HalfOpen);

        assert!(cb.is_allowed(&resource));
        cb.record_success(&resource);
        assert_eq!(cb.state(&resource), CircuitState::Closed);

        // Window was cleared: a single failure on the fresh window must
        // not trip the breaker again.
        cb.record_failure(&resource);
        assert_eq!(cb.state(&resource), CircuitState::Closed);
        let metrics = cb.metrics();
        let m = metrics.iter().find(|m| m.resource == "HEALING").unwrap();
        assert_eq!(m.window_len, 1);
    }

    #[test]
    fn test_resource_isolation() {
        let cb = CircuitBreaker::with_config(test_config());
        let broken: ResourceId = Cow::Borrowed("BROKEN");
        let healthy: ResourceId = Cow::Borrowed("HEALTHY");

        for _ in 0..4 {
            cb.record_failure(&broken);
        }
        assert!(!cb.is_allowed(&broken));

        assert!(cb.is_allowed(&healthy));
        assert_eq!(cb.state(&healthy), CircuitState::Closed);
    }

    #[test]
    fn test_manual_reset() {
        let cb = CircuitBreaker::with_config(test_config());
        let resource: ResourceId = Cow::Borrowed("RESET_ME");

        for _ in 0..4 {
            cb.record_failure(&resource);
        }
        assert_eq!(cb.state(&resource), CircuitState::Open);

        cb.reset(&resource);
        assert_eq!(cb.state(&resource), CircuitState::Closed);
        assert!(cb.is_allowed(&resource));
    }

    #[test]
    fn test_open_happens_once_per_breach() {
        let cb = CircuitBreaker::with_config(test_config());
        let resource: ResourceId = Cow::Borrowed("ONCE");

        for _ in 0..4 {
            cb.record_failure(&resource);
        }
        let opened_at = cb.metrics()[0].opened_at;

        // Further failures while Open must not re-stamp opened_at.
        cb.record_failure(&resource);
        cb.record_failure(&resource);
        assert_eq!(cb.metrics()[0].opened_at, opened_at);
    }
}
