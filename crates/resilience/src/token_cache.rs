//! Single-flight cache for a bearer credential with expiry.
//!
//! One cache instance owns one credential for one remote service. The
//! credential is replaced wholesale on refresh, never partially mutated,
//! and is handed out only while a safety margin remains before its stated
//! expiry.
//!
//! Concurrent cache misses are de-duplicated: the slot is guarded by an
//! async mutex held across the acquisition, so the first caller acquires
//! while the others wait on the lock and then reuse the freshly stored
//! value. Exactly one acquisition is in flight at a time.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use tokio::sync::Mutex;

/// Default safety margin subtracted from the stated expiry (10 minutes).
const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_secs(600);

/// Floor for the effective TTL, so a short-lived token does not turn the
/// cache into a refresh loop.
const DEFAULT_MIN_TTL: Duration = Duration::from_secs(30);

/// A freshly acquired credential, as returned by an acquisition function.
#[derive(Clone, Debug)]
pub struct AccessToken {
    /// The bearer credential value.
    pub value: String,
    /// Validity as stated by the issuer.
    pub ttl: Duration,
}

/// Token cache configuration.
#[derive(Clone, Debug)]
pub struct TokenCacheConfig {
    /// Margin before the stated expiry at which the credential is
    /// considered stale.
    pub safety_margin: Duration,
    /// Minimum effective TTL after applying the margin.
    pub min_ttl: Duration,
}

impl Default for TokenCacheConfig {
    fn default() -> Self {
        Self {
            safety_margin: DEFAULT_SAFETY_MARGIN,
            min_ttl: DEFAULT_MIN_TTL,
        }
    }
}

#[derive(Debug)]
struct CachedCredential {
    value: String,
    expires_at: Instant,
}

/// Single-flight cached bearer credential.
pub struct TokenCache {
    slot: Mutex<Option<CachedCredential>>,
    config: TokenCacheConfig,
}

impl TokenCache {
    /// Create an empty cache with default settings.
    pub fn new() -> Self {
        Self::with_config(TokenCacheConfig::default())
    }

    /// Create an empty cache with custom configuration.
    pub fn with_config(config: TokenCacheConfig) -> Self {
        Self {
            slot: Mutex::new(None),
            config,
        }
    }

    /// Return the cached credential, acquiring a fresh one if absent or
    /// expired.
    ///
    /// `acquire` is invoked only on a miss, with the slot lock held - a
    /// concurrent caller blocks until the in-flight acquisition completes
    /// and then reuses its result. An acquisition error propagates to the
    /// caller that triggered it; the slot keeps whatever it held before
    /// (nothing, or an already-expired credential that the next caller
    /// will replace).
    pub async fn get_or_acquire<E, F, Fut>(&self, acquire: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<AccessToken, E>>,
    {
        let mut slot = self.slot.lock().await;

        if let Some(cached) = slot.as_ref() {
            if Instant::now() < cached.expires_at {
                debug!("Token cache: using cached credential");
                return Ok(cached.value.clone());
            }
            debug!("Token cache: cached credential expired");
        }

        info!("Token cache: acquiring fresh credential");
        let token = acquire().await?;

        let effective_ttl = self.effective_ttl(token.ttl);
        *slot = Some(CachedCredential {
            value: token.value.clone(),
            expires_at: Instant::now() + effective_ttl,
        });
        info!(
            "Token cache: credential acquired, valid for {:?} (stated ttl {:?})",
            effective_ttl, token.ttl
        );

        Ok(token.value)
    }

    /// Drop the cached credential, forcing the next caller to acquire.
    pub async fn invalidate(&self) {
        let mut slot = self.slot.lock().await;
        if slot.take().is_some() {
            debug!("Token cache: credential invalidated");
        }
    }

    /// Remaining validity of the cached credential, if one is held and
    /// still fresh.
    pub async fn remaining_validity(&self) -> Option<Duration> {
        let slot = self.slot.lock().await;
        slot.as_ref()
            .and_then(|c| c.expires_at.checked_duration_since(Instant::now()))
    }

    fn effective_ttl(&self, stated: Duration) -> Duration {
        if stated <= self.config.safety_margin {
            warn!(
                "Token cache: stated ttl {:?} within safety margin {:?}, clamping to {:?}",
                stated, self.config.safety_margin, self.config.min_ttl
            );
        }
        stated
            .saturating_sub(self.config.safety_margin)
            .max(self.config.min_ttl)
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}
