//! Quote provider trait definition and implementations.

pub mod kis;

use async_trait::async_trait;
use tradelens_resilience::AccessToken;

use crate::errors::MarketDataError;
use crate::models::{CandleInterval, StockQuote};

/// Trait for brokerage market-data providers.
///
/// Implement this trait to add support for a new brokerage OpenAPI. The
/// gateway owns the resilience machinery (token caching, circuit breaking,
/// retries, timeouts); a provider only performs the raw remote calls.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Used for logging and as the circuit-breaker resource name.
    fn id(&self) -> &'static str;

    /// Exchange client credentials for a bearer access token.
    ///
    /// Called by the gateway's token cache on a miss; implementations
    /// must not cache the token themselves.
    async fn acquire_token(&self) -> Result<AccessToken, MarketDataError>;

    /// Fetch the current quote for a symbol.
    ///
    /// `token` is a valid bearer credential obtained via
    /// [`acquire_token`](Self::acquire_token).
    async fn fetch_quote(
        &self,
        token: &str,
        symbol: &str,
        interval: CandleInterval,
    ) -> Result<StockQuote, MarketDataError>;
}
