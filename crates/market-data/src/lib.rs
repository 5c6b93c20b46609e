//! TradeLens Market Data Crate
//!
//! Resilient access to the brokerage market-data service.
//!
//! # Overview
//!
//! This crate supports:
//! - A provider abstraction over the brokerage OpenAPI ([`QuoteProvider`])
//! - OAuth client-credentials token caching with single-flight refresh
//! - Circuit breaking, rate limiting, and bounded retries around every call
//! - Lenient parsing of the provider's numeric wire fields
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |   QuoteGateway   |  (validate, token, breaker, rate limit, retry)
//! +------------------+
//!          |
//!          v
//! +------------------+
//! |  QuoteProvider   |  (Korea Investment OpenAPI, or a mock)
//! +------------------+
//!          |
//!          v
//! +------------------+
//! |    StockQuote    |  (parsed market data)
//! +------------------+
//! ```

pub mod errors;
pub mod gateway;
pub mod models;
pub mod provider;

pub use errors::MarketDataError;
pub use gateway::{QuoteGateway, QuoteGatewayConfig, QuoteGatewayTrait};
pub use models::{CandleInterval, StockQuote};
pub use provider::kis::{KisCredentials, KoreaInvestmentProvider};
pub use provider::QuoteProvider;
