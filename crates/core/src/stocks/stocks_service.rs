//! Stock price service: input validation in front of the quote gateway.

use std::sync::Arc;

use log::info;

use crate::errors::{Error, Result};

use tradelens_market_data::{CandleInterval, QuoteGatewayTrait, StockQuote};

/// Validated stock price lookup.
///
/// A malformed symbol is a caller defect: it is rejected here, before the
/// gateway, and never reaches the resilience machinery or the circuit
/// breaker's failure accounting.
pub struct StockService {
    quotes: Arc<dyn QuoteGatewayTrait>,
}

impl StockService {
    pub fn new(quotes: Arc<dyn QuoteGatewayTrait>) -> Self {
        Self { quotes }
    }

    /// True for a well-formed six-digit stock code.
    pub fn is_valid_symbol(symbol: &str) -> bool {
        symbol.len() == 6 && symbol.bytes().all(|b| b.is_ascii_digit())
    }

    /// Fetch the current price for a stock code. The interval defaults
    /// to daily candles.
    pub async fn get_stock_price(
        &self,
        symbol: &str,
        interval: Option<CandleInterval>,
    ) -> Result<StockQuote> {
        let symbol = symbol.trim();
        if !Self::is_valid_symbol(symbol) {
            return Err(Error::Validation(format!(
                "stock code must be six digits: {:?}",
                symbol
            )));
        }

        let interval = interval.unwrap_or(CandleInterval::Day);
        let quote = self.quotes.get_quote(symbol, interval).await?;

        info!(
            "Stock price for {} ({}): {}",
            symbol, interval, quote.current_price
        );
        Ok(quote)
    }
}
