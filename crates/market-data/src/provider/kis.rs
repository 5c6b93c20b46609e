//! Korea Investment & Securities OpenAPI provider.
//!
//! Speaks the KIS domestic-stock REST interface:
//! - OAuth client-credentials token exchange via `/oauth2/tokenP`
//! - Current price inquiry via `/uapi/domestic-stock/v1/quotations/inquire-price`
//!
//! All numeric fields arrive as strings and are parsed leniently: a
//! missing or malformed field becomes zero rather than failing the whole
//! response. Timeouts, non-2xx statuses, and failure result codes remain
//! strict errors.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use tradelens_resilience::AccessToken;

use crate::errors::MarketDataError;
use crate::models::{CandleInterval, StockQuote};
use crate::provider::QuoteProvider;

const PROVIDER_ID: &str = "market-data";

/// Transaction id for the current-price inquiry.
const PRICE_INQUIRY_TR_ID: &str = "FHKST01010100";

/// Market division code for equities.
const MARKET_DIVISION_EQUITY: &str = "J";

/// Client credentials for the KIS OpenAPI.
#[derive(Clone, Debug)]
pub struct KisCredentials {
    /// Application key issued by the brokerage.
    pub app_key: String,
    /// Application secret issued by the brokerage.
    pub app_secret: String,
}

// ============================================================================
// Wire structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    /// Validity in seconds (24h for this issuer).
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    /// Result code; "0" is success.
    rt_cd: Option<String>,
    /// Human-readable result message.
    msg1: Option<String>,
    output: Option<PriceOutput>,
}

#[derive(Debug, Deserialize)]
struct PriceOutput {
    /// Current price.
    stck_prpr: Option<String>,
    /// Change versus previous close.
    prdy_vrss: Option<String>,
    /// Change rate in percent.
    prdy_ctrt: Option<String>,
    /// Accumulated volume.
    acml_vol: Option<String>,
    /// Opening price.
    stck_oprc: Option<String>,
    /// Session high.
    stck_hgpr: Option<String>,
    /// Session low.
    stck_lwpr: Option<String>,
    /// Previous close.
    stck_sdpr: Option<String>,
    /// Issuer name.
    prdt_name: Option<String>,
}

/// Korea Investment market-data provider.
pub struct KoreaInvestmentProvider {
    client: Client,
    base_url: String,
    credentials: KisCredentials,
}

impl KoreaInvestmentProvider {
    /// Create a provider against the given base URL.
    pub fn new(base_url: impl Into<String>, credentials: KisCredentials) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            credentials,
        }
    }

    fn parse_quote(&self, symbol: &str, interval: CandleInterval, output: PriceOutput) -> StockQuote {
        StockQuote {
            symbol: symbol.to_string(),
            name: output.prdt_name,
            current_price: parse_decimal_lenient(output.stck_prpr.as_deref(), "stck_prpr"),
            change: parse_decimal_lenient(output.prdy_vrss.as_deref(), "prdy_vrss"),
            change_rate: parse_decimal_lenient(output.prdy_ctrt.as_deref(), "prdy_ctrt"),
            open: parse_decimal_lenient(output.stck_oprc.as_deref(), "stck_oprc"),
            high: parse_decimal_lenient(output.stck_hgpr.as_deref(), "stck_hgpr"),
            low: parse_decimal_lenient(output.stck_lwpr.as_deref(), "stck_lwpr"),
            previous_close: parse_decimal_lenient(output.stck_sdpr.as_deref(), "stck_sdpr"),
            volume: parse_decimal_lenient(output.acml_vol.as_deref(), "acml_vol"),
            interval,
            timestamp: Utc::now(),
        }
    }
}

/// Parse a wire numeric string, substituting zero on malformed input.
///
/// The brokerage intermittently returns blank or garbage numeric fields;
/// one bad field must not fail the whole quote.
fn parse_decimal_lenient(value: Option<&str>, field: &str) -> Decimal {
    match value {
        Some(raw) => match Decimal::from_str(raw.trim()) {
            Ok(d) => d,
            Err(_) => {
                warn!("KIS: malformed numeric field {}: {:?}, using 0", field, raw);
                Decimal::ZERO
            }
        },
        None => {
            warn!("KIS: missing numeric field {}, using 0", field);
            Decimal::ZERO
        }
    }
}

fn status_error(status: StatusCode, context: &str) -> MarketDataError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        MarketDataError::RateLimited {
            resource: PROVIDER_ID.to_string(),
        }
    } else {
        MarketDataError::Provider {
            resource: PROVIDER_ID.to_string(),
            message: format!("{} returned HTTP {}", context, status),
        }
    }
}

#[async_trait]
impl QuoteProvider for KoreaInvestmentProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn acquire_token(&self) -> Result<AccessToken, MarketDataError> {
        info!("KIS: requesting access token");

        let body = serde_json::json!({
            "grant_type": "client_credentials",
            "appkey": self.credentials.app_key,
            "appsecret": self.credentials.app_secret,
        });

        let response = self
            .client
            .post(format!("{}/oauth2/tokenP", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| MarketDataError::TokenAcquisition {
                message: format!("token request failed: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(MarketDataError::TokenAcquisition {
                message: format!("token endpoint returned HTTP {}", response.status()),
            });
        }

        let token: TokenResponse =
            response
                .json()
                .await
                .map_err(|e| MarketDataError::TokenAcquisition {
                    message: format!("malformed token response: {}", e),
                })?;

        let value = token.value().ok_or_else(|| MarketDataError::TokenAcquisition {
            message: "token response missing access_token".to_string(),
        })?;

        info!("KIS: access token issued");
        Ok(AccessToken {
            value,
            ttl: Duration::from_secs(token.expires_in.unwrap_or(86_400)),
        })
    }

    async fn fetch_quote(
        &self,
        token: &str,
        symbol: &str,
        interval: CandleInterval,
    ) -> Result<StockQuote, MarketDataError> {
        debug!("KIS: price inquiry for {} ({})", symbol, interval);

        let response = self
            .client
            .get(format!(
                "{}/uapi/domestic-stock/v1/quotations/inquire-price",
                self.base_url
            ))
            .query(&[
                ("FID_COND_MRKT_DIV_CODE", MARKET_DIVISION_EQUITY),
                ("FID_INPUT_ISCD", symbol),
            ])
            .bearer_auth(token)
            .header("appkey", &self.credentials.app_key)
            .header("appsecret", &self.credentials.app_secret)
            .header("tr_id", PRICE_INQUIRY_TR_ID)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, "price inquiry"));
        }

        let payload: PriceResponse = response.json().await?;

        match payload.rt_cd.as_deref() {
            Some("0") => {}
            other => {
                return Err(MarketDataError::Provider {
                    resource: PROVIDER_ID.to_string(),
                    message: format!(
                        "price inquiry failed (rt_cd {:?}): {}",
                        other,
                        payload.msg1.unwrap_or_else(|| "no message".to_string())
                    ),
                });
            }
        }

        let output = payload
            .output
            .ok_or_else(|| MarketDataError::InvalidSymbol(symbol.to_string()))?;

        Ok(self.parse_quote(symbol, interval, output))
    }
}

impl TokenResponse {
    fn value(&self) -> Option<String> {
        self.access_token
            .as_ref()
            .filter(|t| !t.is_empty())
            .cloned()
    }
}
