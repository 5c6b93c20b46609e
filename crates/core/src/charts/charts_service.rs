//! Chart analysis service: validation, encoding, and the quota-gated
//! vision call.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use log::info;

use crate::errors::{Error, Result};
use crate::quota::QuotaGate;
use crate::usage::{ActionType, SubjectKey};

use tradelens_market_data::CandleInterval;
use tradelens_vision::{build_chart_analysis_prompt, ChartAnalyzerTrait};

/// Maximum accepted chart image size.
const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// A chart analysis request.
#[derive(Clone, Debug)]
pub struct ChartAnalysisRequest {
    /// Stock code the chart belongs to, when known.
    pub symbol: Option<String>,
    /// Issuer name, when known.
    pub name: Option<String>,
    /// Candle interval of the chart.
    pub interval: CandleInterval,
    /// Raw chart image bytes (JPEG/PNG).
    pub image: Vec<u8>,
}

/// Quota-gated chart analysis.
///
/// Flow: validate the image, encode it, build the prompt, then run the
/// vision call through the quota gate so the usage event is recorded on
/// success. Quota denials, service unavailability, and validation errors
/// stay distinct all the way to the caller.
pub struct ChartAnalysisService {
    analyzer: Arc<dyn ChartAnalyzerTrait>,
    gate: Arc<QuotaGate>,
}

impl ChartAnalysisService {
    pub fn new(analyzer: Arc<dyn ChartAnalyzerTrait>, gate: Arc<QuotaGate>) -> Self {
        Self { analyzer, gate }
    }

    /// Analyze a chart image for the given subject.
    ///
    /// Returns the model's analysis text (structured JSON per the
    /// prompt contract).
    pub async fn analyze_chart(
        &self,
        subject: &SubjectKey,
        request: ChartAnalysisRequest,
    ) -> Result<String> {
        Self::validate_image(&request.image)?;

        let image_base64 = BASE64.encode(&request.image);
        let prompt = build_chart_analysis_prompt(
            request.symbol.as_deref(),
            request.name.as_deref(),
            &request.interval.to_string(),
        );

        let analysis = self
            .gate
            .invoke(
                subject,
                ActionType::ChartAnalysis,
                request.symbol.clone(),
                || async move {
                    self.analyzer
                        .analyze_chart(&prompt, &image_base64)
                        .await
                        .map_err(Error::from)
                },
            )
            .await?;

        info!(
            "Chart analysis completed for {} (symbol {:?})",
            subject, request.symbol
        );
        Ok(analysis)
    }

    fn validate_image(image: &[u8]) -> Result<()> {
        if image.is_empty() {
            return Err(Error::Validation("chart image is empty".to_string()));
        }
        if image.len() > MAX_IMAGE_BYTES {
            return Err(Error::Validation(format!(
                "chart image exceeds {} bytes",
                MAX_IMAGE_BYTES
            )));
        }
        Ok(())
    }
}
