//! TradeLens Vision Crate
//!
//! Resilient access to the vision-capable LLM used for chart analysis.
//!
//! The vision path differs from the quote path in two ways: calls carry a
//! static API key (no OAuth token cache), and latency is bounded by LLM
//! inference rather than quote lookup - so timeouts are materially longer
//! and analysis can be dispatched onto a bounded background worker pool
//! instead of blocking the request path.

pub mod error;
pub mod gateway;
pub mod prompt;
pub mod provider;

pub use error::VisionError;
pub use gateway::{AnalysisHandle, ChartAnalyzerTrait, VisionGateway, VisionGatewayConfig};
pub use prompt::build_chart_analysis_prompt;
pub use provider::{OpenAiVisionProvider, VisionProvider};
