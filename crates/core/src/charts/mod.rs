//! Quota-gated chart analysis.

mod charts_service;

pub use charts_service::{ChartAnalysisRequest, ChartAnalysisService};
