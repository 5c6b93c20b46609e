//! Chart-analysis prompt construction.

/// Build the analysis prompt for a chart image.
///
/// The model is asked for a structured JSON verdict so downstream
/// consumers can parse pattern, trend, levels, and opinion fields without
/// scraping free text.
pub fn build_chart_analysis_prompt(
    symbol: Option<&str>,
    name: Option<&str>,
    interval_label: &str,
) -> String {
    format!(
        r#"You are a professional stock chart analyst. Analyze the provided chart image and report the following.

Instrument:
- Symbol: {}
- Name: {}
- Candle interval: {}

Respond with JSON in exactly this shape:
{{
  "pattern": "detected chart pattern (e.g. ascending triangle, head and shoulders, double bottom)",
  "trend": "current trend (up/down/sideways)",
  "supportLevel": "key support price",
  "resistanceLevel": "key resistance price",
  "volumeAnalysis": "volume behavior (rising/falling)",
  "tradingOpinion": "buy/sell/hold",
  "summary": "overall assessment in 2-3 sentences",
  "keyPoints": ["key point 1", "key point 2", "key point 3"],
  "riskLevel": "low/medium/high"
}}

Rules:
- Respond with JSON only, no surrounding prose
- Be objective and technical
- Focus on technical analysis, not investment advice"#,
        symbol.unwrap_or("not provided"),
        name.unwrap_or("not provided"),
        interval_label,
    )
}
