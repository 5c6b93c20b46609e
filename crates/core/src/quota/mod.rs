//! Quota gating for metered actions.

mod quota_gate;

pub use quota_gate::{DenialReason, QuotaDecision, QuotaGate, QuotaGateConfig};
