use crate::models::RuleId;

/// Fatal to `load`; the pipeline never enters `Running` with an invalid
/// profile.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("duplicate rule id: {0}")]
    DuplicateRuleId(RuleId),

    #[error("condition cycle: {}", cycle.join(" -> "))]
    CyclicConditions { cycle: Vec<RuleId> },

    #[error("rule {rule}: invalid sample geometry: {reason}")]
    InvalidGeometry { rule: RuleId, reason: String },

    #[error("rule {rule}: press duration min exceeds max")]
    InvalidPressRange { rule: RuleId },

    #[error("profile cannot be loaded while the pipeline is running")]
    PipelineRunning,
}

/// Recoverable: a failed capture downgrades the affected rules to non-match
/// for that tick, the loop continues.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("frame capture failed: {0}")]
    Backend(String),

    #[error("capture returned {got_w}x{got_h} pixels for a {want_w}x{want_h} rect")]
    SizeMismatch {
        want_w: u32,
        want_h: u32,
        got_w: u32,
        got_h: u32,
    },
}

/// Recoverable: key injection failed. Logged, no retry within the tick; the
/// next eligible tick fires again naturally if the condition still holds.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("key injection failed for '{key}': {reason}")]
    Injection { key: String, reason: String },
}
