use thiserror::Error;

/// Construction-time failures. Runtime ordering problems (late timers, duplicate
/// triggers, requests after teardown) are never errors; see `AdvanceOutcome`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("Unknown entry pattern '{key}'")]
    UnknownPattern { key: String },
    #[error("Entry pattern {pattern}: duration {duration_ms}ms is shorter than text delay {text_delay_ms}ms")]
    InvalidPatternConfig {
        pattern: String,
        text_delay_ms: u64,
        duration_ms: u64,
    },
    #[error("Invalid threshold {value}")]
    InvalidThreshold { value: f32 },
    #[error("Breath thresholds must satisfy low < high (low={low}, high={high})")]
    InvalidBreathThresholds { low: f32, high: f32 },
    #[error("Action target must be at least 1")]
    InvalidTarget,
}

pub type EngineResult<T> = Result<T, EngineError>;
