//! Engine error types.

use thiserror::Error;

/// Errors surfaced by the spool, ingest, rules, and pipeline layers.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ruleset error: {0}")]
    Ruleset(#[from] serde_yaml::Error),

    /// The ruleset file parsed but is structurally unusable.
    #[error("invalid ruleset: {0}")]
    InvalidRuleset(String),

    /// A spool segment or offset file had an unexpected shape.
    #[error("spool corruption in partition {partition}: {detail}")]
    SpoolCorruption { partition: i32, detail: String },

    /// The ingest adapter could not be started.
    #[error("ingest adapter: {0}")]
    Adapter(String),

    /// The peer closed or broke the framed ingest stream.
    #[error("ingest stream: {0}")]
    Stream(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, EngineError>;
