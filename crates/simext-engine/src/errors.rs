//! ---
//! simext_section: "02-engine-driver"
//! simext_subsection: "module"
//! simext_type: "source"
//! simext_scope: "code"
//! simext_description: "Engine driver error types."
//! simext_version: "v0.0.0-prealpha"
//! simext_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to launch engine {}: {source}", path.display())]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("engine channel closed: {0}")]
    ChannelClosed(String),
    #[error("engine produced no output within {0:?}")]
    ChannelTimeout(Duration),
    #[error("malformed engine output {line:?}")]
    Protocol { line: String },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("simulation not started; call start() before advance()")]
    NotStarted,
    #[error("simulation already started")]
    AlreadyStarted,
    #[error("period {period} aborted at sub-step {sub_step} ({completed} periods completed): {source}")]
    Aborted {
        period: u64,
        sub_step: u32,
        completed: u64,
        #[source]
        source: Box<EngineError>,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("export failed: {0}")]
    Export(String),
}

impl EngineError {
    /// The underlying failure, looking through [`EngineError::Aborted`].
    pub fn cause(&self) -> &EngineError {
        match self {
            EngineError::Aborted { source, .. } => source.cause(),
            other => other,
        }
    }
}

impl From<csv::Error> for EngineError {
    fn from(err: csv::Error) -> Self {
        EngineError::Export(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Export(err.to_string())
    }
}
