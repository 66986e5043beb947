use std::path::PathBuf;

use thiserror::Error;

use crate::stats::TrafficKind;

/// Failures a single pipeline stage can hit. None of them are fatal; the
/// pipeline logs them and moves on to the next stage.
#[derive(Debug, Error)]
pub enum InsightsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed table at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("{kind} request failed: {source}")]
    Request {
        kind: TrafficKind,
        #[source]
        source: reqwest::Error,
    },

    #[error("{kind} source unavailable: {message}")]
    Unavailable { kind: TrafficKind, message: String },

    #[error("{kind} request returned {status}: {body}")]
    Status {
        kind: TrafficKind,
        status: u16,
        body: String,
    },

    #[error("malformed {kind} payload: {message}")]
    Decode { kind: TrafficKind, message: String },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl InsightsError {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}
