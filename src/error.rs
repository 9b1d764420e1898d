use thiserror::Error;

use crate::pipeline::Stage;

#[derive(Error, Debug)]
pub enum JimakuError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Download error: {0}")]
    Download(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Subtitle embedding error: {0}")]
    Embedding(String),

    #[error("{stage} failed: {source}")]
    StageFailed {
        stage: Stage,
        #[source]
        source: Box<JimakuError>,
    },

    #[error("{stage} exceeded its {limit_secs}s deadline")]
    Timeout { stage: Stage, limit_secs: u64 },

    #[error("File not found: {0}")]
    FileNotFound(String),
}

impl JimakuError {
    /// Tag an error with the pipeline stage it occurred in. Errors that
    /// already carry a stage pass through unchanged.
    pub fn at_stage(self, stage: Stage) -> Self {
        match self {
            JimakuError::Timeout { .. } | JimakuError::StageFailed { .. } => self,
            other => JimakuError::StageFailed {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage this error is attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            JimakuError::StageFailed { stage, .. } => Some(*stage),
            JimakuError::Timeout { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, JimakuError>;
