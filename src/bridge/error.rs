use std::error::Error as StdError;
use std::time::Duration;

use thiserror::Error;

use crate::bridge::sink::SinkError;
use crate::pipeline::{PipelineError, RequestError};

/// Failure of one exchange.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("malformed inbound request")]
    Request(#[from] RequestError),

    #[error("pipeline failed")]
    Pipeline(#[from] PipelineError),

    #[error("pipeline panicked: {0}")]
    PipelinePanicked(String),

    #[error("pipeline task was aborted")]
    PipelineAborted,

    #[error("request exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),

    #[error("response delivery failed")]
    Sink(#[from] SinkError),

    #[error("request context is already processing")]
    AlreadyProcessing,
}

impl BridgeError {
    /// Status of the fallback response sent when headers never went out.
    pub fn fallback_status(&self) -> u16 {
        match self {
            BridgeError::DeadlineExceeded(_) => 504,
            _ => 500,
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::Request(_) => "request",
            BridgeError::Pipeline(_) => "pipeline",
            BridgeError::PipelinePanicked(_) => "panic",
            BridgeError::PipelineAborted => "aborted",
            BridgeError::DeadlineExceeded(_) => "deadline",
            BridgeError::Sink(_) => "sink",
            BridgeError::AlreadyProcessing => "busy",
        }
    }
}

/// Render an error and its sources as `outer: inner: root`.
pub fn render_error(error: &(dyn StdError + 'static)) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text
}
