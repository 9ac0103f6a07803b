//! Pipeline-facing surface of the bridge.
//!
//! # Data Flow
//! ```text
//! InboundRequest
//!     → request.rs (Request: method, scheme, authority, path, query)
//!     → Pipeline::create_context(Request, Response)
//!     → Pipeline::process_request (writes through response.rs)
//!     → Pipeline::dispose_context
//! ```
//!
//! # Design Decisions
//! - The pipeline owns its context type; the bridge only stores and disposes it
//! - `process_request` borrows the context so disposal always gets it back

pub mod headers;
pub mod request;
pub mod response;

use futures_util::future::BoxFuture;
use thiserror::Error;

pub use headers::{HeaderArityError, HeaderList};
pub use request::{Request, RequestError};
pub use response::{BodyPhase, Response, ResponseError};

use crate::bridge::BridgeError;

/// Errors a pipeline reports while processing a request.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Response(#[from] ResponseError),

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl PipelineError {
    pub fn msg(message: impl Into<String>) -> Self {
        PipelineError::Message(message.into())
    }

    pub fn other(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        PipelineError::Other(Box::new(error))
    }
}

/// A multi-stage request processor driven by the bridge.
pub trait Pipeline: Send + Sync + 'static {
    /// Per-request state owned by the pipeline.
    type Context: Send + 'static;

    /// Build the native context for one request.
    fn create_context(&self, request: Request, response: Response) -> Self::Context;

    /// Run the request to completion.
    ///
    /// The response is considered started when the pipeline calls
    /// [`Response::start`] or [`Response::complete`], or when this future
    /// resolves.
    fn process_request<'a>(
        &'a self,
        context: &'a mut Self::Context,
    ) -> BoxFuture<'a, Result<(), PipelineError>>;

    /// Release the native context. Called exactly once per request.
    fn dispose_context(&self, _context: Self::Context, _error: Option<&BridgeError>) {}
}

/// Context for pipelines that need nothing beyond the request and response.
#[derive(Debug)]
pub struct HttpContext {
    pub request: Request,
    pub response: Response,
}

impl HttpContext {
    pub fn new(request: Request, response: Response) -> Self {
        Self { request, response }
    }
}
