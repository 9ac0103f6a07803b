//! Per-request context.
//!
//! # Responsibilities
//! - Build the pipeline request from boundary primitives
//! - Run the pipeline on its own task
//! - Extract status and headers once the response starts
//! - Release the sink and the native context exactly once
//!
//! # Design Decisions
//! - The native context lives behind an owned lock held by the pipeline
//!   task; disposal takes it back once the task has ended, whatever the
//!   outcome (success, error, panic, abort)
//! - The response phase is settled by a drop guard inside the task so an
//!   aborted or panicking pipeline never leaves `process_response` waiting

use std::collections::BTreeSet;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinHandle};
use tracing::Instrument;

use crate::boundary::{BoundaryHandle, InboundRequest, RequestToken};
use crate::bridge::error::BridgeError;
use crate::bridge::sink::ResponseSink;
use crate::pipeline::{BodyPhase, Pipeline, PipelineError, Request, Response};

/// Pipeline task spawned by [`RequestContext::process_request`].
#[derive(Debug)]
pub enum PendingRequest {
    Running(JoinHandle<Result<(), PipelineError>>),
    Finished(Option<BridgeError>),
}

impl PendingRequest {
    pub fn is_finished(&self) -> bool {
        match self {
            PendingRequest::Running(task) => task.is_finished(),
            PendingRequest::Finished(_) => true,
        }
    }

    /// Wait for the pipeline task and record its outcome.
    pub async fn settle(&mut self) {
        if let PendingRequest::Running(task) = self {
            let outcome = match task.await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(BridgeError::Pipeline(e)),
                Err(e) => Some(join_failure(e)),
            };
            *self = PendingRequest::Finished(outcome);
        }
    }

    /// Take the recorded error, if the task has settled with one.
    pub fn take_error(&mut self) -> Option<BridgeError> {
        match self {
            PendingRequest::Finished(error) => error.take(),
            PendingRequest::Running(_) => None,
        }
    }

    pub fn abort(&self) {
        if let PendingRequest::Running(task) = self {
            task.abort();
        }
    }
}

fn join_failure(error: JoinError) -> BridgeError {
    if !error.is_panic() {
        return BridgeError::PipelineAborted;
    }
    let payload = error.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    BridgeError::PipelinePanicked(message)
}

/// Settles the response phase when the pipeline task ends or unwinds.
struct SettleOnDrop {
    response: Response,
    succeeded: bool,
}

impl Drop for SettleOnDrop {
    fn drop(&mut self) {
        self.response.settle(self.succeeded);
    }
}

/// One request travelling through the pipeline.
pub struct RequestContext<P: Pipeline> {
    pipeline: Arc<P>,
    sink: Arc<ResponseSink>,
    response: Response,
    native: Arc<Mutex<Option<P::Context>>>,
    skip_body_completion: Arc<BTreeSet<u16>>,
    disposed: bool,
}

impl<P: Pipeline> RequestContext<P> {
    pub fn new(pipeline: Arc<P>, handle: BoundaryHandle, skip_body_completion: Arc<BTreeSet<u16>>) -> Self {
        let sink = Arc::new(ResponseSink::new(handle));
        let response = Response::new(sink.clone());
        Self {
            pipeline,
            sink,
            response,
            native: Arc::new(Mutex::new(None)),
            skip_body_completion,
            disposed: false,
        }
    }

    pub fn token(&self) -> RequestToken {
        self.sink.token()
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Build the request, create the native context and start the pipeline.
    pub fn process_request(&mut self, inbound: InboundRequest) -> Result<PendingRequest, BridgeError> {
        let request = Request::from_inbound(inbound)?;

        let mut slot = self
            .native
            .clone()
            .try_lock_owned()
            .map_err(|_| BridgeError::AlreadyProcessing)?;
        if slot.is_some() {
            return Err(BridgeError::AlreadyProcessing);
        }
        *slot = Some(self.pipeline.create_context(request, self.response.clone()));

        let pipeline = self.pipeline.clone();
        let response = self.response.clone();
        let task = tokio::spawn(
            async move {
                let mut guard = SettleOnDrop {
                    response,
                    succeeded: false,
                };
                let mut slot = slot;
                let result = match slot.as_mut() {
                    Some(context) => pipeline.process_request(context).await,
                    None => Ok(()),
                };
                // Hand the context back before the phase settles.
                drop(slot);
                guard.succeeded = result.is_ok();
                result
            }
            .instrument(tracing::Span::current()),
        );

        Ok(PendingRequest::Running(task))
    }

    /// Send status and headers once the response starts, then wait for the
    /// body unless the status skips body completion.
    pub async fn process_response(&mut self, pending: &mut PendingRequest) -> Result<(), BridgeError> {
        let mut phase = self.response.subscribe();

        let current = match phase.wait_for(|p| p.has_started()).await {
            Ok(current) => *current,
            Err(_) => BodyPhase::Faulted,
        };

        if current == BodyPhase::Faulted {
            pending.settle().await;
            return Err(pending.take_error().unwrap_or(BridgeError::PipelineAborted));
        }

        let (status, headers) = self.response.snapshot();
        self.sink.send_headers(status, &headers).await?;

        if self.skip_body_completion.contains(&status) {
            tracing::debug!(status, "Skipping body completion wait");
            return Ok(());
        }

        let _ = phase.wait_for(|p| p.is_terminal()).await;
        Ok(())
    }

    /// True once headers were sent.
    pub fn has_started(&self) -> bool {
        self.sink.headers_sent()
    }

    /// Status that reached the transport, if any.
    pub fn sent_status(&self) -> Option<u16> {
        self.sink.sent_status()
    }

    /// Replace the response with a plain-text error and end it.
    pub async fn send_fallback(&self, status: u16, text: String) -> Result<(), BridgeError> {
        self.sink.send_fallback(status, Bytes::from(text)).await?;
        Ok(())
    }

    /// Release the sink and the native context.
    ///
    /// Returns false if the context was already disposed.
    pub async fn dispose(&mut self, error: Option<&BridgeError>) -> bool {
        if self.disposed {
            return false;
        }
        self.disposed = true;

        self.sink.dispose().await;

        let native = match self.native.try_lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => {
                tracing::warn!(token = %self.token(), "Native context still in use; skipping dispose");
                None
            }
        };
        if let Some(context) = native {
            self.pipeline.dispose_context(context, error);
        }
        true
    }
}

impl<P: Pipeline> Drop for RequestContext<P> {
    fn drop(&mut self) {
        if !self.disposed {
            tracing::warn!(token = %self.token(), "Request context dropped without dispose");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::recording::{Call, RecordingTransport};
    use crate::pipeline::HttpContext;
    use futures_util::future::{BoxFuture, FutureExt};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Scripted {
        fail: bool,
        status: u16,
        disposed: AtomicUsize,
        saw_error: AtomicUsize,
    }

    impl Pipeline for Scripted {
        type Context = HttpContext;

        fn create_context(&self, request: Request, response: Response) -> HttpContext {
            HttpContext::new(request, response)
        }

        fn process_request<'a>(&'a self, ctx: &'a mut HttpContext) -> BoxFuture<'a, Result<(), PipelineError>> {
            async move {
                if self.fail {
                    return Err(PipelineError::msg("boom"));
                }
                ctx.response.set_status(self.status)?;
                ctx.response.write(ctx.request.path().to_string()).await?;
                Ok(())
            }
            .boxed()
        }

        fn dispose_context(&self, _context: HttpContext, error: Option<&BridgeError>) {
            self.disposed.fetch_add(1, Ordering::SeqCst);
            if error.is_some() {
                self.saw_error.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn inbound(url: &str) -> InboundRequest {
        InboundRequest {
            method: "GET".into(),
            url: url.into(),
            ..Default::default()
        }
    }

    fn context(pipeline: Arc<Scripted>, transport: Arc<RecordingTransport>, token: u64) -> RequestContext<Scripted> {
        let handle = BoundaryHandle::new(RequestToken::from_raw(token), transport);
        RequestContext::new(pipeline, handle, Arc::new(BTreeSet::from([400])))
    }

    #[tokio::test]
    async fn headers_then_body_then_end() {
        let transport = RecordingTransport::new();
        let pipeline = Arc::new(Scripted { status: 201, ..Default::default() });
        let mut ctx = context(pipeline.clone(), transport.clone(), 1);

        let mut pending = ctx.process_request(inbound("http://localhost/items")).unwrap();
        ctx.process_response(&mut pending).await.unwrap();
        pending.settle().await;
        assert!(pending.take_error().is_none());
        assert!(ctx.has_started());

        assert!(ctx.dispose(None).await);
        assert!(!ctx.dispose(None).await);

        let token = RequestToken::from_raw(1);
        assert_eq!(
            transport.calls_for(token),
            vec![
                Call::Headers { status: 201, names: vec![], values: vec![] },
                Call::Buffer(b"/items".to_vec()),
                Call::End,
            ]
        );
        assert_eq!(pipeline.disposed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_before_start_is_returned() {
        let transport = RecordingTransport::new();
        let pipeline = Arc::new(Scripted { fail: true, ..Default::default() });
        let mut ctx = context(pipeline.clone(), transport.clone(), 2);

        let mut pending = ctx.process_request(inbound("http://localhost/")).unwrap();
        let err = ctx.process_response(&mut pending).await.unwrap_err();
        assert!(matches!(err, BridgeError::Pipeline(_)));
        assert!(!ctx.has_started());

        ctx.dispose(Some(&err)).await;
        assert_eq!(pipeline.saw_error.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_process_request_is_refused() {
        let transport = RecordingTransport::new();
        let pipeline = Arc::new(Scripted { status: 200, ..Default::default() });
        let mut ctx = context(pipeline, transport, 3);

        let mut pending = ctx.process_request(inbound("http://localhost/")).unwrap();
        pending.settle().await;
        assert!(matches!(
            ctx.process_request(inbound("http://localhost/")),
            Err(BridgeError::AlreadyProcessing)
        ));
        ctx.dispose(None).await;
    }

    #[tokio::test]
    async fn malformed_url_fails_before_spawning() {
        let transport = RecordingTransport::new();
        let pipeline = Arc::new(Scripted::default());
        let mut ctx = context(pipeline.clone(), transport, 4);

        assert!(matches!(ctx.process_request(inbound("not-a-url")), Err(BridgeError::Request(_))));
        ctx.dispose(None).await;
        assert_eq!(pipeline.disposed.load(Ordering::SeqCst), 0);
    }
}
