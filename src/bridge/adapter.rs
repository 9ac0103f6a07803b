//! Interop adapter.
//!
//! # Responsibilities
//! - Receive inbound calls from the registry
//! - Drive one request context per exchange
//! - Map every failure to a fallback response or a terminated one
//! - Bound concurrency with a semaphore per policy
//!
//! # Exchange Flow
//! ```text
//! permit → RequestContext::process_request (pipeline task spawned)
//!        → process_response (headers sent, body awaited unless skipped)
//!        → pipeline finished?  yes → dispose
//!                              no  → continuation awaits it, then disposes
//! error  → abort pipeline → fallback (headers not sent) or log → dispose
//! ```
//!
//! # Design Decisions
//! - The permit is held until end-of-response, including deferred completion
//! - Errors never reach the transport; the inbound call always resolves

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::Instrument;

use crate::boundary::{BoundaryHandle, InboundHandler, InboundRequest, RequestToken, Transport};
use crate::bridge::context::{PendingRequest, RequestContext};
use crate::bridge::error::{render_error, BridgeError};
use crate::config::{AdapterConfig, ConcurrencyMode};
use crate::observability::metrics::{self, InFlightGuard};
use crate::pipeline::Pipeline;

/// How many exchanges run at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConcurrencyPolicy {
    /// One exchange at a time, end to end.
    #[default]
    Serialized,
    /// Up to `max_in_flight` exchanges, each with its own context and sink.
    Concurrent { max_in_flight: usize },
}

impl ConcurrencyPolicy {
    pub fn permits(&self) -> usize {
        match self {
            ConcurrencyPolicy::Serialized => 1,
            ConcurrencyPolicy::Concurrent { max_in_flight } => (*max_in_flight).max(1),
        }
    }
}

/// Adapter tuning.
#[derive(Debug, Clone)]
pub struct AdapterOptions {
    pub concurrency: ConcurrencyPolicy,
    /// Statuses for which body completion is not awaited.
    pub skip_body_completion: BTreeSet<u16>,
    /// Per-request deadline; `None` waits forever.
    pub request_timeout: Option<Duration>,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            concurrency: ConcurrencyPolicy::Serialized,
            skip_body_completion: BTreeSet::from([400]),
            request_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl From<&AdapterConfig> for AdapterOptions {
    fn from(config: &AdapterConfig) -> Self {
        let concurrency = match config.concurrency {
            ConcurrencyMode::Serialized => ConcurrencyPolicy::Serialized,
            ConcurrencyMode::Concurrent => ConcurrencyPolicy::Concurrent {
                max_in_flight: config.max_in_flight,
            },
        };
        Self {
            concurrency,
            skip_body_completion: config.skip_body_completion.iter().copied().collect(),
            request_timeout: match config.request_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}

/// Boundary-facing driver of the pipeline.
pub struct InteropAdapter<P: Pipeline> {
    pipeline: Arc<P>,
    transport: Arc<dyn Transport>,
    skip_body_completion: Arc<BTreeSet<u16>>,
    request_timeout: Option<Duration>,
    policy: ConcurrencyPolicy,
    permits: Arc<Semaphore>,
}

impl<P: Pipeline> Clone for InteropAdapter<P> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            transport: self.transport.clone(),
            skip_body_completion: self.skip_body_completion.clone(),
            request_timeout: self.request_timeout,
            policy: self.policy,
            permits: self.permits.clone(),
        }
    }
}

impl<P: Pipeline> InteropAdapter<P> {
    pub fn new(pipeline: Arc<P>, transport: Arc<dyn Transport>, options: AdapterOptions) -> Self {
        Self {
            pipeline,
            transport,
            skip_body_completion: Arc::new(options.skip_body_completion),
            request_timeout: options.request_timeout,
            policy: options.concurrency,
            permits: Arc::new(Semaphore::new(options.concurrency.permits())),
        }
    }

    pub fn policy(&self) -> ConcurrencyPolicy {
        self.policy
    }

    /// Exchanges currently holding a permit.
    pub fn in_flight(&self) -> usize {
        self.policy.permits() - self.permits.available_permits()
    }

    /// Run one exchange. Resolves once headers (and, unless skipped, the
    /// body) were handed to the transport.
    pub async fn handle(&self, token: RequestToken, request: InboundRequest) {
        let span = tracing::info_span!(
            "exchange",
            %token,
            method = %request.method,
            url = %request.url
        );
        self.exchange(token, request).instrument(span).await
    }

    async fn exchange(&self, token: RequestToken, request: InboundRequest) {
        let permit = self.permits.clone().acquire_owned().await.ok();
        let method = request.method.clone();

        let mut exchange = Exchange {
            context: RequestContext::new(
                self.pipeline.clone(),
                BoundaryHandle::new(token, self.transport.clone()),
                self.skip_body_completion.clone(),
            ),
            pending: None,
            deadline: self.request_timeout.map(|timeout| (Instant::now() + timeout, timeout)),
            method,
            started: std::time::Instant::now(),
            _permit: permit,
            _in_flight: InFlightGuard::new(),
        };

        tracing::debug!("Exchange started");

        let result = match exchange.context.process_request(request) {
            Ok(pending) => {
                let pending = exchange.pending.insert(pending);
                within(exchange.deadline, exchange.context.process_response(pending)).await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => exchange.finish().await,
            Err(e) => exchange.fail(e).await,
        }
    }
}

impl<P: Pipeline> InboundHandler for InteropAdapter<P> {
    fn handle(&self, token: RequestToken, request: InboundRequest) -> BoxFuture<'static, ()> {
        let adapter = self.clone();
        async move { adapter.handle(token, request).await }.boxed()
    }
}

/// Everything one exchange owns until its response has ended.
struct Exchange<P: Pipeline> {
    context: RequestContext<P>,
    pending: Option<PendingRequest>,
    deadline: Option<(Instant, Duration)>,
    method: String,
    started: std::time::Instant,
    _permit: Option<OwnedSemaphorePermit>,
    _in_flight: InFlightGuard,
}

impl<P: Pipeline> Exchange<P> {
    /// Dispose now if the pipeline is done, otherwise in a continuation.
    async fn finish(self) {
        let finished = self.pending.as_ref().map_or(true, PendingRequest::is_finished);
        if finished {
            self.complete().await;
        } else {
            tracing::debug!("Pipeline still running; completing in background");
            tokio::spawn(self.complete().in_current_span());
        }
    }

    async fn complete(mut self) {
        let deadline = self.deadline;
        let error = match self.pending.as_mut() {
            Some(pending) => {
                let settled = within(deadline, async {
                    pending.settle().await;
                    Ok(())
                })
                .await;
                match settled {
                    Ok(()) => pending.take_error(),
                    Err(e) => {
                        pending.abort();
                        pending.settle().await;
                        Some(e)
                    }
                }
            }
            None => None,
        };

        if let Some(e) = &error {
            tracing::error!(error = %render_error(e), "Exchange failed after response headers were sent");
        }
        self.close(error).await;
    }

    async fn fail(mut self, error: BridgeError) {
        if let Some(pending) = self.pending.as_mut() {
            pending.abort();
            pending.settle().await;
        }

        let text = render_error(&error);
        if self.context.has_started() {
            tracing::error!(error = %text, "Exchange failed after response headers were sent");
        } else {
            let status = error.fallback_status();
            tracing::warn!(status, error = %text, "Sending fallback response");
            metrics::record_fallback(error.kind());
            if let Err(e) = self.context.send_fallback(status, text).await {
                tracing::warn!(error = %render_error(&e), "Failed to send fallback response");
            }
        }
        self.close(Some(error)).await;
    }

    async fn close(mut self, error: Option<BridgeError>) {
        self.context.dispose(error.as_ref()).await;
        metrics::record_request(&self.method, self.context.sent_status(), self.started);
        tracing::debug!(
            status = ?self.context.sent_status(),
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Exchange finished"
        );
    }
}

/// Run `fut`, failing with `DeadlineExceeded` once `deadline` passes.
async fn within<T>(
    deadline: Option<(Instant, Duration)>,
    fut: impl Future<Output = Result<T, BridgeError>>,
) -> Result<T, BridgeError> {
    match deadline {
        Some((at, timeout)) => tokio::time::timeout_at(at, fut)
            .await
            .unwrap_or(Err(BridgeError::DeadlineExceeded(timeout))),
        None => fut.await,
    }
}
