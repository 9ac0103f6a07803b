//! Shared utilities for integration tests.

#![allow(dead_code)]

pub mod recording;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::Notify;

use http_bridge::boundary::{InboundRequest, RequestToken};
use http_bridge::bridge::{render_error, BridgeError};
use http_bridge::pipeline::{HttpContext, Pipeline, PipelineError, Request, Response};

pub use recording::{Call, RecordingTransport};

/// One pipeline action.
#[derive(Clone)]
pub enum Step {
    Status(u16),
    Header(&'static str, &'static str),
    Write(&'static str),
    Start,
    Complete,
    Sleep(Duration),
    Wait(Arc<Notify>),
    Fail(&'static str),
    Panic(&'static str),
}

/// Pipeline that replays a script chosen by request path.
///
/// A route of `"*"` matches every path.
#[derive(Default)]
pub struct ScriptedPipeline {
    routes: Vec<(&'static str, Vec<Step>)>,
    disposed: AtomicUsize,
    dispose_errors: Mutex<Vec<String>>,
}

impl ScriptedPipeline {
    pub fn new(steps: Vec<Step>) -> Self {
        Self::default().route("*", steps)
    }

    pub fn route(mut self, path: &'static str, steps: Vec<Step>) -> Self {
        self.routes.push((path, steps));
        self
    }

    /// Contexts released so far.
    pub fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Rendered errors passed to `dispose_context`.
    pub fn dispose_errors(&self) -> Vec<String> {
        self.dispose_errors.lock().unwrap().clone()
    }

    fn steps_for(&self, path: &str) -> Vec<Step> {
        self.routes
            .iter()
            .find(|(route, _)| *route == path || *route == "*")
            .map(|(_, steps)| steps.clone())
            .unwrap_or_else(|| vec![Step::Status(404)])
    }
}

impl Pipeline for ScriptedPipeline {
    type Context = HttpContext;

    fn create_context(&self, request: Request, response: Response) -> HttpContext {
        HttpContext::new(request, response)
    }

    fn process_request<'a>(&'a self, ctx: &'a mut HttpContext) -> BoxFuture<'a, Result<(), PipelineError>> {
        async move {
            for step in self.steps_for(ctx.request.path()) {
                match step {
                    Step::Status(status) => ctx.response.set_status(status)?,
                    Step::Header(name, value) => ctx.response.append_header(name, value)?,
                    Step::Write(text) => ctx.response.write(text).await?,
                    Step::Start => ctx.response.start(),
                    Step::Complete => ctx.response.complete(),
                    Step::Sleep(duration) => tokio::time::sleep(duration).await,
                    Step::Wait(notify) => notify.notified().await,
                    Step::Fail(message) => return Err(PipelineError::msg(message)),
                    Step::Panic(message) => panic!("{}", message),
                }
            }
            Ok(())
        }
        .boxed()
    }

    fn dispose_context(&self, _context: HttpContext, error: Option<&BridgeError>) {
        self.disposed.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = error {
            self.dispose_errors.lock().unwrap().push(render_error(error));
        }
    }
}

pub fn get(url: &str) -> InboundRequest {
    InboundRequest {
        method: "GET".into(),
        url: url.into(),
        ..Default::default()
    }
}

pub fn headers(status: u16, pairs: &[(&str, &str)]) -> Call {
    Call::Headers {
        status,
        names: pairs.iter().map(|(n, _)| n.to_string()).collect(),
        values: pairs.iter().map(|(_, v)| v.to_string()).collect(),
    }
}

pub fn buffer(text: &str) -> Call {
    Call::Buffer(text.as_bytes().to_vec())
}

/// Number of `send_end` calls for `token`.
pub fn end_count(transport: &RecordingTransport, token: RequestToken) -> usize {
    transport
        .calls_for(token)
        .into_iter()
        .filter(|call| *call == Call::End)
        .count()
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met within 2s");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Wait until the response for `token` has ended and its handle is released.
pub async fn wait_for_end(transport: &RecordingTransport, token: RequestToken) {
    wait_until(|| end_count(transport, token) > 0 && transport.release_count(token) > 0).await;
}
