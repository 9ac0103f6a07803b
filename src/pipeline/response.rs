//! Pipeline-facing response handle.
//!
//! # Responsibilities
//! - Hold status and headers until the response starts
//! - Route body writes into the response sink
//! - Publish the body phase (pending → started → completed) to the bridge
//!
//! # Design Decisions
//! - Status and headers become read-only once the response starts
//! - Writes before the start are buffered by the sink, not rejected
//! - The phase is a `watch` channel so the bridge can await transitions

use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::watch;

use crate::bridge::sink::{ResponseSink, SinkError};
use crate::pipeline::headers::HeaderList;

/// Progress of the response body, as observed by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyPhase {
    /// Status and headers may still change.
    Pending,
    /// Headers are final; the body may still be streaming.
    Started,
    /// The body is complete.
    Completed,
    /// The pipeline ended without ever starting the response.
    Faulted,
}

impl BodyPhase {
    /// True once the head of the response is final.
    pub fn has_started(self) -> bool {
        !matches!(self, BodyPhase::Pending)
    }

    pub(crate) fn is_terminal(self) -> bool {
        matches!(self, BodyPhase::Completed | BodyPhase::Faulted)
    }
}

/// Errors surfaced to the pipeline by [`Response`].
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("response has already started; status and headers are read-only")]
    AlreadyStarted,

    #[error("response body is already complete")]
    Completed,

    #[error("invalid status code {0}")]
    InvalidStatus(u16),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

#[derive(Debug)]
struct Head {
    status: u16,
    headers: HeaderList,
}

#[derive(Debug)]
struct Shared {
    head: Mutex<Head>,
    phase: watch::Sender<BodyPhase>,
    sink: Arc<ResponseSink>,
}

/// Cloneable handle the pipeline uses to build its response.
#[derive(Debug, Clone)]
pub struct Response {
    shared: Arc<Shared>,
}

impl Response {
    pub(crate) fn new(sink: Arc<ResponseSink>) -> Self {
        let (phase, _) = watch::channel(BodyPhase::Pending);
        Self {
            shared: Arc::new(Shared {
                head: Mutex::new(Head {
                    status: 200,
                    headers: HeaderList::new(),
                }),
                phase,
                sink,
            }),
        }
    }

    pub fn status(&self) -> u16 {
        self.head().status
    }

    pub fn set_status(&self, status: u16) -> Result<(), ResponseError> {
        if !(100..=599).contains(&status) {
            return Err(ResponseError::InvalidStatus(status));
        }
        self.edit_head(|head| head.status = status)
    }

    /// Snapshot of the current headers.
    pub fn headers(&self) -> HeaderList {
        self.head().headers.clone()
    }

    pub fn insert_header(&self, name: impl Into<String>, value: impl Into<String>) -> Result<(), ResponseError> {
        let (name, value) = (name.into(), value.into());
        self.edit_head(|head| head.headers.insert(name, value))
    }

    pub fn append_header(&self, name: impl Into<String>, value: impl Into<String>) -> Result<(), ResponseError> {
        let (name, value) = (name.into(), value.into());
        self.edit_head(|head| head.headers.append(name, value))
    }

    pub fn remove_header(&self, name: &str) -> Result<(), ResponseError> {
        self.edit_head(|head| {
            head.headers.remove(name);
        })
    }

    /// Write body bytes.
    ///
    /// Before the response starts the bytes are buffered; afterwards they go
    /// straight to the transport.
    pub async fn write(&self, bytes: impl Into<Bytes>) -> Result<(), ResponseError> {
        if self.phase().is_terminal() {
            return Err(ResponseError::Completed);
        }
        self.shared.sink.write(bytes.into()).await?;
        Ok(())
    }

    /// Finalize status and headers. Idempotent.
    pub fn start(&self) {
        self.shared.phase.send_if_modified(|phase| {
            if *phase == BodyPhase::Pending {
                *phase = BodyPhase::Started;
                true
            } else {
                false
            }
        });
    }

    /// Mark the body complete. Implies [`Response::start`].
    pub fn complete(&self) {
        self.shared.phase.send_if_modified(|phase| {
            if phase.is_terminal() {
                false
            } else {
                *phase = BodyPhase::Completed;
                true
            }
        });
    }

    /// True once status and headers are final.
    pub fn has_started(&self) -> bool {
        self.phase().has_started()
    }

    /// Bytes written so far, buffered or sent.
    pub fn bytes_written(&self) -> u64 {
        self.shared.sink.bytes_written()
    }

    pub(crate) fn phase(&self) -> BodyPhase {
        *self.shared.phase.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<BodyPhase> {
        self.shared.phase.subscribe()
    }

    /// Settle the phase after the pipeline task ended, however it ended.
    ///
    /// A response that never started is `Faulted` when the pipeline failed
    /// and `Completed` (implicitly started) when it succeeded.
    pub(crate) fn settle(&self, succeeded: bool) {
        self.shared.phase.send_if_modified(|phase| match *phase {
            BodyPhase::Pending if !succeeded => {
                *phase = BodyPhase::Faulted;
                true
            }
            BodyPhase::Pending | BodyPhase::Started => {
                *phase = BodyPhase::Completed;
                true
            }
            BodyPhase::Completed | BodyPhase::Faulted => false,
        });
    }

    /// Status and headers as they will be sent.
    pub(crate) fn snapshot(&self) -> (u16, HeaderList) {
        let head = self.head();
        (head.status, head.headers.clone())
    }

    fn edit_head(&self, edit: impl FnOnce(&mut Head)) -> Result<(), ResponseError> {
        let mut head = self.head();
        if self.has_started() {
            return Err(ResponseError::AlreadyStarted);
        }
        edit(&mut head);
        Ok(())
    }

    fn head(&self) -> MutexGuard<'_, Head> {
        self.shared.head.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
