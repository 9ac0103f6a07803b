//! Response sink.
//!
//! # States
//! - Buffering: headers not sent yet, body bytes accumulate in memory
//! - Passthrough: headers sent, every write goes straight to the transport
//! - Ended: end-of-response sent and the boundary handle released
//!
//! # State Transitions
//! ```text
//! Buffering → Passthrough: send_headers (flushes the buffer as one write)
//! Buffering → Ended:       send_fallback or dispose
//! Passthrough → Ended:     dispose
//! ```
//!
//! # Design Decisions
//! - Transitions are one-way; a second dispose is a no-op, never a resend
//! - Header send and buffer flush happen under one lock, so a concurrent
//!   write cannot slip between them

use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering};

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::boundary::{BoundaryHandle, RequestToken, TransportError};
use crate::pipeline::HeaderList;

/// Errors raised by the response sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("response headers were already sent")]
    HeadersAlreadySent,

    #[error("response has already ended")]
    Ended,

    #[error("transport rejected response data")]
    Transport(#[from] TransportError),
}

#[derive(Debug)]
enum SinkState {
    Buffering(BytesMut),
    Passthrough,
    Ended,
}

/// Output side of one exchange.
#[derive(Debug)]
pub struct ResponseSink {
    handle: BoundaryHandle,
    state: Mutex<SinkState>,
    headers_sent: AtomicBool,
    ended: AtomicBool,
    status: AtomicU16,
    bytes_written: AtomicU64,
}

impl ResponseSink {
    pub fn new(handle: BoundaryHandle) -> Self {
        Self {
            handle,
            state: Mutex::new(SinkState::Buffering(BytesMut::new())),
            headers_sent: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            status: AtomicU16::new(0),
            bytes_written: AtomicU64::new(0),
        }
    }

    pub fn token(&self) -> RequestToken {
        self.handle.token()
    }

    /// Write body bytes: buffered before headers, forwarded after.
    pub async fn write(&self, bytes: Bytes) -> Result<(), SinkError> {
        let mut state = self.state.lock().await;
        match &mut *state {
            SinkState::Buffering(buffer) => buffer.extend_from_slice(&bytes),
            SinkState::Passthrough => {
                if !bytes.is_empty() {
                    self.handle.send(bytes.clone()).await?;
                }
            }
            SinkState::Ended => return Err(SinkError::Ended),
        }
        self.bytes_written
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Send status and headers, then flush buffered body bytes in one write.
    pub async fn send_headers(&self, status: u16, headers: &HeaderList) -> Result<(), SinkError> {
        let mut state = self.state.lock().await;
        let buffered = match &mut *state {
            SinkState::Buffering(buffer) => std::mem::take(buffer),
            SinkState::Passthrough => return Err(SinkError::HeadersAlreadySent),
            SinkState::Ended => return Err(SinkError::Ended),
        };

        if let Err(e) = self.handle.send_headers(status, headers).await {
            // Nothing reached the client; keep the bytes so a fallback can still be sent.
            *state = SinkState::Buffering(buffered);
            return Err(e.into());
        }

        *state = SinkState::Passthrough;
        self.status.store(status, Ordering::Relaxed);
        self.headers_sent.store(true, Ordering::Release);

        tracing::debug!(
            token = %self.token(),
            status,
            headers = headers.len(),
            buffered = buffered.len(),
            "Response headers sent"
        );

        if !buffered.is_empty() {
            self.handle.send(buffered.freeze()).await?;
        }
        Ok(())
    }

    /// Replace the response with `status` and `body`, then end it.
    ///
    /// Only valid while nothing has been sent; any buffered bytes are
    /// discarded.
    pub async fn send_fallback(&self, status: u16, body: Bytes) -> Result<(), SinkError> {
        let mut state = self.state.lock().await;
        match &*state {
            SinkState::Buffering(_) => {}
            SinkState::Passthrough => return Err(SinkError::HeadersAlreadySent),
            SinkState::Ended => return Err(SinkError::Ended),
        }
        *state = SinkState::Ended;
        self.ended.store(true, Ordering::Release);

        // End is attempted whatever happened before it; the body only
        // follows headers that were accepted.
        let mut first_error = None;
        match self.handle.send_headers(status, &HeaderList::new()).await {
            Ok(()) => {
                self.status.store(status, Ordering::Relaxed);
                self.headers_sent.store(true, Ordering::Release);
                if !body.is_empty() {
                    if let Err(e) = self.handle.send(body).await {
                        tracing::warn!(token = %self.token(), error = %e, "Failed to send fallback body");
                        first_error.get_or_insert(e);
                    }
                }
            }
            Err(e) => {
                tracing::warn!(token = %self.token(), error = %e, "Failed to send fallback headers");
                first_error = Some(e);
            }
        }
        if let Err(e) = self.handle.end().await {
            tracing::warn!(token = %self.token(), error = %e, "Failed to send end of response");
            first_error.get_or_insert(e);
        }

        self.handle.dispose();
        match first_error {
            Some(e) => Err(SinkError::Transport(e)),
            None => Ok(()),
        }
    }

    /// End the response and release the boundary handle.
    ///
    /// Returns false if the sink had already ended.
    pub async fn dispose(&self) -> bool {
        let mut state = self.state.lock().await;
        let previous = std::mem::replace(&mut *state, SinkState::Ended);
        if let SinkState::Ended = previous {
            return false;
        }
        self.ended.store(true, Ordering::Release);

        if let SinkState::Buffering(buffer) = previous {
            tracing::debug!(
                token = %self.token(),
                discarded = buffer.len(),
                "Ending response before headers were sent"
            );
        }

        if let Err(e) = self.handle.end().await {
            tracing::warn!(token = %self.token(), error = %e, "Failed to send end of response");
        }
        self.handle.dispose();
        true
    }

    /// True once headers went out to the transport.
    pub fn headers_sent(&self) -> bool {
        self.headers_sent.load(Ordering::Acquire)
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }

    /// Status that was sent, if any.
    pub fn sent_status(&self) -> Option<u16> {
        match self.status.load(Ordering::Relaxed) {
            0 => None,
            status => Some(status),
        }
    }

    /// Body bytes accepted so far, buffered or sent.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        let transport = crate::boundary::recording::RecordingTransport::new();
        Self::new(BoundaryHandle::new(RequestToken::from_raw(0), transport))
    }
}
