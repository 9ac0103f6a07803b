//! Per-request boundary capability.
//!
//! # Responsibilities
//! - Bind a request token to the transport that issued it
//! - Expose only the outbound calls one exchange may make
//! - Release the token exactly once, even if the owner forgets

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use crate::boundary::token::RequestToken;
use crate::boundary::transport::{Transport, TransportError};
use crate::pipeline::HeaderList;

/// Capability to write one response across the boundary.
pub struct BoundaryHandle {
    token: RequestToken,
    transport: Arc<dyn Transport>,
    released: AtomicBool,
}

impl BoundaryHandle {
    pub fn new(token: RequestToken, transport: Arc<dyn Transport>) -> Self {
        Self {
            token,
            transport,
            released: AtomicBool::new(false),
        }
    }

    pub fn token(&self) -> RequestToken {
        self.token
    }

    /// Send the status line and headers, preserving header order.
    pub async fn send_headers(&self, status: u16, headers: &HeaderList) -> Result<(), TransportError> {
        self.ensure_live()?;
        let (names, values) = headers.to_parallel();
        self.transport
            .send_headers(self.token, status, &names, &values)
            .await
    }

    /// Send body bytes.
    pub async fn send(&self, bytes: Bytes) -> Result<(), TransportError> {
        self.ensure_live()?;
        let count = bytes.len();
        self.transport.send_buffer(self.token, bytes, 0, count).await
    }

    /// Signal end of response.
    pub async fn end(&self) -> Result<(), TransportError> {
        self.ensure_live()?;
        self.transport.send_end(self.token).await
    }

    /// Release the token. Returns false if it was already released.
    pub fn dispose(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.transport.release(self.token);
        tracing::trace!(token = %self.token, "Boundary handle released");
        true
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    fn ensure_live(&self) -> Result<(), TransportError> {
        if self.is_released() {
            Err(TransportError::Released(self.token))
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for BoundaryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundaryHandle")
            .field("token", &self.token)
            .field("released", &self.is_released())
            .finish()
    }
}

impl Drop for BoundaryHandle {
    fn drop(&mut self) {
        if self.dispose() {
            tracing::debug!(token = %self.token, "Boundary handle released on drop");
        }
    }
}
