//! Outbound call surface towards the transport.
//!
//! # Responsibilities
//! - Define the primitive-valued calls the bridge makes on the transport
//! - Define the errors a transport may report back
//!
//! # Design Decisions
//! - Every outbound call returns a future; the bridge never assumes a call
//!   completed synchronously
//! - The trait is object safe so one bridge can drive any transport

use bytes::Bytes;
use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::boundary::address::ListenPlan;
use crate::boundary::registry::BridgeHandle;
use crate::boundary::token::RequestToken;

/// Errors reported by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The token does not name a live exchange.
    #[error("unknown request token {0}")]
    UnknownToken(RequestToken),

    /// The client side of the exchange went away.
    #[error("exchange {0} was disconnected")]
    Disconnected(RequestToken),

    /// The boundary handle for this exchange was already released.
    #[error("boundary handle for {0} was already released")]
    Released(RequestToken),

    /// `offset`/`count` do not describe a slice of the buffer.
    #[error("buffer range {offset}+{count} exceeds buffer length {len}")]
    InvalidRange { offset: usize, count: usize, len: usize },

    /// Failed to bind a listening socket.
    #[error("failed to bind {address}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// HTTPS ports were requested but no TLS material is configured.
    #[error("https ports requested but no TLS certificate is configured")]
    MissingTlsConfig,

    /// Loading TLS material failed.
    #[error("TLS configuration error")]
    Tls(#[source] std::io::Error),

    /// `start_listening` was called while already listening.
    #[error("transport is already listening")]
    AlreadyListening,
}

/// The listener side of the boundary.
///
/// Implementations deliver inbound requests through the [`BridgeHandle`]
/// given to [`Transport::start_listening`] and accept response fragments
/// through the remaining methods.
pub trait Transport: Send + Sync + 'static {
    /// Send status and headers. Names and values are parallel arrays.
    fn send_headers<'a>(
        &'a self,
        token: RequestToken,
        status: u16,
        header_names: &'a [String],
        header_values: &'a [String],
    ) -> BoxFuture<'a, Result<(), TransportError>>;

    /// Send `count` body bytes starting at `offset`.
    fn send_buffer(
        &self,
        token: RequestToken,
        buffer: Bytes,
        offset: usize,
        count: usize,
    ) -> BoxFuture<'_, Result<(), TransportError>>;

    /// Signal end of response.
    fn send_end(&self, token: RequestToken) -> BoxFuture<'_, Result<(), TransportError>>;

    /// Release any transport resources tied to `token`.
    fn release(&self, _token: RequestToken) {}

    /// Begin accepting traffic and deliver it through `bridge`.
    fn start_listening<'a>(
        &'a self,
        plan: &'a ListenPlan,
        bridge: BridgeHandle,
    ) -> BoxFuture<'a, Result<(), TransportError>>;

    /// Stop accepting traffic.
    fn stop_listening(&self) -> BoxFuture<'_, Result<(), TransportError>>;
}

/// Cut the `offset`/`count` window out of `buffer`.
pub fn slice_buffer(buffer: &Bytes, offset: usize, count: usize) -> Result<Bytes, TransportError> {
    let end = offset.checked_add(count).filter(|end| *end <= buffer.len());
    match end {
        Some(end) => Ok(buffer.slice(offset..end)),
        None => Err(TransportError::InvalidRange {
            offset,
            count,
            len: buffer.len(),
        }),
    }
}
