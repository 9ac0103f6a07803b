//! Boundary between the transport and the bridge.
//!
//! # Data Flow
//! ```text
//! Transport (listener process)
//!     → registry.rs (BridgeHandle::handle, primitives in)
//!     → [bridge adapter drives the pipeline]
//!     → handle.rs (BoundaryHandle: headers, body, end)
//!     → transport.rs (Transport trait, primitives out)
//! ```
//!
//! # Design Decisions
//! - Only primitive values cross: strings, byte buffers, integers
//! - The transport reaches the adapter through an injected handle, never a global
//! - A request token is a capability, not a castable resource pointer

pub mod address;
pub mod handle;
#[cfg(test)]
pub(crate) mod recording;
pub mod registry;
pub mod token;
pub mod transport;

use bytes::Bytes;

pub use address::{AddressError, ListenAddress, ListenPlan, Scheme};
pub use handle::BoundaryHandle;
pub use registry::{BridgeHandle, InboundHandler, Registry};
pub use token::RequestToken;
pub use transport::{Transport, TransportError};

/// One inbound call, exactly as delivered by the transport.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    /// Request method as sent by the client.
    pub method: String,
    /// Absolute request URL; the bridge derives scheme, path and query.
    pub url: String,
    /// Header names, parallel to `header_values`.
    pub header_names: Vec<String>,
    /// Header values, parallel to `header_names`.
    pub header_values: Vec<String>,
    /// Request body, if any.
    pub body: Option<Bytes>,
}
