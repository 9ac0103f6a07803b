//! Reference network transport.
//!
//! # Data Flow
//! ```text
//! Incoming TCP/TLS connection
//!     → transport.rs (axum-server listeners, one per port × host)
//!     → dispatch.rs (flatten request, BridgeHandle::handle)
//!     → exchange.rs (token → fragment channel)
//!     → dispatch.rs (head, then streamed body)
//!     → Send to client
//! ```
//!
//! # Design Decisions
//! - HTTP parsing and TLS are delegated to hyper and rustls
//! - The bridge never sees sockets, only tokens and primitives

pub mod dispatch;
pub mod exchange;
pub mod tls;
pub mod transport;

pub use transport::{NetOptions, NetTransport};
