//! Request/response bridge core.
//!
//! # Data Flow
//! ```text
//! BridgeHandle::handle (primitives in)
//!     → adapter.rs (permit, deadline, fallback)
//!     → context.rs (request built, pipeline task spawned)
//!     → sink.rs (buffer until headers, then passthrough)
//!     → BoundaryHandle (primitives out)
//! ```
//!
//! # Design Decisions
//! - One context and one sink per exchange, never shared
//! - Every path ends in exactly one dispose

pub mod adapter;
pub mod context;
pub mod error;
pub mod sink;

pub use adapter::{AdapterOptions, ConcurrencyPolicy, InteropAdapter};
pub use context::{PendingRequest, RequestContext};
pub use error::{render_error, BridgeError};
pub use sink::{ResponseSink, SinkError};
