//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (server.rs):
//!     Parse addresses → Register adapter → Transport starts listening
//!
//! Shutdown (server.rs):
//!     Signal received → Transport stops listening → Deregister adapter
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: addresses validated before anything is registered
//! - Ordered shutdown: stop accepting first, deregister last

pub mod server;
pub mod signals;

pub use server::{BridgeServer, StartError};
pub use signals::shutdown_signal;
