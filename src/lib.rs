//! HTTP interop bridge library.
//!
//! Lets a request pipeline running in one environment serve traffic accepted
//! by a listener running in another, through a boundary that only passes
//! strings, byte buffers and integers.

pub mod boundary;
pub mod bridge;
pub mod config;
pub mod hello;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod pipeline;

pub use boundary::{BridgeHandle, RequestToken, Transport};
pub use bridge::{AdapterOptions, ConcurrencyPolicy, InteropAdapter};
pub use config::BridgeConfig;
pub use lifecycle::{BridgeServer, StartError};
pub use pipeline::{Pipeline, PipelineError, Request, Response};
