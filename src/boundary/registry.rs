//! Registration of the live adapter.
//!
//! # Responsibilities
//! - Hold the single adapter that inbound calls are routed to
//! - Give the transport a typed handle instead of a global instance
//! - Fail loudly when a call arrives while nothing is registered
//!
//! # Design Decisions
//! - Lock-free reads via `ArcSwapOption`; only start/stop write the slot
//! - An unregistered call is a programming error, so it panics

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use bytes::Bytes;
use futures_util::future::BoxFuture;

use crate::boundary::token::RequestToken;
use crate::boundary::InboundRequest;

/// Receiver of inbound boundary calls.
pub trait InboundHandler: Send + Sync + 'static {
    /// Handle one exchange. The future resolves once the response has been
    /// handed to the transport (body streaming may continue afterwards).
    fn handle(&self, token: RequestToken, request: InboundRequest) -> BoxFuture<'static, ()>;
}

struct Registered {
    handler: Arc<dyn InboundHandler>,
}

/// Slot holding the one registered adapter.
#[derive(Default)]
pub struct Registry {
    slot: ArcSwapOption<Registered>,
}

impl Registry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `handler`, replacing any previous one.
    ///
    /// Returns true if another handler was registered before.
    pub fn register(&self, handler: Arc<dyn InboundHandler>) -> bool {
        self.slot
            .swap(Some(Arc::new(Registered { handler })))
            .is_some()
    }

    /// Clear the slot. Returns true if a handler was registered.
    pub fn deregister(&self) -> bool {
        self.slot.swap(None).is_some()
    }

    pub fn is_registered(&self) -> bool {
        self.slot.load().is_some()
    }

    /// Handle for the transport to deliver inbound calls through.
    pub fn bridge_handle(self: &Arc<Self>) -> BridgeHandle {
        BridgeHandle {
            registry: Arc::clone(self),
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("registered", &self.is_registered())
            .finish()
    }
}

/// The transport's entry point into the bridge.
#[derive(Clone, Debug)]
pub struct BridgeHandle {
    registry: Arc<Registry>,
}

impl BridgeHandle {
    /// Deliver one request. Header names and values are parallel arrays.
    ///
    /// # Panics
    /// Panics if no adapter is registered, i.e. the server was never started
    /// or has been stopped.
    pub fn handle(
        &self,
        token: RequestToken,
        method: String,
        url: String,
        header_names: Vec<String>,
        header_values: Vec<String>,
        body: Option<Bytes>,
    ) -> BoxFuture<'static, ()> {
        let registered = match self.registry.slot.load_full() {
            Some(registered) => registered,
            None => panic!("inbound call for {} while no bridge adapter is registered", token),
        };

        registered.handler.handle(
            token,
            InboundRequest {
                method,
                url,
                header_names,
                header_values,
                body,
            },
        )
    }

    pub fn is_registered(&self) -> bool {
        self.registry.is_registered()
    }
}
