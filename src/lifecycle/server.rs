//! Bridge server lifecycle.
//!
//! # Responsibilities
//! - Parse listen addresses into a plan before touching anything
//! - Register the one live adapter and start the transport
//! - Stop the transport and deregister, so later inbound calls fail loudly
//!
//! # Design Decisions
//! - Address errors abort start before registration or listening
//! - A transport that fails to start leaves nothing registered

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::boundary::{AddressError, BridgeHandle, ListenPlan, Registry, Transport, TransportError};
use crate::bridge::{AdapterOptions, InteropAdapter};
use crate::pipeline::Pipeline;

/// Errors from [`BridgeServer::start`].
#[derive(Debug, Error)]
pub enum StartError {
    #[error("invalid listen addresses")]
    Address(#[from] AddressError),

    #[error("bridge server is already running")]
    AlreadyRunning,

    #[error("transport failed to start listening")]
    Transport(#[source] TransportError),
}

/// Owns the registry, the adapter and the transport for one server.
pub struct BridgeServer<P: Pipeline> {
    registry: Arc<Registry>,
    adapter: InteropAdapter<P>,
    transport: Arc<dyn Transport>,
    running: Mutex<Option<ListenPlan>>,
}

impl<P: Pipeline> BridgeServer<P> {
    pub fn new(pipeline: Arc<P>, transport: Arc<dyn Transport>, options: AdapterOptions) -> Self {
        Self {
            registry: Registry::new(),
            adapter: InteropAdapter::new(pipeline, transport.clone(), options),
            transport,
            running: Mutex::new(None),
        }
    }

    /// Start listening on `addresses`.
    pub async fn start<S: AsRef<str>>(&self, addresses: &[S]) -> Result<(), StartError> {
        let plan = ListenPlan::from_addresses(addresses)?;
        if plan.is_empty() {
            tracing::warn!("No listen addresses configured; transport will not accept traffic");
        }

        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(StartError::AlreadyRunning);
        }

        self.registry.register(Arc::new(self.adapter.clone()));

        if let Err(e) = self
            .transport
            .start_listening(&plan, self.registry.bridge_handle())
            .await
        {
            self.registry.deregister();
            tracing::error!(error = %e, plan = %plan, "Transport failed to start");
            return Err(StartError::Transport(e));
        }

        tracing::info!(
            http_ports = ?plan.http_ports,
            https_ports = ?plan.https_ports,
            hosts = ?plan.hosts,
            tls_hosts = ?plan.tls_hosts(),
            policy = ?self.adapter.policy(),
            "Bridge server started"
        );
        *running = Some(plan);
        Ok(())
    }

    /// Stop the transport and deregister the adapter.
    ///
    /// The adapter is deregistered even if the transport reports an error.
    pub async fn stop(&self) -> Result<(), TransportError> {
        let mut running = self.running.lock().await;
        if running.take().is_none() {
            tracing::debug!("Stop requested while not running");
        }

        let result = self.transport.stop_listening().await;
        self.registry.deregister();

        match &result {
            Ok(()) => tracing::info!("Bridge server stopped"),
            Err(e) => tracing::warn!(error = %e, "Transport failed to stop cleanly"),
        }
        result
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Plan the server is currently listening on.
    pub async fn listen_plan(&self) -> Option<ListenPlan> {
        self.running.lock().await.clone()
    }

    /// Handle for delivering inbound calls without going through a transport.
    pub fn bridge_handle(&self) -> BridgeHandle {
        self.registry.bridge_handle()
    }

    pub fn adapter(&self) -> &InteropAdapter<P> {
        &self.adapter
    }
}
