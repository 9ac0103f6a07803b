//! Socket-backed [`Transport`].
//!
//! # Responsibilities
//! - Bind every port × host pair of a listen plan
//! - Terminate TLS on https ports
//! - Forward response fragments to the exchange table
//! - Drain listeners gracefully on stop
//!
//! # Design Decisions
//! - Sockets are bound synchronously before any server is spawned, so a
//!   bind failure aborts the whole start with nothing left listening
//! - Each listener has its own shutdown handle

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::http::HeaderName;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use bytes::Bytes;
use futures_util::future::{BoxFuture, FutureExt};
use tokio::task::JoinHandle;

use crate::boundary::transport::slice_buffer;
use crate::boundary::{
    BridgeHandle, ListenAddress, ListenPlan, RequestToken, Scheme, Transport, TransportError,
};
use crate::config::{TlsConfig, TransportConfig};
use crate::net::dispatch::{self, DispatchState};
use crate::net::exchange::{ExchangeTable, Fragment};
use crate::net::tls::load_tls_config;

/// Settings for [`NetTransport`].
#[derive(Debug, Clone)]
pub struct NetOptions {
    pub max_body_size: usize,
    pub request_id_header: Option<HeaderName>,
    pub response_buffer: usize,
    pub shutdown_grace: Duration,
    pub tls: Option<TlsConfig>,
}

impl Default for NetOptions {
    fn default() -> Self {
        Self::from(&TransportConfig::default())
    }
}

impl From<&TransportConfig> for NetOptions {
    fn from(config: &TransportConfig) -> Self {
        let request_id_header = match config.request_id_header.as_str() {
            "" => None,
            name => match HeaderName::from_bytes(name.as_bytes()) {
                Ok(name) => Some(name),
                Err(_) => {
                    tracing::warn!(header = %name, "Invalid request ID header name; request IDs disabled");
                    None
                }
            },
        };
        Self {
            max_body_size: config.max_body_size,
            request_id_header,
            response_buffer: config.response_buffer,
            shutdown_grace: Duration::from_secs(config.shutdown_grace_secs),
            tls: config.tls.clone(),
        }
    }
}

struct Listener {
    scheme: Scheme,
    address: SocketAddr,
    handle: Handle,
    task: JoinHandle<std::io::Result<()>>,
}

/// HTTP/HTTPS listener that feeds the bridge.
pub struct NetTransport {
    options: NetOptions,
    exchanges: Arc<ExchangeTable>,
    listeners: Mutex<Vec<Listener>>,
}

impl NetTransport {
    pub fn new(options: NetOptions) -> Self {
        Self {
            exchanges: Arc::new(ExchangeTable::new(options.response_buffer)),
            options,
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Bound addresses, in plan order.
    pub fn local_addrs(&self) -> Vec<(Scheme, SocketAddr)> {
        self.listeners()
            .iter()
            .map(|listener| (listener.scheme, listener.address))
            .collect()
    }

    /// Exchanges waiting for or streaming a response.
    pub fn live_exchanges(&self) -> usize {
        self.exchanges.len()
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<Listener>> {
        self.listeners.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn bind_all(&self, plan: &ListenPlan, bridge: BridgeHandle) -> Result<Vec<Listener>, TransportError> {
        let rustls = if plan.https_ports.is_empty() {
            None
        } else {
            let tls = self.options.tls.as_ref().ok_or(TransportError::MissingTlsConfig)?;
            Some(load_tls_config(tls).await.map_err(TransportError::Tls)?)
        };

        let mut sockets = Vec::new();
        for endpoint in plan.endpoints() {
            sockets.push((endpoint.scheme, bind(&endpoint).await?));
        }

        let mut listeners = Vec::with_capacity(sockets.len());
        for (scheme, socket) in sockets {
            let address = socket.local_addr().map_err(|source| TransportError::Bind {
                address: scheme.to_string(),
                source,
            })?;
            let app = dispatch::router(
                DispatchState {
                    bridge: bridge.clone(),
                    exchanges: self.exchanges.clone(),
                    scheme,
                    local_authority: address.to_string(),
                    request_id_header: self.options.request_id_header.clone(),
                },
                self.options.max_body_size,
            );

            let handle = Handle::new();
            let task = match (scheme, &rustls) {
                (Scheme::Https, Some(config)) => serve_tls(socket, config.clone(), handle.clone(), app),
                _ => serve_plain(socket, handle.clone(), app),
            };

            tracing::info!(scheme = %scheme, address = %address, "Listening");
            listeners.push(Listener {
                scheme,
                address,
                handle,
                task,
            });
        }
        Ok(listeners)
    }
}

async fn bind(endpoint: &ListenAddress) -> Result<std::net::TcpListener, TransportError> {
    let bind_error = |source: std::io::Error| TransportError::Bind {
        address: endpoint.to_string(),
        source,
    };

    let address = tokio::net::lookup_host((endpoint.host.as_str(), endpoint.port))
        .await
        .map_err(bind_error)?
        .next()
        .ok_or_else(|| {
            bind_error(std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                "host resolved to no addresses",
            ))
        })?;

    let socket = std::net::TcpListener::bind(address).map_err(bind_error)?;
    socket.set_nonblocking(true).map_err(bind_error)?;
    Ok(socket)
}

fn serve_plain(socket: std::net::TcpListener, handle: Handle, app: axum::Router) -> JoinHandle<std::io::Result<()>> {
    tokio::spawn(
        axum_server::from_tcp(socket)
            .handle(handle)
            .serve(app.into_make_service()),
    )
}

fn serve_tls(
    socket: std::net::TcpListener,
    config: RustlsConfig,
    handle: Handle,
    app: axum::Router,
) -> JoinHandle<std::io::Result<()>> {
    tokio::spawn(
        axum_server::tls_rustls::from_tcp_rustls(socket, config)
            .handle(handle)
            .serve(app.into_make_service()),
    )
}

impl Transport for NetTransport {
    fn send_headers<'a>(
        &'a self,
        token: RequestToken,
        status: u16,
        header_names: &'a [String],
        header_values: &'a [String],
    ) -> BoxFuture<'a, Result<(), TransportError>> {
        async move {
            let headers = header_names
                .iter()
                .cloned()
                .zip(header_values.iter().cloned())
                .collect();
            self.exchanges
                .send(token, Fragment::Head { status, headers })
                .await
        }
        .boxed()
    }

    fn send_buffer(
        &self,
        token: RequestToken,
        buffer: Bytes,
        offset: usize,
        count: usize,
    ) -> BoxFuture<'_, Result<(), TransportError>> {
        async move {
            let bytes = slice_buffer(&buffer, offset, count)?;
            if bytes.is_empty() {
                return Ok(());
            }
            self.exchanges.send(token, Fragment::Body(bytes)).await
        }
        .boxed()
    }

    fn send_end(&self, token: RequestToken) -> BoxFuture<'_, Result<(), TransportError>> {
        async move { self.exchanges.send(token, Fragment::End).await }.boxed()
    }

    fn release(&self, token: RequestToken) {
        self.exchanges.close(token);
    }

    fn start_listening<'a>(
        &'a self,
        plan: &'a ListenPlan,
        bridge: BridgeHandle,
    ) -> BoxFuture<'a, Result<(), TransportError>> {
        async move {
            if !self.listeners().is_empty() {
                return Err(TransportError::AlreadyListening);
            }
            let listeners = self.bind_all(plan, bridge).await?;
            self.listeners().extend(listeners);
            Ok(())
        }
        .boxed()
    }

    fn stop_listening(&self) -> BoxFuture<'_, Result<(), TransportError>> {
        async move {
            let listeners = std::mem::take(&mut *self.listeners());
            for listener in &listeners {
                listener.handle.graceful_shutdown(Some(self.options.shutdown_grace));
            }
            for listener in listeners {
                match listener.task.await {
                    Ok(Ok(())) => tracing::info!(address = %listener.address, "Listener stopped"),
                    Ok(Err(e)) => tracing::warn!(address = %listener.address, error = %e, "Listener failed"),
                    Err(e) => tracing::warn!(address = %listener.address, error = %e, "Listener task failed"),
                }
            }
            Ok(())
        }
        .boxed()
    }
}

impl std::fmt::Debug for NetTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetTransport")
            .field("listeners", &self.local_addrs())
            .field("live_exchanges", &self.live_exchanges())
            .finish()
    }
}
