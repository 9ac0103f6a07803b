//! HTTP entry point of the reference transport.
//!
//! # Responsibilities
//! - Flatten an accepted request into boundary primitives
//! - Add a request ID when configured and absent
//! - Wait for the response head, then stream body fragments to the client
//!
//! # Design Decisions
//! - A catch-all fallback handler; routing belongs to the pipeline
//! - Body size is capped by `DefaultBodyLimit` (413 from the extractor)
//! - An exchange that ends without a head yields 502

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::HOST;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use bytes::Bytes;
use futures_util::stream;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::boundary::{BridgeHandle, Scheme};
use crate::net::exchange::{ExchangeTable, Fragment};

/// Per-listener handler state.
#[derive(Clone)]
pub struct DispatchState {
    pub bridge: BridgeHandle,
    pub exchanges: Arc<ExchangeTable>,
    pub scheme: Scheme,
    /// Authority used when the client sent no `Host` header.
    pub local_authority: String,
    pub request_id_header: Option<HeaderName>,
}

/// Build the router for one listener.
pub fn router(state: DispatchState, max_body_size: usize) -> Router {
    Router::new()
        .fallback(dispatch)
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(TraceLayer::new_for_http())
}

async fn dispatch(
    State(state): State<DispatchState>,
    method: Method,
    uri: Uri,
    mut headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = state
        .request_id_header
        .as_ref()
        .map(|name| ensure_request_id(&mut headers, name));

    let url = absolute_url(&state, &uri, &headers);
    let (names, values) = flatten_headers(&headers);
    let body = (!body.is_empty()).then_some(body);

    let (token, mut fragments) = state.exchanges.open();
    let span = tracing::debug_span!("dispatch", %token, request_id = request_id.as_deref().unwrap_or(""));

    let inbound = state
        .bridge
        .handle(token, method.to_string(), url, names, values, body);
    tokio::spawn(inbound.instrument(span.clone()));

    let head = fragments.recv().instrument(span).await;
    let mut response = match head {
        Some(Fragment::Head { status, headers }) => build_head(status, headers),
        Some(_) | None => {
            tracing::warn!(%token, "Exchange ended without a response head");
            state.exchanges.close(token);
            return (StatusCode::BAD_GATEWAY, "Bridge produced no response").into_response();
        }
    };

    if let (Some(name), Some(id)) = (&state.request_id_header, request_id) {
        if !response.headers().contains_key(name) {
            if let Ok(value) = HeaderValue::from_str(&id) {
                response.headers_mut().insert(name.clone(), value);
            }
        }
    }

    *response.body_mut() = Body::from_stream(body_stream(fragments));
    response
}

/// Reuse the client's request ID or generate one.
fn ensure_request_id(headers: &mut HeaderMap, name: &HeaderName) -> String {
    if let Some(existing) = headers.get(name).and_then(|v| v.to_str().ok()) {
        return existing.to_string();
    }
    let id = uuid::Uuid::new_v4().to_string();
    if let Ok(value) = HeaderValue::from_str(&id) {
        headers.insert(name.clone(), value);
    }
    id
}

fn absolute_url(state: &DispatchState, uri: &Uri, headers: &HeaderMap) -> String {
    let authority = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.to_string()))
        .unwrap_or_else(|| state.local_authority.clone());
    let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
    format!("{}://{}{}", state.scheme, authority, path_and_query)
}

fn flatten_headers(headers: &HeaderMap) -> (Vec<String>, Vec<String>) {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .unzip()
}

fn build_head(status: u16, headers: Vec<(String, String)>) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    for (name, value) in headers {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(&value)) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().append(name, value);
            }
            _ => tracing::warn!(header = %name, "Dropping invalid response header"),
        }
    }
    response
}

fn body_stream(fragments: mpsc::Receiver<Fragment>) -> impl futures_util::Stream<Item = Result<Bytes, Infallible>> {
    stream::unfold(fragments, |mut rx| async move {
        match rx.recv().await {
            Some(Fragment::Body(bytes)) => Some((Ok(bytes), rx)),
            Some(Fragment::End) | Some(Fragment::Head { .. }) | None => None,
        }
    })
}
