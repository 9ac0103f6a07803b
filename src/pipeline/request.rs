//! Pipeline-facing request.
//!
//! # Responsibilities
//! - Derive scheme, authority, path and query from the absolute URL
//! - Validate the method token
//! - Rebuild the ordered header list from the boundary's parallel arrays

use axum::http::Method;
use bytes::Bytes;
use thiserror::Error;
use url::Url;

use crate::boundary::InboundRequest;
use crate::pipeline::headers::{HeaderArityError, HeaderList};

/// Errors raised while turning boundary primitives into a [`Request`].
#[derive(Debug, Error)]
pub enum RequestError {
    /// The URL could not be parsed as an absolute URL.
    #[error("invalid request url '{url}'")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The method is not a valid HTTP token.
    #[error("invalid request method '{0}'")]
    InvalidMethod(String),

    /// Header name/value arrays disagree in length.
    #[error(transparent)]
    HeaderArity(#[from] HeaderArityError),
}

/// A fully reconstructed request as seen by the pipeline.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    scheme: String,
    authority: String,
    path: String,
    query: Option<String>,
    headers: HeaderList,
    body: Bytes,
}

impl Request {
    /// Build a request from the primitives delivered by the transport.
    pub fn from_inbound(inbound: InboundRequest) -> Result<Self, RequestError> {
        let url = Url::parse(&inbound.url).map_err(|source| RequestError::InvalidUrl {
            url: inbound.url.clone(),
            source,
        })?;

        let method = Method::from_bytes(inbound.method.as_bytes())
            .map_err(|_| RequestError::InvalidMethod(inbound.method.clone()))?;

        let headers = HeaderList::from_parallel(inbound.header_names, inbound.header_values)?;

        let authority = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        };

        Ok(Self {
            method,
            scheme: url.scheme().to_string(),
            authority,
            path: url.path().to_string(),
            query: url.query().map(str::to_string),
            headers,
            body: inbound.body.unwrap_or_default(),
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Scheme of the URL the client used (`http` or `https`).
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host and optional explicit port.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Absolute path component, always starting with `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw query string without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn headers(&self) -> &HeaderList {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Take the body, leaving an empty one behind.
    pub fn take_body(&mut self) -> Bytes {
        std::mem::take(&mut self.body)
    }
}
