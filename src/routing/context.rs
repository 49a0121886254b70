//! Per-request context handed to the router and value providers.

use std::net::SocketAddr;

use axum::http::{HeaderMap, Method};

use crate::routing::matcher::normalize_path;
use crate::token::Token;

/// Normalized path of the session token endpoint.
pub const TOKEN_PATH: &str = "latest/api/token";

/// Header carrying a session token on metadata requests.
pub const TOKEN_HEADER: &str = "x-aws-ec2-metadata-token";

/// Header carrying the requested TTL on token requests.
pub const TOKEN_TTL_HEADER: &str = "x-aws-ec2-metadata-token-ttl-seconds";

/// Ephemeral bag of request data. Dropped once the response is sent.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    /// Normalized catalog key.
    pub path: String,
    /// Path as received.
    pub raw_path: String,
    pub headers: HeaderMap,
    pub client_addr: Option<SocketAddr>,
    pub request_id: String,
    /// Token resolved from [`TOKEN_HEADER`], set by the router once
    /// validated.
    pub token: Option<Token>,
}

impl RequestContext {
    pub fn new(method: Method, raw_path: &str, headers: HeaderMap) -> Self {
        Self {
            method,
            path: normalize_path(raw_path),
            raw_path: raw_path.to_string(),
            headers,
            client_addr: None,
            request_id: String::new(),
            token: None,
        }
    }

    pub fn with_client_addr(mut self, addr: Option<SocketAddr>) -> Self {
        self.client_addr = addr;
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = id.into();
        self
    }

    /// Value of a header as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The session token the client supplied, if any. The inner value is
    /// `None` when the header is present but not valid UTF-8; such a token
    /// can never match an issued id.
    pub fn supplied_token(&self) -> Option<Option<&str>> {
        let raw = self.headers.get(TOKEN_HEADER)?;
        match raw.to_str() {
            Ok(id) => {
                let id = id.trim();
                (!id.is_empty()).then_some(Some(id))
            }
            Err(_) => Some(None),
        }
    }
}
