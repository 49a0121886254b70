//! Request context extraction.
//!
//! # Responsibilities
//! - Build a RequestContext from the axum request
//! - Carry the request ID set by the request-id layer
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Client address is optional so in-process (oneshot) requests work

use std::net::SocketAddr;

use axum::{body::Body, extract::ConnectInfo, http::Request};

use crate::routing::RequestContext;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Snapshot the parts of a request the router needs.
pub fn context_from(request: &Request<Body>) -> RequestContext {
    let client_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    RequestContext::new(
        request.method().clone(),
        request.uri().path(),
        request.headers().clone(),
    )
    .with_client_addr(client_addr)
    .with_request_id(request_id)
}
