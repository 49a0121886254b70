//! One-shot fetch mode: serve a single request in-process and exit.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use tower::ServiceExt;

use crate::config::{ConfigError, MockConfig};
use crate::http::MockServer;
use crate::routing::context::{TOKEN_HEADER, TOKEN_TTL_HEADER};

/// Error performing a one-shot fetch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("failed to read response body: {0}")]
    Body(#[from] axum::Error),
}

/// Status and body of the final response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub status: StatusCode,
    pub body: String,
}

impl FetchOutcome {
    /// 0 on 200, 3 when the path does not exist, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        match self.status {
            StatusCode::OK => 0,
            StatusCode::NOT_FOUND => 3,
            _ => 1,
        }
    }
}

async fn call(app: &Router, request: Request<Body>) -> Result<FetchOutcome, FetchError> {
    let response: Response = match app.clone().oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(FetchOutcome {
        status,
        body: String::from_utf8_lossy(&bytes).into_owned(),
    })
}

/// Fetch `path` through the full HTTP stack without binding a socket. With
/// `use_token` a session token is requested first, as an IMDSv2 client does.
pub async fn fetch(
    config: MockConfig,
    path: &str,
    use_token: bool,
) -> Result<FetchOutcome, FetchError> {
    let ttl = config.imds.max_token_ttl_secs;
    let app = MockServer::new(config)?.app();
    let uri = format!("/{}", path.trim_start_matches('/'));

    let mut request = Request::get(uri.as_str());
    if use_token {
        let token_request = Request::put("/latest/api/token")
            .header(TOKEN_TTL_HEADER, ttl.to_string())
            .body(Body::empty())?;
        let token = call(&app, token_request).await?;
        if token.status != StatusCode::OK {
            tracing::warn!(status = token.status.as_u16(), "Token request failed");
            return Ok(token);
        }
        request = request.header(TOKEN_HEADER, token.body);
    }

    let outcome = call(&app, request.body(Body::empty())?).await?;
    tracing::debug!(path = %uri, status = outcome.status.as_u16(), "One-shot fetch complete");
    Ok(outcome)
}
