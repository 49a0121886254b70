//! Request dispatch for the metadata tree.
//!
//! # Responsibilities
//! - Serve the session token endpoint
//! - Authenticate requests against the token store
//! - Resolve catalog entries and per-path overrides
//! - Apply latency and fault injection, then compute the value
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Rebuilt wholesale on reload; the token store is carried over
//! - Explicit RouteError rather than silent defaults

use std::sync::Arc;
use std::time::Instant;

use axum::http::{Method, StatusCode};
use chrono::Utc;

use crate::catalog::{Catalog, CatalogError, ContentType, Lookup, Value, ValueContext};
use crate::config::{LatencyRange, MockConfig, PathOverride};
use crate::observability::metrics;
use crate::resilience::{FaultRoll, LatencyInjector};
use crate::routing::context::{RequestContext, TOKEN_HEADER, TOKEN_PATH, TOKEN_TTL_HEADER};
use crate::routing::error::RouteError;
use crate::routing::overrides::OverrideTable;
use crate::token::{parse_ttl, TokenManager, Validation};

/// A successful response, independent of the HTTP framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockResponse {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: String,
    pub headers: Vec<(&'static str, String)>,
}

impl MockResponse {
    pub fn ok(content_type: ContentType, body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: content_type.mime(),
            body: body.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Routes requests for one configuration generation.
#[derive(Debug)]
pub struct MetadataRouter {
    catalog: Catalog,
    config: Arc<MockConfig>,
    overrides: OverrideTable,
    tokens: TokenManager,
    started_at: Instant,
}

impl MetadataRouter {
    /// Build a router. `started_at` anchors delayed notices (spot,
    /// rebalance) and must be kept across reloads.
    pub fn new(
        config: MockConfig,
        tokens: TokenManager,
        started_at: Instant,
    ) -> Result<Self, CatalogError> {
        let catalog = Catalog::from_config(&config)?;
        let overrides = OverrideTable::new(config.overrides.clone());

        tracing::debug!(
            endpoints = catalog.len(),
            overrides = overrides.len(),
            v2_required = config.imds.v2_required,
            "Router built"
        );

        Ok(Self {
            catalog,
            config: Arc::new(config),
            overrides,
            tokens,
            started_at,
        })
    }

    pub fn config(&self) -> &MockConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Handle one request.
    pub async fn handle(&self, mut ctx: RequestContext) -> Result<MockResponse, RouteError> {
        if ctx.path == TOKEN_PATH {
            return self.handle_token(&ctx).await;
        }

        if ctx.method != Method::GET && ctx.method != Method::HEAD {
            return Err(RouteError::MethodNotAllowed);
        }

        let lookup = self.catalog.lookup(&ctx.path);
        let gated = lookup.spec().is_some_and(|spec| spec.requires_token());
        self.authenticate(&mut ctx, gated)?;

        if !lookup.is_found() {
            return Err(RouteError::NotFound);
        }

        let replacement = match self.overrides.resolve(&ctx.path) {
            Some((key, ov)) => self.inject(key, ov).await?,
            None => {
                LatencyInjector::new(self.config.latency).apply().await;
                None
            }
        };

        match lookup {
            Lookup::Leaf { spec, remainder } => {
                if let Some(value) = replacement {
                    return Ok(MockResponse::ok(spec.content_type, value));
                }

                let value_ctx = ValueContext {
                    request: &ctx,
                    config: &self.config,
                    remainder: &remainder,
                    started_at: self.started_at,
                    now: Utc::now(),
                };
                let value = spec.provider.provide(&value_ctx).ok_or(RouteError::NotFound)?;
                let leaf = spec.path.rsplit('/').next().unwrap_or("value");
                let element = leaf.split('.').next().unwrap_or(leaf);
                Ok(MockResponse::ok(
                    spec.content_type,
                    value.render(spec.content_type, element),
                ))
            }
            Lookup::Directory(children) => {
                let body = replacement
                    .unwrap_or_else(|| Value::Lines(children).render(ContentType::Text, "list"));
                Ok(MockResponse::ok(ContentType::Text, body))
            }
            Lookup::NotFound => Err(RouteError::NotFound),
        }
    }

    async fn handle_token(&self, ctx: &RequestContext) -> Result<MockResponse, RouteError> {
        if ctx.method != Method::PUT {
            return Err(RouteError::MethodNotAllowed);
        }

        if ctx.header("x-forwarded-for").is_some() {
            tracing::warn!(request_id = %ctx.request_id, "Token request carried X-Forwarded-For");
            return Err(RouteError::Forbidden);
        }

        let ttl = parse_ttl(
            ctx.header(TOKEN_TTL_HEADER),
            self.config.imds.max_token_ttl_secs,
        )
        .map_err(|e| {
            tracing::info!(request_id = %ctx.request_id, error = %e, "Token request rejected");
            RouteError::BadRequest(e.to_string())
        })?;

        match self.overrides.resolve(TOKEN_PATH) {
            Some((key, ov)) => {
                self.inject(key, ov).await?;
            }
            None => {
                LatencyInjector::new(self.config.latency).apply().await;
            }
        }

        let token = self.tokens.issue(ttl, self.config.imds.hop_limit);
        tracing::debug!(
            request_id = %ctx.request_id,
            ttl_secs = ttl,
            active = self.tokens.active(),
            "Session token issued"
        );

        Ok(MockResponse::ok(ContentType::Text, token.id.clone())
            .with_header(TOKEN_HEADER, token.id)
            .with_header(TOKEN_TTL_HEADER, ttl.to_string()))
    }

    /// Validate a supplied token; require one when `gated` or when IMDSv2 is
    /// enforced globally.
    fn authenticate(&self, ctx: &mut RequestContext, gated: bool) -> Result<(), RouteError> {
        let validation = ctx.supplied_token().map(|id| match id {
            Some(id) => self.tokens.validate(id),
            None => Validation::Unknown,
        });

        let reason = match validation {
            Some(Validation::Valid(token)) if token.hop_limit > 0 => {
                ctx.token = Some(token);
                return Ok(());
            }
            Some(Validation::Valid(_)) => "hop limit exhausted",
            Some(other) => other.reason(),
            None if gated || self.config.imds.v2_required => "missing",
            None => return Ok(()),
        };

        metrics::record_token_rejected(reason);
        tracing::info!(
            request_id = %ctx.request_id,
            path = %ctx.path,
            reason,
            "Request rejected: session token required"
        );
        Err(RouteError::Unauthorized(reason))
    }

    /// Apply an override: disablement, latency, forced status. Returns the
    /// replacement value, if any.
    async fn inject(&self, key: &str, ov: &PathOverride) -> Result<Option<String>, RouteError> {
        if !ov.enabled {
            return Err(RouteError::NotFound);
        }

        let range: LatencyRange = ov.latency.unwrap_or(self.config.latency);
        let delay = LatencyInjector::new(range).apply().await;
        if !delay.is_zero() {
            tracing::trace!(path = key, delay_ms = delay.as_millis() as u64, "Latency injected");
        }

        if let Some(code) = ov.status {
            if FaultRoll::new(ov.probability).fires() {
                // Validated to 100..=599 at load time.
                let status =
                    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                metrics::record_fault_injected(key, status.as_u16());
                tracing::debug!(path = key, status = status.as_u16(), "Fault injected");
                return Err(RouteError::Forced {
                    status,
                    body: ov.body.clone(),
                });
            }
        }

        Ok(ov.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};
    use std::time::Duration;

    fn router(config: MockConfig) -> MetadataRouter {
        MetadataRouter::new(config, TokenManager::in_memory(), Instant::now()).unwrap()
    }

    fn get(path: &str) -> RequestContext {
        RequestContext::new(Method::GET, path, HeaderMap::new())
    }

    fn with_token(path: &str, token: &str) -> RequestContext {
        let mut headers = HeaderMap::new();
        headers.insert(TOKEN_HEADER, token.parse().unwrap());
        RequestContext::new(Method::GET, path, headers)
    }

    fn put_token(ttl: Option<&str>) -> RequestContext {
        let mut headers = HeaderMap::new();
        if let Some(ttl) = ttl {
            headers.insert(TOKEN_TTL_HEADER, ttl.parse().unwrap());
        }
        RequestContext::new(Method::PUT, "/latest/api/token", headers)
    }

    #[tokio::test]
    async fn test_v1_leaf() {
        let r = router(MockConfig::default());
        let resp = r.handle(get("/latest/meta-data/instance-id")).await.unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body, "i-1234567890abcdef0");
        assert_eq!(resp.content_type, "text/plain");
    }

    #[tokio::test]
    async fn test_dated_version_aliases_latest() {
        let r = router(MockConfig::default());
        let resp = r.handle(get("/2021-07-15/meta-data/instance-id")).await.unwrap();
        assert_eq!(resp.body, "i-1234567890abcdef0");
    }

    #[tokio::test]
    async fn test_directory_listing() {
        let r = router(MockConfig::default());
        let resp = r.handle(get("/latest/meta-data/placement/")).await.unwrap();
        assert_eq!(resp.body, "availability-zone\navailability-zone-id\nregion");
    }

    #[tokio::test]
    async fn test_token_flow() {
        let r = router(MockConfig::default());
        let resp = r.handle(put_token(Some("60"))).await.unwrap();
        assert_eq!(resp.header(TOKEN_TTL_HEADER), Some("60"));
        assert_eq!(resp.header(TOKEN_HEADER), Some(resp.body.as_str()));

        let role = &r.config().metadata.iam.role_name;
        let path = format!("/latest/meta-data/iam/security-credentials/{role}");
        assert_eq!(r.handle(get(&path)).await, Err(RouteError::Unauthorized("missing")));

        let ok = r.handle(with_token(&path, &resp.body)).await.unwrap();
        assert_eq!(ok.content_type, "application/json");
        assert!(ok.body.contains("\"Code\": \"Success\""));
    }

    #[tokio::test]
    async fn test_invalid_token_rejected_on_v1_path() {
        let r = router(MockConfig::default());
        assert_eq!(
            r.handle(with_token("/latest/meta-data/ami-id", "bogus")).await,
            Err(RouteError::Unauthorized("unknown"))
        );
    }

    #[tokio::test]
    async fn test_undecodable_token_rejected_on_v1_path() {
        let r = router(MockConfig::default());
        let mut headers = HeaderMap::new();
        headers.insert(
            TOKEN_HEADER,
            HeaderValue::from_bytes(b"\xffbogus").unwrap(),
        );
        let ctx = RequestContext::new(Method::GET, "/latest/meta-data/ami-id", headers);
        assert_eq!(r.handle(ctx).await, Err(RouteError::Unauthorized("unknown")));

        // A blank header is the same as no header.
        assert_eq!(
            r.handle(with_token("/latest/meta-data/ami-id", " ")).await.unwrap().status,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn test_empty_security_groups_are_missing() {
        let mut config = MockConfig::default();
        config.metadata.security_groups.clear();
        config.metadata.security_group_ids.clear();
        let r = router(config);

        let mac = &r.config().metadata.mac;
        for path in [
            "/latest/meta-data/security-groups".to_string(),
            format!("/latest/meta-data/network/interfaces/macs/{mac}/security-groups"),
            format!("/latest/meta-data/network/interfaces/macs/{mac}/security-group-ids"),
        ] {
            assert_eq!(r.handle(get(&path)).await, Err(RouteError::NotFound), "{path}");
        }
    }

    #[tokio::test]
    async fn test_legacy_xml_document() {
        let r = router(MockConfig::default());
        let resp = r
            .handle(get("/latest/dynamic/instance-identity/document.xml"))
            .await
            .unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.content_type, "text/xml");
        assert!(resp.body.starts_with("<?xml"));
        assert!(resp.body.contains("<document>"));
        assert!(resp.body.contains("<instanceId>i-1234567890abcdef0</instanceId>"));
        assert!(resp.body.contains("<kernelId/>"));
    }

    #[tokio::test]
    async fn test_expired_token() {
        let r = router(MockConfig::default());
        let token = r
            .tokens()
            .issue_at(1, 1, Instant::now() - Duration::from_secs(5));
        assert_eq!(
            r.handle(with_token("/latest/meta-data/ami-id", &token.id)).await,
            Err(RouteError::Unauthorized("expired"))
        );
    }

    #[tokio::test]
    async fn test_v2_required_globally() {
        let mut config = MockConfig::default();
        config.imds.v2_required = true;
        let r = router(config);
        assert_eq!(
            r.handle(get("/latest/meta-data/ami-id")).await,
            Err(RouteError::Unauthorized("missing"))
        );
        // Authentication happens before the 404.
        assert_eq!(
            r.handle(get("/latest/meta-data/nope")).await,
            Err(RouteError::Unauthorized("missing"))
        );
    }

    #[tokio::test]
    async fn test_token_request_errors() {
        let r = router(MockConfig::default());
        assert!(matches!(r.handle(put_token(None)).await, Err(RouteError::BadRequest(_))));
        assert!(matches!(r.handle(put_token(Some("0"))).await, Err(RouteError::BadRequest(_))));
        assert!(matches!(
            r.handle(put_token(Some("21601"))).await,
            Err(RouteError::BadRequest(_))
        ));
        assert!(matches!(r.handle(put_token(Some("abc"))).await, Err(RouteError::BadRequest(_))));

        let mut forwarded = put_token(Some("60"));
        forwarded
            .headers
            .insert("x-forwarded-for", "10.0.0.1".parse().unwrap());
        assert_eq!(r.handle(forwarded).await, Err(RouteError::Forbidden));

        assert_eq!(
            r.handle(get("/latest/api/token")).await,
            Err(RouteError::MethodNotAllowed)
        );
    }

    #[tokio::test]
    async fn test_non_get_on_metadata_path() {
        let r = router(MockConfig::default());
        let ctx = RequestContext::new(Method::POST, "/latest/meta-data/ami-id", HeaderMap::new());
        assert_eq!(r.handle(ctx).await, Err(RouteError::MethodNotAllowed));
    }

    #[tokio::test]
    async fn test_overrides() {
        let mut config = MockConfig::default();
        config.overrides.insert(
            "latest/meta-data/ami-id".into(),
            PathOverride {
                status: Some(503),
                ..Default::default()
            },
        );
        config.overrides.insert(
            "latest/meta-data/placement".into(),
            PathOverride {
                enabled: false,
                ..Default::default()
            },
        );
        config.overrides.insert(
            "latest/meta-data/hostname".into(),
            PathOverride {
                value: Some("override.internal".into()),
                ..Default::default()
            },
        );
        let r = router(config);

        assert_eq!(
            r.handle(get("/latest/meta-data/ami-id")).await,
            Err(RouteError::Forced {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: None
            })
        );
        assert_eq!(
            r.handle(get("/latest/meta-data/placement/region")).await,
            Err(RouteError::NotFound)
        );
        assert_eq!(
            r.handle(get("/latest/meta-data/hostname")).await.unwrap().body,
            "override.internal"
        );
        assert!(r.handle(get("/latest/meta-data/instance-id")).await.is_ok());
    }

    #[tokio::test]
    async fn test_tag_prefix_lookup() {
        let r = router(MockConfig::default());
        let token = r.tokens().issue(60, 1);

        let keys = r
            .handle(with_token("/latest/meta-data/tags/instance", &token.id))
            .await
            .unwrap();
        assert!(keys.body.lines().any(|l| l == "Name"));

        let name = r
            .handle(with_token("/latest/meta-data/tags/instance/Name", &token.id))
            .await
            .unwrap();
        assert_eq!(&name.body, &r.config().metadata.tags["Name"]);

        assert_eq!(
            r.handle(with_token("/latest/meta-data/tags/instance/Missing", &token.id))
                .await,
            Err(RouteError::NotFound)
        );
    }
}
