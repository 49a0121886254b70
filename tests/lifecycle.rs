//! Server lifecycle: binding, serving, draining and one-shot mode.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use ec2_metadata_mock::catalog::{Catalog, ContentType, Matching, SchemaVersion};
use ec2_metadata_mock::config::{LatencyRange, MockConfig, PathOverride, ServerConfig};
use ec2_metadata_mock::http::MockServer;
use ec2_metadata_mock::lifecycle::{self, StartupError};
use tower::ServiceExt;

mod common;

fn slow(ms: u64) -> PathOverride {
    PathOverride {
        latency: Some(LatencyRange::fixed(ms)),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_default_config_on_port_1338() {
    let addr: SocketAddr = "127.0.0.1:1338".parse().unwrap();
    let server = common::start_server(addr, MockConfig::default()).await;
    let client = common::client();

    let res = client
        .get(format!("http://{addr}/latest/meta-data/instance-id"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "i-1234567890abcdef0");

    server.shutdown.trigger("test");
    tokio::time::timeout(Duration::from_secs(5), server.handle)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_bind_conflict_is_startup_error() {
    let addr: SocketAddr = "127.0.0.1:28241".parse().unwrap();
    let _held = tokio::net::TcpListener::bind(addr).await.unwrap();

    let config = ServerConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        ..Default::default()
    };
    match lifecycle::bind(&config).await {
        Err(StartupError::Bind { addr: failed, .. }) => assert_eq!(failed, "127.0.0.1:28241"),
        other => panic!("expected bind error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_in_flight_request_finishes_within_grace() {
    let addr: SocketAddr = "127.0.0.1:28242".parse().unwrap();
    let mut config = MockConfig::default();
    config.server.grace_period_secs = 5;
    config
        .overrides
        .insert("latest/meta-data/hostname".into(), slow(300));
    let server = common::start_server(addr, config).await;

    let client = common::client();
    let url = server.url("latest/meta-data/hostname");
    let request = tokio::spawn(async move { client.get(url).send().await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    server.shutdown.trigger("test");

    let res = request.await.unwrap().expect("in-flight request was dropped");
    assert_eq!(res.status(), 200);

    tokio::time::timeout(Duration::from_secs(5), server.handle)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_grace_period_bounds_shutdown() {
    let addr: SocketAddr = "127.0.0.1:28243".parse().unwrap();
    let mut config = MockConfig::default();
    config.server.grace_period_secs = 1;
    config
        .overrides
        .insert("latest/meta-data/hostname".into(), slow(10_000));
    let server = common::start_server(addr, config).await;

    let client = common::client();
    let url = server.url("latest/meta-data/hostname");
    tokio::spawn(async move {
        let _ = client.get(url).send().await;
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    let start = Instant::now();
    server.shutdown.trigger("test");

    tokio::time::timeout(Duration::from_secs(4), server.handle)
        .await
        .expect("shutdown waited past the grace period")
        .unwrap()
        .unwrap();
    assert!(start.elapsed() >= Duration::from_millis(900));
}

#[tokio::test]
async fn test_fetch_one_shot() {
    let mut config = MockConfig::default();
    config.metadata.user_data = "#!/bin/sh\necho hi".into();

    let outcome = lifecycle::fetch(config.clone(), "/latest/user-data", true)
        .await
        .unwrap();
    assert_eq!(outcome.status, StatusCode::OK);
    assert_eq!(outcome.body, "#!/bin/sh\necho hi");

    config.metadata.user_data.clear();
    let outcome = lifecycle::fetch(config, "latest/user-data", true).await.unwrap();
    assert_eq!(outcome.exit_code(), 3);
}

#[tokio::test]
async fn test_every_v1_leaf_returns_content() {
    let config = MockConfig::default();
    let catalog = Catalog::from_config(&config).unwrap();
    let app = MockServer::new(config).unwrap().app();

    let leaves: Vec<_> = catalog
        .iter()
        .filter(|spec| spec.schema == SchemaVersion::V1 && spec.matching == Matching::Exact)
        .collect();
    assert!(leaves.len() > 40);
    assert!(leaves.iter().any(|spec| spec.content_type == ContentType::Xml));

    for spec in leaves {
        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/{}", spec.path))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{}", spec.path);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            spec.content_type.mime(),
            "{}",
            spec.path
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(!body.is_empty(), "{} returned an empty body", spec.path);
        match spec.content_type {
            ContentType::Json => {
                serde_json::from_slice::<serde_json::Value>(&body).unwrap();
            }
            ContentType::Xml => assert!(body.starts_with(b"<?xml"), "{}", spec.path),
            ContentType::Text => {}
        }
    }
}
