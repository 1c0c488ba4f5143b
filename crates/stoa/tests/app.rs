//! The application wiring: config file loading and the registered routes.

use std::io::Write;
use std::sync::Arc;

use http::{Method, StatusCode};
use http_body_util::BodyExt;
use stoa::bootstrap;
use stoa::middleware::identity::StaticIdentityProvider;
use stoa::prelude::*;

fn pipeline() -> Pipeline {
    let provider = StaticIdentityProvider::new().with_token(
        "session-token",
        Identity::new("user_2abc")
            .with_email("alice@example.com")
            .with_role("admin"),
    );
    Pipeline::standard(
        &StoaConfig::default(),
        Arc::new(bootstrap::routes().unwrap()),
        Arc::new(provider),
    )
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn current_user_with_session_cookie() {
    let mut ctx = RequestContext::builder()
        .method(Method::GET)
        .uri("/api/me")
        .header("cookie", "theme=dark; __session=session-token")
        .build();

    let response = pipeline().process(&mut ctx).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["user_id"], "user_2abc");
    assert_eq!(body["email"], "alice@example.com");
    assert_eq!(body["roles"], serde_json::json!(["admin"]));
}

#[tokio::test]
async fn current_user_requires_sign_in() {
    let mut ctx = RequestContext::builder()
        .method(Method::GET)
        .uri("/api/me")
        .header("authorization", "Bearer stale-token")
        .build();

    let response = pipeline().process(&mut ctx).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(ctx.auth_outcome(), &AuthOutcome::Rejected);
    assert_eq!(body_json(response).await["error"]["code"], "UNAUTHENTICATED");
}

#[test]
fn explicit_config_file_is_loaded() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
[server]
max_body_bytes = 2048
expose_internal_errors = true

[cors]
allowed_origins = ["https://app.example.com"]
"#
    )
    .unwrap();

    let config = bootstrap::load_config(Some(file.path())).unwrap();
    assert_eq!(config.server.max_body_bytes, 2048);
    assert!(config.server.expose_internal_errors);
}

#[test]
fn missing_explicit_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    assert!(bootstrap::load_config(Some(&missing)).is_err());
}

#[test]
fn unknown_config_keys_are_rejected() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[server]\nportt = 8080").unwrap();
    assert!(bootstrap::load_config(Some(file.path())).is_err());
}
