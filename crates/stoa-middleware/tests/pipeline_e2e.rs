//! End-to-end tests of the standard pipeline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use http::{Method, StatusCode};
use http_body_util::BodyExt;
use proptest::prelude::*;
use stoa_config::StoaConfig;
use stoa_core::{AuthOutcome, Identity, RequestContext, Response, ResponseExt, REQUEST_ID_HEADER};
use stoa_middleware::identity::StaticIdentityProvider;
use stoa_middleware::stages::cors::headers;
use stoa_middleware::Pipeline;
use stoa_router::{require_identity, RouteTable};

const ALLOWED_ORIGIN: &str = "http://54.172.192.158";

struct Harness {
    pipeline: Pipeline,
    handler_calls: Arc<AtomicUsize>,
}

fn harness() -> Harness {
    let handler_calls = Arc::new(AtomicUsize::new(0));

    let mut routes = RouteTable::new();
    let calls = Arc::clone(&handler_calls);
    routes
        .post("/api/items", move |ctx| {
            let calls = Arc::clone(&calls);
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let body = ctx.json_body().cloned().unwrap_or_default();
                Ok(Response::json(StatusCode::CREATED, &body))
            })
        })
        .unwrap()
        .get("/api/me", |ctx| {
            Box::pin(async move {
                let identity = require_identity(ctx)?;
                Ok(Response::json(
                    StatusCode::OK,
                    &serde_json::json!({ "user_id": identity.user_id }),
                ))
            })
        })
        .unwrap();

    let provider = StaticIdentityProvider::new().with_token("valid-token", Identity::new("user_42"));

    Harness {
        pipeline: Pipeline::standard(&StoaConfig::default(), Arc::new(routes), Arc::new(provider)),
        handler_calls,
    }
}

async fn json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let h = harness();
    let mut ctx = RequestContext::builder()
        .method(Method::GET)
        .uri("/health")
        .build();

    let response = h.pipeline.process(&mut ctx).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    assert_eq!(json(response).await, serde_json::json!({ "status": "ok" }));
}

#[tokio::test]
async fn health_ignores_bad_credentials() {
    let h = harness();
    let mut ctx = RequestContext::builder()
        .method(Method::GET)
        .uri("/health")
        .header("authorization", "Bearer forged")
        .header("cookie", "__session=also-forged")
        .build();

    let response = h.pipeline.process(&mut ctx).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(ctx.auth_outcome(), &AuthOutcome::Rejected);
}

#[tokio::test]
async fn unknown_path_returns_not_found_envelope() {
    let h = harness();
    let mut ctx = RequestContext::builder()
        .method(Method::GET)
        .uri("/unknown-path")
        .build();

    let response = h.pipeline.process(&mut ctx).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(ctx.terminal_stage(), Some("error_handler"));

    let request_id = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let body = json(response).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert_eq!(body["error"]["message"], "Route not found: GET /unknown-path");
    assert_eq!(body["error"]["request_id"], request_id);
    assert_eq!(h.handler_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn wrong_method_falls_through_to_not_found() {
    let h = harness();
    let mut ctx = RequestContext::builder()
        .method(Method::DELETE)
        .uri("/api/items")
        .build();

    let response = h.pipeline.process(&mut ctx).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(h.handler_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn valid_json_reaches_handler() {
    let h = harness();
    let mut ctx = RequestContext::builder()
        .method(Method::POST)
        .uri("/api/items")
        .header("content-type", "application/json")
        .body(r#"{"name":"widget","qty":3}"#)
        .build();

    let response = h.pipeline.process(&mut ctx).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(ctx.terminal_stage(), Some("router"));
    assert_eq!(h.handler_calls.load(Ordering::SeqCst), 1);
    assert_eq!(json(response).await["qty"], 3);
}

#[tokio::test]
async fn malformed_json_is_answered_once_by_error_handler() {
    let h = harness();
    let mut ctx = RequestContext::builder()
        .method(Method::POST)
        .uri("/api/items")
        .header("content-type", "application/json")
        .body("{\"name\": ")
        .build();

    let response = h.pipeline.process(&mut ctx).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(ctx.terminal_stage(), Some("error_handler"));
    assert_eq!(h.handler_calls.load(Ordering::SeqCst), 0);
    // Auth runs after the body parser, so it never saw this request.
    assert_eq!(ctx.auth_outcome(), &AuthOutcome::NotAttempted);
    assert_eq!(json(response).await["error"]["code"], "MALFORMED_INPUT");
}

#[tokio::test]
async fn oversized_body_returns_payload_too_large() {
    let h = harness();
    let big = format!("{{\"blob\":\"{}\"}}", "x".repeat(200 * 1024));
    let mut ctx = RequestContext::builder()
        .method(Method::POST)
        .uri("/api/items")
        .header("content-type", "application/json")
        .body(bytes::Bytes::from(big))
        .build();

    let response = h.pipeline.process(&mut ctx).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(h.handler_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_credentials_still_reach_router() {
    let h = harness();
    let mut ctx = RequestContext::builder()
        .method(Method::GET)
        .uri("/api/me")
        .build();

    let response = h.pipeline.process(&mut ctx).await;
    assert_eq!(ctx.auth_outcome(), &AuthOutcome::Missing);
    assert!(ctx.identity().is_none());
    // The handler enforces auth, not the pipeline.
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json(response).await["error"]["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn verified_identity_reaches_handler() {
    let h = harness();
    let mut ctx = RequestContext::builder()
        .method(Method::GET)
        .uri("/api/me")
        .header("authorization", "Bearer valid-token")
        .build();

    let response = h.pipeline.process(&mut ctx).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(ctx.auth_outcome(), &AuthOutcome::Verified);
    assert_eq!(json(response).await["user_id"], "user_42");
}

#[tokio::test]
async fn preflight_from_allowed_origin() {
    let h = harness();
    let mut ctx = RequestContext::builder()
        .method(Method::OPTIONS)
        .uri("/api/items")
        .header(headers::ORIGIN, ALLOWED_ORIGIN)
        .header(headers::REQUEST_METHOD, "POST")
        .header(headers::REQUEST_HEADERS, "content-type")
        .build();

    let response = h.pipeline.process(&mut ctx).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(ctx.terminal_stage(), Some("cors"));
    assert_eq!(
        response.headers().get(headers::ALLOW_ORIGIN).unwrap(),
        ALLOWED_ORIGIN
    );
    assert_eq!(
        response.headers().get(headers::ALLOW_CREDENTIALS).unwrap(),
        "true"
    );
}

#[tokio::test]
async fn preflight_from_unknown_origin_is_rejected_without_cors_headers() {
    let h = harness();
    let mut ctx = RequestContext::builder()
        .method(Method::OPTIONS)
        .uri("/api/items")
        .header(headers::ORIGIN, "https://evil.example")
        .header(headers::REQUEST_METHOD, "POST")
        .build();

    let response = h.pipeline.process(&mut ctx).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(!response.headers().contains_key(headers::ALLOW_ORIGIN));
    assert!(!response.headers().contains_key(headers::ALLOW_CREDENTIALS));
    assert_eq!(json(response).await["error"]["code"], "CORS_REJECTED");
}

#[tokio::test]
async fn error_responses_still_get_cors_headers() {
    let h = harness();
    let mut ctx = RequestContext::builder()
        .method(Method::GET)
        .uri("/unknown-path")
        .header(headers::ORIGIN, ALLOWED_ORIGIN)
        .build();

    let response = h.pipeline.process(&mut ctx).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.headers().get(headers::ALLOW_ORIGIN).unwrap(),
        ALLOWED_ORIGIN
    );
}

#[tokio::test]
async fn body_errors_still_get_cors_headers() {
    let h = harness();
    let mut ctx = RequestContext::builder()
        .method(Method::POST)
        .uri("/api/items")
        .header(headers::ORIGIN, ALLOWED_ORIGIN)
        .header("content-type", "application/json")
        .body("nope")
        .build();

    let response = h.pipeline.process(&mut ctx).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().contains_key(headers::ALLOW_ORIGIN));
}

fn origin_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "https?://[a-z0-9]{1,12}(\\.[a-z]{2,6}){0,2}(:[0-9]{2,5})?",
        // Near misses of the allowed origin.
        Just("http://54.172.192.158:80".to_string()),
        Just("https://54.172.192.158".to_string()),
        Just("http://54.172.192.15".to_string()),
        Just("http://54.172.192.158/".to_string()),
    ]
}

proptest! {
    #[test]
    fn disallowed_origins_never_get_credential_headers(
        origin in origin_strategy(),
        path in prop_oneof![Just("/health"), Just("/api/me"), Just("/unknown-path")],
        preflight in any::<bool>(),
    ) {
        prop_assume!(origin != ALLOWED_ORIGIN);
        let h = harness();

        let mut builder = RequestContext::builder()
            .uri(path)
            .header(headers::ORIGIN, &origin);
        builder = if preflight {
            builder
                .method(Method::OPTIONS)
                .header(headers::REQUEST_METHOD, "GET")
        } else {
            builder.method(Method::GET)
        };
        let mut ctx = builder.build();

        let response = tokio_test::block_on(h.pipeline.process(&mut ctx));
        prop_assert!(!response.headers().contains_key(headers::ALLOW_CREDENTIALS));
        prop_assert!(!response.headers().contains_key(headers::ALLOW_ORIGIN));
        prop_assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }
}
