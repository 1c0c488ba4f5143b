//! Liveness endpoint.

use http::{Method, StatusCode};
use stoa_core::{RequestContext, Response, ResponseExt};

use crate::stage::{BoxFuture, Stage, StageOutcome};

/// Default health check path.
pub const DEFAULT_PATH: &str = "/health";

/// Answers `GET`/`HEAD` on the health path with `200 {"status":"ok"}`,
/// whatever the caller's auth state.
#[derive(Debug, Clone)]
pub struct HealthCheckStage {
    path: String,
}

impl Default for HealthCheckStage {
    fn default() -> Self {
        Self::new(DEFAULT_PATH)
    }
}

impl HealthCheckStage {
    /// Creates the stage for `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    fn matches(&self, ctx: &RequestContext) -> bool {
        let method = ctx.method();
        (method == Method::GET || method == Method::HEAD)
            && ctx.path().trim_end_matches('/') == self.path.trim_end_matches('/')
    }
}

impl Stage for HealthCheckStage {
    fn name(&self) -> &'static str {
        "health_check"
    }

    fn process<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, StageOutcome> {
        Box::pin(async move {
            if !self.matches(ctx) {
                return StageOutcome::Continue;
            }
            let mut response =
                Response::json(StatusCode::OK, &serde_json::json!({ "status": "ok" }));
            if ctx.method() == Method::HEAD {
                *response.body_mut() = http_body_util::Full::default();
            }
            StageOutcome::Respond(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use stoa_core::Identity;

    async fn respond(method: Method, uri: &str) -> Option<Response> {
        let mut ctx = RequestContext::builder().method(method).uri(uri).build();
        match HealthCheckStage::default().process(&mut ctx).await {
            StageOutcome::Respond(response) => Some(response),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_get_health() {
        let response = respond(Method::GET, "/health").await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_head_health_has_no_body() {
        let response = respond(Method::HEAD, "/health").await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_trailing_slash_and_query() {
        assert!(respond(Method::GET, "/health/").await.is_some());
        assert!(respond(Method::GET, "/health?check=1").await.is_some());
    }

    #[tokio::test]
    async fn test_other_requests_continue() {
        assert!(respond(Method::POST, "/health").await.is_none());
        assert!(respond(Method::GET, "/healthz").await.is_none());
        assert!(respond(Method::GET, "/api/health").await.is_none());
    }

    #[tokio::test]
    async fn test_ignores_auth_state() {
        let mut ctx = RequestContext::builder()
            .method(Method::GET)
            .uri("/health")
            .header("authorization", "Bearer garbage")
            .build();
        ctx.attach_identity(Identity::new("user_1")).unwrap();

        let outcome = HealthCheckStage::default().process(&mut ctx).await;
        assert!(matches!(outcome, StageOutcome::Respond(_)));
    }
}
