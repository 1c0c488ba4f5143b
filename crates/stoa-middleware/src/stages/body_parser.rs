//! JSON body parsing stage.
//!
//! Requests declaring a JSON content type (`application/json` or any
//! `*+json` type) with a non-empty body are decoded into the context. In
//! strict mode (the default) only objects and arrays are accepted at the top
//! level.
//!
//! Body read failures recorded by the server surface here:
//!
//! | Raw body                  | Outcome                   |
//! |---------------------------|---------------------------|
//! | over the limit            | `Fail(PayloadTooLarge)`   |
//! | unreadable                | `Fail(MalformedInput)`    |
//! | malformed JSON            | `Fail(MalformedInput)`    |
//! | any other content type    | `Continue`, bytes kept    |

use http::header;
use stoa_core::{RawBody, RequestContext, StoaError};

use crate::stage::{BoxFuture, Stage, StageOutcome};

/// Default body limit in bytes (100 kB).
pub const DEFAULT_LIMIT: usize = 100 * 1024;

/// Decodes JSON request bodies.
#[derive(Debug, Clone)]
pub struct BodyParserStage {
    limit: usize,
    strict: bool,
}

impl Default for BodyParserStage {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT)
    }
}

impl BodyParserStage {
    /// Creates a stage accepting bodies up to `limit` bytes.
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        Self {
            limit,
            strict: true,
        }
    }

    /// Sets strict mode. When off, any JSON value is accepted at the top level.
    #[must_use]
    pub const fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Returns the configured limit.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    fn parse(&self, ctx: &RequestContext) -> Result<Option<serde_json::Value>, StoaError> {
        let bytes = match ctx.raw_body() {
            RawBody::TooLarge { limit } => return Err(StoaError::payload_too_large(*limit)),
            RawBody::Unreadable(reason) => {
                return Err(StoaError::malformed_input(format!(
                    "request body could not be read: {reason}"
                )))
            }
            RawBody::Bytes(bytes) => bytes,
        };

        if bytes.len() > self.limit {
            return Err(StoaError::payload_too_large(self.limit));
        }
        if bytes.is_empty() || !is_json(ctx.header(header::CONTENT_TYPE.as_str())) {
            return Ok(None);
        }

        let value: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| StoaError::malformed_input(format!("invalid JSON body: {e}")))?;

        if self.strict && !(value.is_object() || value.is_array()) {
            return Err(StoaError::malformed_input(
                "JSON body must be an object or an array",
            ));
        }

        Ok(Some(value))
    }
}

/// Returns true for `application/json` and `*+json` media types.
fn is_json(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return false;
    };
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    essence == "application/json"
        || essence
            .split_once('/')
            .is_some_and(|(_, subtype)| subtype.ends_with("+json"))
}

impl Stage for BodyParserStage {
    fn name(&self) -> &'static str {
        "body_parser"
    }

    fn process<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, StageOutcome> {
        Box::pin(async move {
            match self.parse(ctx) {
                Ok(Some(value)) => {
                    ctx.set_json_body(value);
                    StageOutcome::Continue
                }
                Ok(None) => StageOutcome::Continue,
                Err(e) => {
                    tracing::debug!(
                        request_id = %ctx.request_id(),
                        error = %e,
                        "Request body rejected"
                    );
                    StageOutcome::Fail(e)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use stoa_core::ErrorCategory;

    fn make_ctx(content_type: &str, body: impl Into<RawBody>) -> RequestContext {
        RequestContext::builder()
            .method(Method::POST)
            .uri("/api/items")
            .header("content-type", content_type)
            .body(body)
            .build()
    }

    async fn run(stage: &BodyParserStage, ctx: &mut RequestContext) -> StageOutcome {
        stage.process(ctx).await
    }

    fn category(outcome: StageOutcome) -> ErrorCategory {
        match outcome {
            StageOutcome::Fail(e) => e.category(),
            other => panic!("expected Fail, got {other:?}"),
        }
    }

    #[test]
    fn test_is_json() {
        assert!(is_json(Some("application/json")));
        assert!(is_json(Some("Application/JSON; charset=utf-8")));
        assert!(is_json(Some("application/vnd.api+json")));
        assert!(!is_json(Some("text/plain")));
        assert!(!is_json(Some("application/jsonp")));
        assert!(!is_json(None));
    }

    #[tokio::test]
    async fn test_valid_json_populates_context() {
        let stage = BodyParserStage::default();
        let mut ctx = make_ctx("application/json", r#"{"name":"widget"}"#);

        assert!(run(&stage, &mut ctx).await.is_continue());
        assert_eq!(ctx.json_body().unwrap()["name"], "widget");
    }

    #[tokio::test]
    async fn test_malformed_json_fails() {
        let stage = BodyParserStage::default();
        let mut ctx = make_ctx("application/json", "{not json");

        let outcome = run(&stage, &mut ctx).await;
        assert_eq!(category(outcome), ErrorCategory::MalformedInput);
        assert!(ctx.json_body().is_none());
    }

    #[tokio::test]
    async fn test_strict_mode_rejects_primitives() {
        let mut ctx_strict = make_ctx("application/json", "\"just a string\"");
        let outcome = run(&BodyParserStage::default(), &mut ctx_strict).await;
        assert_eq!(category(outcome), ErrorCategory::MalformedInput);

        let mut ctx_lenient = make_ctx("application/json", "42");
        let lenient = BodyParserStage::default().strict(false);
        assert!(run(&lenient, &mut ctx_lenient).await.is_continue());
        assert_eq!(ctx_lenient.json_body().unwrap(), &serde_json::json!(42));
    }

    #[tokio::test]
    async fn test_other_content_types_pass_through() {
        let stage = BodyParserStage::default();
        let mut ctx = make_ctx("text/plain", "{not json");

        assert!(run(&stage, &mut ctx).await.is_continue());
        assert!(ctx.json_body().is_none());
        assert_eq!(ctx.raw_body().bytes().unwrap().as_ref(), b"{not json");
    }

    #[tokio::test]
    async fn test_empty_json_body_is_skipped() {
        let stage = BodyParserStage::default();
        let mut ctx = make_ctx("application/json", "");
        assert!(run(&stage, &mut ctx).await.is_continue());
        assert!(ctx.json_body().is_none());
    }

    #[tokio::test]
    async fn test_oversized_bodies_fail() {
        let stage = BodyParserStage::new(8);
        let mut ctx = make_ctx("application/json", r#"{"too":"long"}"#);
        let outcome = run(&stage, &mut ctx).await;
        assert_eq!(category(outcome), ErrorCategory::PayloadTooLarge);

        let mut ctx = make_ctx("application/json", RawBody::TooLarge { limit: 8 });
        let outcome = run(&stage, &mut ctx).await;
        assert_eq!(category(outcome), ErrorCategory::PayloadTooLarge);
    }

    #[tokio::test]
    async fn test_unreadable_body_fails() {
        let stage = BodyParserStage::default();
        let mut ctx = make_ctx(
            "application/json",
            RawBody::Unreadable("connection reset".to_string()),
        );
        let outcome = run(&stage, &mut ctx).await;
        assert_eq!(category(outcome), ErrorCategory::MalformedInput);
    }
}
