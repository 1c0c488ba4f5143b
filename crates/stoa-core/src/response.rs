//! Response type produced by stages and handlers.

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use http_body_util::Full;
use serde::Serialize;

/// The HTTP response type used throughout the pipeline.
///
/// This is a standard `http::Response` with a `Full<Bytes>` body.
pub type Response = http::Response<Full<Bytes>>;

/// Header carrying the request id on every response.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const JSON_CONTENT_TYPE: &str = "application/json";

/// Extension trait for building responses.
pub trait ResponseExt {
    /// Creates a JSON response from a serializable value.
    ///
    /// Falls back to an empty 500 if the value cannot be serialized.
    fn json<T: Serialize>(status: StatusCode, value: &T) -> Response;

    /// Creates a response with no body.
    fn empty(status: StatusCode) -> Response;

    /// Creates a plain text response.
    fn text(status: StatusCode, body: impl Into<String>) -> Response;
}

impl ResponseExt for Response {
    fn json<T: Serialize>(status: StatusCode, value: &T) -> Response {
        let Ok(body) = serde_json::to_vec(value) else {
            return Self::empty(StatusCode::INTERNAL_SERVER_ERROR);
        };
        let mut response = with_status(Bytes::from(body), status);
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        response
    }

    fn empty(status: StatusCode) -> Response {
        with_status(Bytes::new(), status)
    }

    fn text(status: StatusCode, body: impl Into<String>) -> Response {
        let mut response = with_status(Bytes::from(body.into()), status);
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}

fn with_status(body: Bytes, status: StatusCode) -> Response {
    let mut response = http::Response::new(Full::new(body));
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_of(response: Response) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_json_response() {
        let response = Response::json(StatusCode::OK, &serde_json::json!({ "status": "ok" }));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            JSON_CONTENT_TYPE
        );
        assert_eq!(body_of(response).await, Bytes::from_static(br#"{"status":"ok"}"#));
    }

    #[tokio::test]
    async fn test_empty_response() {
        let response = Response::empty(StatusCode::NO_CONTENT);
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.headers().get(CONTENT_TYPE).is_none());
        assert!(body_of(response).await.is_empty());
    }

    #[test]
    fn test_text_response() {
        let response = Response::text(StatusCode::OK, "hello");
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }
}
