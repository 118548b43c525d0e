//! Request conversion.
//!
//! # Responsibilities
//! - Buffer the request body within the configured limit
//! - Carry method, path, query and headers into a `RequestContext`
//!
//! # Design Decisions
//! - The path handed to the dispatcher is the raw URI path, no decoding
//! - Oversized bodies (413) and unreadable bodies (400) are rejected before dispatch
//! - The body is streamed and the limit checked per chunk, so the two cases
//!   are told apart without inspecting error types

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use bytes::BytesMut;
use futures_util::StreamExt;
use thiserror::Error;

use crate::dispatch::RequestContext;

/// Header carrying the per-request correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// A request ready for dispatch.
#[derive(Debug)]
pub struct Incoming {
    pub method: Method,
    pub path: String,
    pub context: RequestContext,
}

/// Why a request body was not accepted.
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    Read(#[source] axum::Error),
}

impl BodyError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Read(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message for the `{"error": ..}` payload.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::TooLarge { .. } => "payload too large",
            Self::Read(_) => "invalid request body",
        }
    }
}

/// Read `request` into a dispatch-ready form.
pub async fn read_request(
    request: Request<Body>,
    max_body_bytes: usize,
) -> Result<Incoming, BodyError> {
    let (parts, body) = request.into_parts();

    let declared = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > max_body_bytes) {
        return Err(BodyError::TooLarge {
            limit: max_body_bytes,
        });
    }

    let body = read_body(body, max_body_bytes).await.inspect_err(|e| {
        tracing::warn!(error = %e, limit = max_body_bytes, "Rejecting request body");
    })?;

    let mut context = RequestContext::new()
        .with_headers(parts.headers)
        .with_body(body);
    if let Some(query) = parts.uri.query() {
        context = context.with_query(query);
    }

    Ok(Incoming {
        method: parts.method,
        path: parts.uri.path().to_string(),
        context,
    })
}

async fn read_body(body: Body, limit: usize) -> Result<bytes::Bytes, BodyError> {
    let mut stream = body.into_data_stream();
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(BodyError::Read)?;
        if buf.len() + chunk.len() > limit {
            return Err(BodyError::TooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

/// Correlation id of a request, if the transport assigned one.
pub fn request_id(context: &RequestContext) -> Option<&str> {
    context.header(X_REQUEST_ID)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_request_carries_target() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/users/42?verbose=1")
            .header("x-request-id", "abc")
            .body(Body::from("payload"))
            .unwrap();

        let incoming = read_request(request, 1024).await.unwrap();
        assert_eq!(incoming.method, Method::POST);
        assert_eq!(incoming.path, "/users/42");
        assert_eq!(incoming.context.query(), Some("verbose=1"));
        assert_eq!(&incoming.context.body()[..], b"payload");
        assert_eq!(request_id(&incoming.context), Some("abc"));
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let request = Request::builder()
            .uri("/upload")
            .body(Body::from(vec![0u8; 64]))
            .unwrap();

        let err = read_request(request, 16).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_oversized_stream_without_length_rejected() {
        let chunks = vec![
            Ok::<_, std::io::Error>(bytes::Bytes::from_static(b"0123456789")),
            Ok(bytes::Bytes::from_static(b"0123456789")),
        ];
        let request = Request::builder()
            .uri("/upload")
            .body(Body::from_stream(futures_util::stream::iter(chunks)))
            .unwrap();

        let err = read_request(request, 16).await.unwrap_err();
        assert!(matches!(err, BodyError::TooLarge { limit: 16 }));
    }

    #[tokio::test]
    async fn test_broken_body_is_bad_request() {
        let chunks = vec![
            Ok(bytes::Bytes::from_static(b"part")),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "client went away",
            )),
        ];
        let request = Request::builder()
            .uri("/upload")
            .body(Body::from_stream(futures_util::stream::iter(chunks)))
            .unwrap();

        let err = read_request(request, 1024).await.unwrap_err();
        assert!(matches!(err, BodyError::Read(_)));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "invalid request body");
    }
}
