//! Per-request state threaded through the middleware chain.

use axum::http::{header, Extensions, HeaderMap, HeaderValue, Method, StatusCode};
use bytes::Bytes;
use serde::Serialize;

use crate::dispatch::error::DispatchError;
use crate::dispatch::handler::Reply;
use crate::routing::RouteParams;

/// Inbound side of a dispatch.
///
/// `extensions` is the typed attribute map middleware use to hand values
/// (an authenticated identity, a request id) to everything downstream.
#[derive(Debug, Default)]
pub struct RequestContext {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
    params: RouteParams,
    extensions: Extensions,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub(crate) fn set_target(&mut self, method: Method, path: &str) {
        self.method = method;
        self.path = path.to_string();
    }

    pub(crate) fn set_params(&mut self, params: RouteParams) {
        self.params = params;
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as a string, if present and valid ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Parameters captured by the matched route.
    pub fn params(&self) -> &RouteParams {
        &self.params
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}

/// Outbound side of a dispatch, mutated in place by middleware and handler.
#[derive(Debug)]
pub struct ResponseContext {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    route: Option<String>,
    failure: Option<DispatchError>,
}

impl Default for ResponseContext {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            route: None,
            failure: None,
        }
    }
}

impl ResponseContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// Set a plain-text body.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        self.body = Bytes::from(text.into());
    }

    /// Serialize `value` as the JSON body.
    pub fn set_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        let bytes = serde_json::to_vec(value)?;
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.body = Bytes::from(bytes);
        Ok(())
    }

    /// Pattern of the route that served this response, once matched.
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    pub(crate) fn set_route(&mut self, pattern: &str) {
        self.route = Some(pattern.to_string());
    }

    /// The first failure contained while producing this response.
    ///
    /// Kept for diagnostics only; it never reaches the response body.
    pub fn failure(&self) -> Option<&DispatchError> {
        self.failure.as_ref()
    }

    pub(crate) fn record_failure(&mut self, failure: DispatchError) {
        if self.failure.is_none() {
            self.failure = Some(failure);
        }
    }

    /// Write an error payload as `{"error": message}`.
    pub fn set_error(&mut self, status: StatusCode, message: &str) {
        self.status = status;
        let payload = serde_json::json!({ "error": message });
        // Serializing a `Value` built from a `&str` cannot fail.
        if self.set_json(&payload).is_err() {
            self.set_text(message);
        }
    }

    /// Apply a handler outcome.
    pub(crate) fn apply(&mut self, reply: Reply) -> Result<(), serde_json::Error> {
        match reply {
            Reply::Written => {}
            Reply::Status(status) => {
                self.status = status;
                self.headers.remove(header::CONTENT_TYPE);
                self.body = Bytes::new();
            }
            Reply::Text(text) => self.set_text(text),
            Reply::Json(value) => self.set_json(&value)?,
            Reply::Error { status, message } => self.set_error(status, &message),
        }
        Ok(())
    }

    /// Finalize into the transport-facing triple.
    pub fn into_response(self) -> Response {
        Response {
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
    }
}

/// Finalized response handed back to the transport.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
