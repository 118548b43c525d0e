//! Response conversion.

use axum::body::Body;
use axum::response::IntoResponse;

use crate::dispatch::Response;

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let mut response = axum::response::Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
