//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router whose fallback feeds every request to the dispatcher
//! - Wire up tower-http layers (request ID, tracing, timeout)
//! - Bind to a listener and drain in-flight requests on shutdown
//!
//! # Design Decisions
//! - Dispatch is synchronous and runs on the blocking pool
//! - Axum does no routing of its own; the route table is authoritative

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::dispatch::{Dispatcher, ResponseContext};
use crate::http::request::read_request;
use crate::lifecycle::ShutdownSignal;

/// Application state injected into the fallback handler.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub max_body_bytes: usize,
}

/// HTTP front end for a [`Dispatcher`].
pub struct HttpServer {
    router: Router,
    config: AppConfig,
}

impl HttpServer {
    pub fn new(config: AppConfig, dispatcher: Arc<Dispatcher>) -> Self {
        let state = AppState {
            dispatcher,
            max_body_bytes: config.limits.max_body_bytes,
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        Router::new()
            .fallback(dispatch_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.timeouts.request_secs,
                    )))
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// The configured router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires, then drain for up to
    /// `timeouts.shutdown_secs`.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let grace = Duration::from_secs(self.config.timeouts.shutdown_secs);
        let serve = axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown.clone().recv())
            .into_future();

        let deadline = async {
            shutdown.recv().await;
            tokio::time::sleep(grace).await;
        };

        tokio::select! {
            result = serve => result?,
            _ = deadline => {
                tracing::warn!(grace_secs = grace.as_secs(), "Shutdown grace period elapsed");
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

/// Hand the request to the dispatcher on the blocking pool.
async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let incoming = match read_request(request, state.max_body_bytes).await {
        Ok(incoming) => incoming,
        Err(err) => return rejection(err.status(), err.public_message()),
    };

    let dispatcher = state.dispatcher.clone();
    let joined = tokio::task::spawn_blocking(move || {
        dispatcher
            .dispatch(
                &incoming.method,
                &incoming.path,
                incoming.context,
                ResponseContext::new(),
            )
            .into_response()
    })
    .await;

    match joined {
        Ok(response) => response.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Dispatch task failed");
            rejection(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
        }
    }
}

fn rejection(status: StatusCode, message: &str) -> Response {
    let mut res = ResponseContext::new();
    res.set_error(status, message);
    res.into_response().into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Container;
    use crate::dispatch::{HandlerRef, Reply};
    use tower::ServiceExt;

    fn server() -> HttpServer {
        let mut builder = Dispatcher::builder(Arc::new(Container::builder().build()));
        builder
            .post(
                "/echo/{name}",
                HandlerRef::from_fn(|req, _res, params| {
                    let name = params.get("name").unwrap_or_default();
                    let body = String::from_utf8_lossy(req.body());
                    Ok(Reply::text(format!("{name}:{body}")))
                }),
            )
            .unwrap();

        let mut config = AppConfig::default();
        config.limits.max_body_bytes = 32;
        HttpServer::new(config, Arc::new(builder.build()))
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_request_reaches_dispatcher() {
        let response = server()
            .router()
            .oneshot(
                Request::post("/echo/bob")
                    .body(Body::from("hi"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(body_string(response).await, "bob:hi");
    }

    #[tokio::test]
    async fn test_unmatched_route_is_json_404() {
        let response = server()
            .router()
            .oneshot(Request::get("/nowhere").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(response).await, r#"{"error":"not found"}"#);
    }

    #[tokio::test]
    async fn test_body_limit() {
        let response = server()
            .router()
            .oneshot(
                Request::post("/echo/bob")
                    .body(Body::from(vec![b'x'; 64]))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_incoming_request_id_is_kept() {
        let response = server()
            .router()
            .oneshot(
                Request::post("/echo/bob")
                    .header("x-request-id", "req-7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()["x-request-id"], "req-7");
    }
}
