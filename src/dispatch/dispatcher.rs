//! Request dispatch.
//!
//! # Responsibilities
//! - Match the route for a method and path
//! - Resolve the handler and middleware through the container
//! - Compose and run the chain
//! - Contain every failure as a 404 or 500 response
//!
//! # Design Decisions
//! - The dispatcher is the only place error responses originate
//! - Process-wide middleware wrap route middleware
//! - No route, no middleware: a 404 is produced before anything runs

use std::sync::Arc;
use std::time::Instant;

use axum::http::{Method, StatusCode};

use crate::container::{Container, ResolutionError};
use crate::dispatch::boundary;
use crate::dispatch::context::{RequestContext, Response, ResponseContext};
use crate::dispatch::error::{DispatchError, HandlerError};
use crate::dispatch::handler::{Handler, HandlerRef};
use crate::middleware::{Middleware, MiddlewareChain, MiddlewareRef};
use crate::observability::metrics;
use crate::routing::{PatternError, Route, RouteTable};

/// Collects routes and process-wide middleware before dispatch begins.
pub struct DispatcherBuilder {
    container: Arc<Container>,
    routes: RouteTable,
    middleware: Vec<MiddlewareRef>,
}

impl DispatcherBuilder {
    /// Add middleware that wraps every route, outermost first.
    pub fn middleware(&mut self, middleware: MiddlewareRef) -> &mut Self {
        self.middleware.push(middleware);
        self
    }

    /// Register a route with its own middleware.
    pub fn route(
        &mut self,
        method: Method,
        pattern: &str,
        handler: HandlerRef,
        middleware: Vec<MiddlewareRef>,
    ) -> Result<&mut Self, PatternError> {
        self.routes.register(method, pattern, handler, middleware)?;
        Ok(self)
    }

    pub fn get(&mut self, pattern: &str, handler: HandlerRef) -> Result<&mut Self, PatternError> {
        self.route(Method::GET, pattern, handler, Vec::new())
    }

    pub fn post(&mut self, pattern: &str, handler: HandlerRef) -> Result<&mut Self, PatternError> {
        self.route(Method::POST, pattern, handler, Vec::new())
    }

    pub fn put(&mut self, pattern: &str, handler: HandlerRef) -> Result<&mut Self, PatternError> {
        self.route(Method::PUT, pattern, handler, Vec::new())
    }

    pub fn patch(&mut self, pattern: &str, handler: HandlerRef) -> Result<&mut Self, PatternError> {
        self.route(Method::PATCH, pattern, handler, Vec::new())
    }

    pub fn delete(&mut self, pattern: &str, handler: HandlerRef) -> Result<&mut Self, PatternError> {
        self.route(Method::DELETE, pattern, handler, Vec::new())
    }

    /// Freeze the route table.
    pub fn build(self) -> Dispatcher {
        tracing::info!(
            routes = self.routes.len(),
            global_middleware = self.middleware.len(),
            "Dispatcher ready"
        );
        Dispatcher {
            container: self.container,
            routes: self.routes,
            middleware: self.middleware,
        }
    }
}

/// Immutable dispatch core shared by all requests.
pub struct Dispatcher {
    container: Arc<Container>,
    routes: RouteTable,
    middleware: Vec<MiddlewareRef>,
}

impl Dispatcher {
    pub fn builder(container: Arc<Container>) -> DispatcherBuilder {
        DispatcherBuilder {
            container,
            routes: RouteTable::new(),
            middleware: Vec::new(),
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// Dispatch with fresh contexts.
    pub fn handle(&self, method: &Method, path: &str) -> Response {
        self.dispatch(method, path, RequestContext::new(), ResponseContext::new())
            .into_response()
    }

    /// Run the full match → resolve → chain → execute cycle.
    pub fn dispatch(
        &self,
        method: &Method,
        path: &str,
        mut req: RequestContext,
        mut res: ResponseContext,
    ) -> ResponseContext {
        let start = Instant::now();
        req.set_target(method.clone(), path);

        let Some(found) = self.routes.find(method, path) else {
            tracing::warn!(method = %method, path = %path, "No route matched");
            res.set_error(StatusCode::NOT_FOUND, "not found");
            res.record_failure(DispatchError::RouteNotFound {
                method: method.clone(),
                path: path.to_string(),
            });
            metrics::record_dispatch(method.as_str(), res.status().as_u16(), "none", start);
            return res;
        };

        let route = found.route;
        res.set_route(route.pattern().as_str());
        req.set_params(found.params.clone());

        match self.resolve_stack(route) {
            Ok((handler, middleware)) => {
                let params = found.params;
                let chain = MiddlewareChain::build(&middleware, move |req, res| {
                    let reply = handler.handle(req, res, &params)?;
                    res.apply(reply).map_err(HandlerError::from)
                });
                boundary::contain(&mut req, &mut res, |req, res| chain.run(req, res));
            }
            Err(failure) => boundary::fail(&mut res, failure),
        }

        metrics::record_dispatch(
            method.as_str(),
            res.status().as_u16(),
            route.pattern().as_str(),
            start,
        );
        res
    }

    /// Resolve the handler plus global and route middleware, in chain order.
    fn resolve_stack(
        &self,
        route: &Route,
    ) -> Result<(Arc<dyn Handler>, Vec<Arc<dyn Middleware>>), DispatchError> {
        let resolution_failed = |target: &str, source| DispatchError::Resolution {
            route: route.pattern().to_string(),
            target: target.to_string(),
            source,
        };

        let mut middleware = Vec::with_capacity(self.middleware.len() + route.middleware().len());
        for reference in self.middleware.iter().chain(route.middleware()) {
            let layer = guarded(reference.name(), || reference.resolve(&self.container))
                .map_err(|e| resolution_failed(reference.name(), e))?;
            middleware.push(layer);
        }

        let reference = route.handler();
        let handler = guarded(reference.name(), || reference.resolve(&self.container))
            .map_err(|e| resolution_failed(reference.name(), e))?;

        Ok((handler, middleware))
    }
}

/// Resolve one reference, reporting a panic as a failed resolution.
fn guarded<T>(
    target: &'static str,
    resolve: impl FnOnce() -> Result<T, ResolutionError>,
) -> Result<T, ResolutionError> {
    boundary::catch_panic(resolve).unwrap_or_else(|message| {
        Err(ResolutionError::Panicked {
            service: target,
            message,
        })
    })
}
