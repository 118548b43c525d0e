//! Route registration and lookup.
//!
//! # Responsibilities
//! - Store compiled routes per HTTP method
//! - Look up the matching route for a method and path
//! - Return the matched route or an explicit no-match
//!
//! # Design Decisions
//! - Append-only while building, read-only once the dispatcher owns it
//! - O(1) method lookup via HashMap, O(n) pattern scan within a method
//! - First registered wins; no specificity scoring

use std::collections::HashMap;

use axum::http::Method;

use crate::dispatch::HandlerRef;
use crate::middleware::MiddlewareRef;
use crate::routing::pattern::{Pattern, PatternError, RouteParams};

/// A compiled route.
#[derive(Debug)]
pub struct Route {
    method: Method,
    pattern: Pattern,
    handler: HandlerRef,
    middleware: Vec<MiddlewareRef>,
}

impl Route {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Placeholder names in declaration order.
    pub fn param_names(&self) -> &[String] {
        self.pattern.param_names()
    }

    pub fn handler(&self) -> &HandlerRef {
        &self.handler
    }

    /// Route-scoped middleware, outermost first.
    pub fn middleware(&self) -> &[MiddlewareRef] {
        &self.middleware
    }
}

/// A successful lookup.
#[derive(Debug)]
pub struct RouteMatch<'r> {
    pub route: &'r Route,
    pub params: RouteParams,
}

#[derive(Debug, Default)]
pub struct RouteTable {
    routes: HashMap<Method, Vec<Route>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `pattern` and append it to `method`'s list.
    pub fn register(
        &mut self,
        method: Method,
        pattern: &str,
        handler: HandlerRef,
        middleware: Vec<MiddlewareRef>,
    ) -> Result<&Route, PatternError> {
        let pattern = Pattern::parse(pattern)?;
        let entries = self.routes.entry(method.clone()).or_default();

        if entries.iter().any(|r| r.pattern == pattern) {
            tracing::warn!(
                method = %method,
                pattern = %pattern,
                "Route is shadowed by an earlier registration"
            );
        }

        tracing::debug!(
            method = %method,
            pattern = %pattern,
            handler = handler.name(),
            middleware = middleware.len(),
            "Route registered"
        );

        entries.push(Route {
            method,
            pattern,
            handler,
            middleware,
        });
        let index = entries.len() - 1;
        Ok(&entries[index])
    }

    /// First route for `method` whose pattern accepts `path`.
    pub fn find(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        self.routes.get(method)?.iter().find_map(|route| {
            route
                .pattern
                .matches(path)
                .map(|params| RouteMatch { route, params })
        })
    }

    /// Methods with at least one route accepting `path`.
    pub fn methods_for(&self, path: &str) -> Vec<Method> {
        let mut methods: Vec<Method> = self
            .routes
            .iter()
            .filter(|(_, routes)| routes.iter().any(|r| r.pattern.matches(path).is_some()))
            .map(|(m, _)| m.clone())
            .collect();
        methods.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        methods
    }

    /// All routes, grouped by method in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
