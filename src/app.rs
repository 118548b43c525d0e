//! Demo application served by the binary.
//!
//! # Data Flow
//! ```text
//! AppConfig
//!     → build_container  (user store singleton, autowired handlers + middleware)
//!     → build_dispatcher (global AccessLog + SecurityHeaders, routes below)
//!
//! GET  /health        → HealthCheck
//! GET  /users         → ListUsers   [BearerAuth when a token is configured]
//! POST /users         → CreateUser  [BearerAuth when a token is configured]
//! GET  /users/{id}    → GetUser
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::http::StatusCode;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::container::{
    Arguments, Autowire, Container, ContainerBuilder, Dependency, ResolutionError,
};
use crate::dispatch::{
    Dispatcher, Handler, HandlerError, HandlerRef, Reply, RequestContext, ResponseContext,
};
use crate::lifecycle::startup;
use crate::middleware::{AccessLog, BearerAuth, Identity, MiddlewareRef, SecurityHeaders};
use crate::routing::{PatternError, RouteParams};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
}

/// Storage for users.
pub trait UserStore: Send + Sync {
    fn get(&self, id: u64) -> Option<User>;
    fn list(&self, limit: usize) -> Vec<User>;
    fn create(&self, name: String) -> User;
}

/// Process-local user store.
#[derive(Debug)]
pub struct InMemoryUsers {
    users: RwLock<BTreeMap<u64, User>>,
    next_id: AtomicU64,
}

impl InMemoryUsers {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_users<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        for name in names {
            store.create(name.into());
        }
        store
    }
}

impl Default for InMemoryUsers {
    fn default() -> Self {
        Self::new()
    }
}

impl UserStore for InMemoryUsers {
    fn get(&self, id: u64) -> Option<User> {
        self.users.read().get(&id).cloned()
    }

    fn list(&self, limit: usize) -> Vec<User> {
        self.users.read().values().take(limit).cloned().collect()
    }

    fn create(&self, name: String) -> User {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let user = User { id, name };
        self.users.write().insert(id, user.clone());
        user
    }
}

pub struct HealthCheck;

impl Handler for HealthCheck {
    fn handle(
        &self,
        _req: &mut RequestContext,
        _res: &mut ResponseContext,
        _params: &RouteParams,
    ) -> Result<Reply, HandlerError> {
        Reply::json(&serde_json::json!({ "status": "ok" }))
    }
}

impl Autowire for HealthCheck {
    fn dependencies() -> Vec<Dependency> {
        Vec::new()
    }

    fn construct(_args: &mut Arguments) -> Result<Self, ResolutionError> {
        Ok(Self)
    }
}

pub struct GetUser {
    store: Arc<dyn UserStore>,
}

impl Handler for GetUser {
    fn handle(
        &self,
        _req: &mut RequestContext,
        _res: &mut ResponseContext,
        params: &RouteParams,
    ) -> Result<Reply, HandlerError> {
        let Some(id) = params.get("id").and_then(|raw| raw.parse::<u64>().ok()) else {
            return Ok(Reply::bad_request("user id must be numeric"));
        };

        match self.store.get(id) {
            Some(user) => Reply::json(&user),
            None => Ok(Reply::not_found(format!("user {id} not found"))),
        }
    }
}

impl Autowire for GetUser {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::service::<dyn UserStore>()]
    }

    fn construct(args: &mut Arguments) -> Result<Self, ResolutionError> {
        Ok(Self {
            store: args.service::<dyn UserStore>()?,
        })
    }
}

pub struct ListUsers {
    store: Arc<dyn UserStore>,
    page_size: usize,
}

impl Handler for ListUsers {
    fn handle(
        &self,
        _req: &mut RequestContext,
        _res: &mut ResponseContext,
        _params: &RouteParams,
    ) -> Result<Reply, HandlerError> {
        Reply::json(&self.store.list(self.page_size))
    }
}

impl Autowire for ListUsers {
    fn dependencies() -> Vec<Dependency> {
        vec![
            Dependency::service::<dyn UserStore>(),
            Dependency::param_or("page_size", 50_i64),
        ]
    }

    fn construct(args: &mut Arguments) -> Result<Self, ResolutionError> {
        let store = args.service::<dyn UserStore>()?;
        let page_size = usize::try_from(args.int()?.max(0)).unwrap_or(usize::MAX);
        Ok(Self { store, page_size })
    }
}

#[derive(Debug, Deserialize)]
struct NewUser {
    name: String,
}

pub struct CreateUser {
    store: Arc<dyn UserStore>,
}

impl Handler for CreateUser {
    fn handle(
        &self,
        req: &mut RequestContext,
        res: &mut ResponseContext,
        _params: &RouteParams,
    ) -> Result<Reply, HandlerError> {
        let new_user: NewUser = match serde_json::from_slice(req.body()) {
            Ok(new_user) => new_user,
            Err(e) => return Ok(Reply::bad_request(format!("invalid user: {e}"))),
        };
        if new_user.name.trim().is_empty() {
            return Ok(Reply::bad_request("name must not be empty"));
        }

        let user = self.store.create(new_user.name);
        let created_by = req.extensions().get::<Identity>().map(|id| id.subject.as_str());
        tracing::info!(user_id = user.id, created_by = ?created_by, "User created");

        res.set_status(StatusCode::CREATED);
        Reply::json(&user)
    }
}

impl Autowire for CreateUser {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::service::<dyn UserStore>()]
    }

    fn construct(args: &mut Arguments) -> Result<Self, ResolutionError> {
        Ok(Self {
            store: args.service::<dyn UserStore>()?,
        })
    }
}

/// Register the demo services on top of `builder`.
///
/// `BearerAuth` is only bound when a token is configured, so warming the
/// container never trips over the missing `auth_token` parameter.
pub fn register_services(builder: ContainerBuilder, config: &AppConfig) -> ContainerBuilder {
    let builder = builder
        .singleton(|_| {
            Ok(Arc::new(InMemoryUsers::with_users(["ada", "grace"])) as Arc<dyn UserStore>)
        })
        .autowire::<HealthCheck>()
        .autowire::<GetUser>()
        .autowire::<ListUsers>()
        .autowire::<CreateUser>()
        .autowire_singleton::<AccessLog>()
        .autowire_singleton::<SecurityHeaders>();

    if config.security.api_token.is_some() {
        builder.autowire_singleton::<BearerAuth>()
    } else {
        builder
    }
}

pub fn build_container(config: &AppConfig) -> Container {
    startup::apply_parameters(register_services(Container::builder(), config), config).build()
}

pub fn build_dispatcher(
    container: Arc<Container>,
    config: &AppConfig,
) -> Result<Dispatcher, PatternError> {
    let protected = || {
        if config.security.api_token.is_some() {
            vec![MiddlewareRef::service::<BearerAuth>()]
        } else {
            Vec::new()
        }
    };

    let mut builder = Dispatcher::builder(container);
    builder
        .middleware(MiddlewareRef::service::<AccessLog>())
        .middleware(MiddlewareRef::service::<SecurityHeaders>());
    builder
        .get("/health", HandlerRef::service::<HealthCheck>())?
        .route(
            axum::http::Method::GET,
            "/users",
            HandlerRef::service::<ListUsers>(),
            protected(),
        )?
        .route(
            axum::http::Method::POST,
            "/users",
            HandlerRef::service::<CreateUser>(),
            protected(),
        )?
        .get("/users/{id}", HandlerRef::service::<GetUser>())?;

    Ok(builder.build())
}
