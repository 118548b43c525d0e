//! End-to-end dispatch behavior: matching, resolution and chain execution.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use axum::http::{Method, StatusCode};

use dispatch_core::container::{
    Arguments, Autowire, Container, Dependency, ResolutionError, ServiceKey,
};
use dispatch_core::dispatch::{
    DispatchError, Handler, HandlerError, HandlerRef, Reply, RequestContext, ResponseContext,
};
use dispatch_core::middleware::{from_fn, MiddlewareRef};
use dispatch_core::routing::RouteParams;

mod common;

use common::{builder_with, recording_middleware, EventLog};

fn named(name: &'static str) -> HandlerRef {
    HandlerRef::from_fn(move |_req, _res, params| {
        let id = params.get("id").unwrap_or("-");
        Ok(Reply::text(format!("{name}:{id}")))
    })
}

#[test]
fn test_first_registered_pattern_wins() {
    let mut builder = builder_with(Container::builder().build());
    builder
        .get("/items/{id}", named("first"))
        .unwrap()
        .get("/items/{slug}", named("second"))
        .unwrap();
    let dispatcher = builder.build();

    for _ in 0..5 {
        let response = dispatcher.handle(&Method::GET, "/items/9");
        assert_eq!(response.body_text(), "first:9");
    }
}

#[test]
fn test_params_and_exact_segment_count() {
    let mut builder = builder_with(Container::builder().build());
    builder.get("/user/{id}", named("user")).unwrap();
    let dispatcher = builder.build();

    let response = dispatcher.handle(&Method::GET, "/user/42");
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body_text(), "user:42");

    let response = dispatcher.handle(&Method::GET, "/user/42/extra");
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[test]
fn test_users_listing_and_trailing_slash() {
    let mut builder = builder_with(Container::builder().build());
    builder
        .get("/users", named("h1"))
        .unwrap()
        .get("/user/{id}", named("h2"))
        .unwrap();
    let dispatcher = builder.build();

    assert_eq!(dispatcher.handle(&Method::GET, "/user/7").body_text(), "h2:7");
    assert_eq!(dispatcher.handle(&Method::GET, "/users").body_text(), "h1:-");

    let response = dispatcher.handle(&Method::GET, "/users/");
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body_text(), r#"{"error":"not found"}"#);
}

#[test]
fn test_method_mismatch_is_404() {
    let mut builder = builder_with(Container::builder().build());
    builder.get("/users", named("h1")).unwrap();
    let dispatcher = builder.build();

    let res = dispatcher.dispatch(
        &Method::DELETE,
        "/users",
        RequestContext::new(),
        ResponseContext::new(),
    );
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(res.failure().is_some_and(DispatchError::is_not_found));
}

struct Session;

#[test]
fn test_singleton_and_transient_scopes() {
    let container = Container::builder()
        .singleton(|_| Ok(Arc::new(Session)))
        .bind(|_| Ok(Arc::new(String::from("scratch"))))
        .build();

    let a = container.resolve::<Session>().unwrap();
    let b = container.resolve::<Session>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    let x = container.resolve::<String>().unwrap();
    let y = container.resolve::<String>().unwrap();
    assert!(!Arc::ptr_eq(&x, &y));
}

struct Left;
struct Right;

impl Autowire for Left {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::service::<Right>()]
    }

    fn construct(args: &mut Arguments) -> Result<Self, ResolutionError> {
        args.service::<Right>()?;
        Ok(Self)
    }
}

impl Autowire for Right {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::service::<Left>()]
    }

    fn construct(args: &mut Arguments) -> Result<Self, ResolutionError> {
        args.service::<Left>()?;
        Ok(Self)
    }
}

struct NeedsLeft;

impl Handler for NeedsLeft {
    fn handle(
        &self,
        _req: &mut RequestContext,
        _res: &mut ResponseContext,
        _params: &RouteParams,
    ) -> Result<Reply, HandlerError> {
        Ok(Reply::text("unreachable"))
    }
}

impl Autowire for NeedsLeft {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::service::<Left>()]
    }

    fn construct(args: &mut Arguments) -> Result<Self, ResolutionError> {
        args.service::<Left>()?;
        Ok(Self)
    }
}

#[test]
fn test_cycle_fails_as_500_naming_both_keys() {
    let container = Container::builder()
        .autowire::<Left>()
        .autowire::<Right>()
        .autowire::<NeedsLeft>()
        .build();
    let mut builder = builder_with(container);
    builder
        .get("/cycle", HandlerRef::service::<NeedsLeft>())
        .unwrap();
    let dispatcher = builder.build();

    let res = dispatcher.dispatch(
        &Method::GET,
        "/cycle",
        RequestContext::new(),
        ResponseContext::new(),
    );
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(&res.body()[..], br#"{"error":"internal server error"}"#);

    let Some(DispatchError::Resolution { source, .. }) = res.failure() else {
        panic!("expected a resolution failure, got {:?}", res.failure());
    };
    let path = source.cycle().expect("cycle path");
    assert!(path.contains(&ServiceKey::of::<Left>()));
    assert!(path.contains(&ServiceKey::of::<Right>()));
    assert_eq!(path.first(), path.last());
}

#[test]
fn test_onion_order() {
    let log = EventLog::default();
    let handler_log = log.clone();

    let mut builder = builder_with(Container::builder().build());
    builder.middleware(recording_middleware("Log", &log));
    builder
        .route(
            Method::GET,
            "/h",
            HandlerRef::from_fn(move |_req, _res, _params| {
                handler_log.record("handler");
                Ok(Reply::text("ok"))
            }),
            vec![
                recording_middleware("Auth", &log),
                recording_middleware("Compress", &log),
            ],
        )
        .unwrap();

    let response = builder.build().handle(&Method::GET, "/h");
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        log.events(),
        [
            "before:Log",
            "before:Auth",
            "before:Compress",
            "handler",
            "after:Compress",
            "after:Auth",
            "after:Log",
        ]
    );
}

#[test]
fn test_short_circuit_returns_that_response() {
    let log = EventLog::default();
    let handler_log = log.clone();

    let gate = MiddlewareRef::instance(from_fn(|_req, res, _next| {
        res.set_status(StatusCode::FORBIDDEN);
        res.set_text("halt");
        Ok(())
    }));

    let mut builder = builder_with(Container::builder().build());
    builder
        .route(
            Method::GET,
            "/guarded",
            HandlerRef::from_fn(move |_req, _res, _params| {
                handler_log.record("handler");
                Ok(Reply::text("secret"))
            }),
            vec![gate, recording_middleware("Inner", &log)],
        )
        .unwrap();

    let response = builder.build().handle(&Method::GET, "/guarded");
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body_text(), "halt");
    assert!(log.events().is_empty());
}

#[test]
fn test_panicking_handler_is_contained() {
    let log = EventLog::default();

    let mut builder = builder_with(Container::builder().build());
    builder.middleware(recording_middleware("Outer", &log));
    builder
        .get(
            "/boom",
            HandlerRef::from_fn(|_req, _res, _params| -> Result<Reply, HandlerError> {
                panic!("handler exploded")
            }),
        )
        .unwrap();

    let res = builder.build().dispatch(
        &Method::GET,
        "/boom",
        RequestContext::new(),
        ResponseContext::new(),
    );
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(log.events(), ["before:Outer", "after:Outer"]);
    assert!(matches!(
        res.failure(),
        Some(DispatchError::Handler(HandlerError::Panic(message))) if message.contains("exploded")
    ));
}

#[test]
fn test_application_error_reply() {
    let mut builder = builder_with(Container::builder().build());
    builder
        .get(
            "/teapot",
            HandlerRef::from_fn(|_req, _res, _params| {
                Ok(Reply::error(StatusCode::IM_A_TEAPOT, "short and stout"))
            }),
        )
        .unwrap();

    let res = builder.build().dispatch(
        &Method::GET,
        "/teapot",
        RequestContext::new(),
        ResponseContext::new(),
    );
    assert_eq!(res.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(&res.body()[..], br#"{"error":"short and stout"}"#);
    assert!(res.failure().is_none());
}

struct Pool {
    id: usize,
}

struct UsesPool {
    pool: Arc<Pool>,
}

impl Handler for UsesPool {
    fn handle(
        &self,
        _req: &mut RequestContext,
        _res: &mut ResponseContext,
        _params: &RouteParams,
    ) -> Result<Reply, HandlerError> {
        Ok(Reply::text(format!(
            "{}@{:p}",
            self.pool.id,
            Arc::as_ptr(&self.pool)
        )))
    }
}

impl Autowire for UsesPool {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::service::<Pool>()]
    }

    fn construct(args: &mut Arguments) -> Result<Self, ResolutionError> {
        Ok(Self {
            pool: args.service::<Pool>()?,
        })
    }
}

#[test]
fn test_concurrent_first_resolution_through_dispatch() {
    const REQUESTS: usize = 8;

    let calls = Arc::new(AtomicUsize::new(0));
    let factory_calls = calls.clone();
    let container = Container::builder()
        .singleton(move |_| {
            let id = factory_calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            Ok(Arc::new(Pool { id }))
        })
        .autowire::<UsesPool>()
        .build();

    let mut builder = builder_with(container);
    builder
        .get("/pool", HandlerRef::service::<UsesPool>())
        .unwrap();
    let dispatcher = Arc::new(builder.build());
    let barrier = Arc::new(Barrier::new(REQUESTS));

    let bodies: Vec<String> = (0..REQUESTS)
        .map(|_| {
            let dispatcher = dispatcher.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                dispatcher.handle(&Method::GET, "/pool").body_text()
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(bodies.iter().all(|body| body == &bodies[0]));
    assert!(bodies[0].starts_with("0@"));
}

struct Exploding;

impl Handler for Exploding {
    fn handle(
        &self,
        _req: &mut RequestContext,
        _res: &mut ResponseContext,
        _params: &RouteParams,
    ) -> Result<Reply, HandlerError> {
        Ok(Reply::text("unreachable"))
    }
}

#[test]
fn test_panicking_factory_is_500_not_unwind() {
    let container = Container::builder()
        .bind::<Exploding, _>(|_| panic!("factory exploded"))
        .build();
    let mut builder = builder_with(container);
    builder
        .get("/x", HandlerRef::service::<Exploding>())
        .unwrap();
    let dispatcher = builder.build();

    let res = dispatcher.dispatch(
        &Method::GET,
        "/x",
        RequestContext::new(),
        ResponseContext::new(),
    );
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(&res.body()[..], br#"{"error":"internal server error"}"#);
    assert!(matches!(
        res.failure(),
        Some(DispatchError::Resolution {
            source: ResolutionError::Panicked { message, .. },
            ..
        }) if message == "factory exploded"
    ));

    // The dispatcher stays usable after the contained panic.
    let again = dispatcher.handle(&Method::GET, "/x");
    assert_eq!(again.status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn test_erroring_factory_is_500_with_detail_kept() {
    let container = Container::builder()
        .bind::<Exploding, _>(|_| Err(ResolutionError::factory::<Exploding>("pool exhausted")))
        .build();
    let mut builder = builder_with(container);
    builder
        .get("/x", HandlerRef::service::<Exploding>())
        .unwrap();

    let res = builder.build().dispatch(
        &Method::GET,
        "/x",
        RequestContext::new(),
        ResponseContext::new(),
    );
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(&res.body()[..], br#"{"error":"internal server error"}"#);

    let Some(DispatchError::Resolution { route, source, .. }) = res.failure() else {
        panic!("expected a resolution failure, got {:?}", res.failure());
    };
    assert_eq!(route, "/x");
    assert!(matches!(source, ResolutionError::Factory { .. }));
    assert!(source.to_string().contains("pool exhausted"));
}

struct Unregistered;

impl dispatch_core::middleware::Middleware for Unregistered {
    fn handle(
        &self,
        req: &mut RequestContext,
        res: &mut ResponseContext,
        next: dispatch_core::middleware::Next<'_>,
    ) -> Result<(), HandlerError> {
        next.run(req, res)
    }
}

#[test]
fn test_unresolvable_middleware_is_500_and_nothing_runs() {
    let log = EventLog::default();
    let handler_log = log.clone();

    let mut builder = builder_with(Container::builder().build());
    builder.middleware(recording_middleware("Outer", &log));
    builder
        .route(
            Method::GET,
            "/guarded",
            HandlerRef::from_fn(move |_req, _res, _params| {
                handler_log.record("handler");
                Ok(Reply::text("ok"))
            }),
            vec![MiddlewareRef::service::<Unregistered>()],
        )
        .unwrap();

    let res = builder.build().dispatch(
        &Method::GET,
        "/guarded",
        RequestContext::new(),
        ResponseContext::new(),
    );
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(&res.body()[..], br#"{"error":"internal server error"}"#);
    assert!(log.events().is_empty());

    let Some(DispatchError::Resolution { target, source, .. }) = res.failure() else {
        panic!("expected a resolution failure, got {:?}", res.failure());
    };
    assert!(target.ends_with("Unregistered"));
    assert!(matches!(source, ResolutionError::Unbound(key) if *key == ServiceKey::of::<Unregistered>()));
}
