//! Dependency container.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     ContainerBuilder
//!         .bind / .singleton        (explicit factories)
//!         .autowire / .parameter    (static descriptors, primitive values)
//!     → build() freezes bindings into an immutable Container
//!
//! Resolution (per request):
//!     resolve::<T>()
//!     → singleton cache hit?           return shared instance
//!     → explicit binding?              run factory (cache if singleton)
//!     → autowire descriptor?           resolve each dependency, construct
//!     → otherwise                      ResolutionError::Unbound
//! ```
//!
//! # Design Decisions
//! - Bindings are frozen at build time; reads need no synchronization
//! - The singleton cache is the only shared mutable state
//! - Singletons materialize under one reentrant lock with a double-checked
//!   lookup, so each factory runs at most once even under concurrent first use
//! - That lock is container-wide, not per key: a slow singleton factory delays
//!   the first build of unrelated singletons. Per-key locks would let two
//!   threads entering a singleton cycle from opposite ends wait on each other
//!   forever instead of reporting `Cycle`. Cached lookups never take the lock,
//!   and `warm_up` moves first builds to startup.
//! - A panicking factory or constructor is reported as `Panicked`, not unwound
//! - Every resolution carries its in-progress path; a repeated key is a cycle

pub mod descriptor;
pub mod error;
pub mod key;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::ReentrantMutex;

use crate::dispatch::boundary;
use crate::observability::metrics;

pub use descriptor::{Arguments, Autowire, Dependency, ParamValue};
pub use error::ResolutionError;
pub use key::{Instance, ServiceKey};

use descriptor::{Argument, Descriptor};

/// Upper bound on nested resolutions before giving up.
pub const MAX_RESOLUTION_DEPTH: usize = 64;

type Factory = Arc<dyn Fn(&mut Resolver<'_>) -> Result<Instance, ResolutionError> + Send + Sync>;

/// How long a resolved instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// One shared instance, created on first resolution.
    Singleton,
    /// A fresh instance per resolution.
    Transient,
}

struct Binding {
    factory: Factory,
    lifecycle: Lifecycle,
}

struct AutowireEntry {
    descriptor: Descriptor,
    lifecycle: Lifecycle,
}

/// Collects bindings before the container is frozen.
#[derive(Default)]
pub struct ContainerBuilder {
    bindings: HashMap<ServiceKey, Binding>,
    descriptors: HashMap<ServiceKey, AutowireEntry>,
    params: HashMap<String, ParamValue>,
    instances: Vec<Instance>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_binding<T, F>(mut self, lifecycle: Lifecycle, factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&mut Resolver<'_>) -> Result<Arc<T>, ResolutionError> + Send + Sync + 'static,
    {
        let key = ServiceKey::of::<T>();
        let factory: Factory = Arc::new(move |resolver: &mut Resolver<'_>| factory(resolver).map(Instance::new));
        if self.bindings.insert(key, Binding { factory, lifecycle }).is_some() {
            tracing::warn!(service = %key, "Binding replaced");
        }
        self
    }

    /// Register a transient factory for `T`.
    pub fn bind<T, F>(self, factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&mut Resolver<'_>) -> Result<Arc<T>, ResolutionError> + Send + Sync + 'static,
    {
        self.insert_binding(Lifecycle::Transient, factory)
    }

    /// Register a factory for `T` whose first result is cached for the
    /// container's lifetime.
    pub fn singleton<T, F>(self, factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&mut Resolver<'_>) -> Result<Arc<T>, ResolutionError> + Send + Sync + 'static,
    {
        self.insert_binding(Lifecycle::Singleton, factory)
    }

    /// Register an already constructed singleton.
    pub fn instance<T: ?Sized + Send + Sync + 'static>(mut self, value: Arc<T>) -> Self {
        self.instances.push(Instance::new(value));
        self
    }

    /// Let the container build `T` from its declared dependencies, fresh each time.
    pub fn autowire<T: Autowire>(self) -> Self {
        self.insert_descriptor::<T>(Lifecycle::Transient)
    }

    /// Like [`autowire`](Self::autowire), but cache the first instance.
    pub fn autowire_singleton<T: Autowire>(self) -> Self {
        self.insert_descriptor::<T>(Lifecycle::Singleton)
    }

    fn insert_descriptor<T: Autowire>(mut self, lifecycle: Lifecycle) -> Self {
        self.descriptors.insert(
            ServiceKey::of::<T>(),
            AutowireEntry {
                descriptor: Descriptor::of::<T>(),
                lifecycle,
            },
        );
        self
    }

    /// Supply a named primitive for autowired constructors.
    /// Takes precedence over the descriptor's default.
    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Freeze the bindings.
    pub fn build(self) -> Container {
        let singletons = DashMap::new();
        for instance in self.instances {
            singletons.insert(instance.key(), instance);
        }

        tracing::debug!(
            bindings = self.bindings.len(),
            autowired = self.descriptors.len(),
            instances = singletons.len(),
            "Container built"
        );

        Container {
            bindings: self.bindings,
            descriptors: self.descriptors,
            params: self.params,
            singletons,
            init_lock: ReentrantMutex::new(()),
        }
    }
}

/// Immutable set of bindings plus the lazily filled singleton cache.
pub struct Container {
    bindings: HashMap<ServiceKey, Binding>,
    descriptors: HashMap<ServiceKey, AutowireEntry>,
    params: HashMap<String, ParamValue>,
    singletons: DashMap<ServiceKey, Instance>,
    init_lock: ReentrantMutex<()>,
}

impl Container {
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// Resolve a service by type.
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolutionError> {
        Resolver::new(self).resolve::<T>().inspect_err(|e| {
            metrics::record_resolution_failure();
            tracing::debug!(service = std::any::type_name::<T>(), error = %e, "Resolution failed");
        })
    }

    /// Resolve a service by key, type-erased.
    pub fn resolve_key(&self, key: ServiceKey) -> Result<Instance, ResolutionError> {
        Resolver::new(self).resolve_key(key)
    }

    /// Whether `key` can be resolved without falling through to `Unbound`.
    pub fn contains(&self, key: ServiceKey) -> bool {
        self.bindings.contains_key(&key)
            || self.descriptors.contains_key(&key)
            || self.singletons.contains_key(&key)
    }

    /// Registered lifecycle for `key`, if any.
    pub fn lifecycle(&self, key: ServiceKey) -> Option<Lifecycle> {
        self.bindings
            .get(&key)
            .map(|b| b.lifecycle)
            .or_else(|| self.descriptors.get(&key).map(|d| d.lifecycle))
            .or_else(|| self.singletons.contains_key(&key).then_some(Lifecycle::Singleton))
    }

    /// Materialize every singleton up front.
    ///
    /// Returns the number of singletons now cached.
    pub fn warm_up(&self) -> Result<usize, ResolutionError> {
        let keys = self
            .bindings
            .iter()
            .filter(|(_, b)| b.lifecycle == Lifecycle::Singleton)
            .map(|(k, _)| *k)
            .chain(
                self.descriptors
                    .iter()
                    .filter(|(_, d)| d.lifecycle == Lifecycle::Singleton)
                    .map(|(k, _)| *k),
            )
            .collect::<Vec<_>>();

        for key in keys {
            self.resolve_key(key)?;
        }
        Ok(self.singletons.len())
    }

    fn cached(&self, key: &ServiceKey) -> Option<Instance> {
        self.singletons.get(key).map(|entry| entry.value().clone())
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("bindings", &self.bindings.len())
            .field("autowired", &self.descriptors.len())
            .field("cached_singletons", &self.singletons.len())
            .finish()
    }
}

/// Handle passed to factories; tracks the in-progress resolution path.
pub struct Resolver<'c> {
    container: &'c Container,
    path: Vec<ServiceKey>,
}

impl<'c> Resolver<'c> {
    fn new(container: &'c Container) -> Self {
        Self {
            container,
            path: Vec::new(),
        }
    }

    /// Resolve a dependency of the service currently being built.
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Arc<T>, ResolutionError> {
        let instance = self.resolve_key(ServiceKey::of::<T>())?;
        instance
            .downcast::<T>()
            .ok_or_else(|| ResolutionError::factory::<T>("resolved instance has a different type"))
    }

    /// Named primitive supplied through [`ContainerBuilder::parameter`].
    pub fn parameter(&self, name: &str) -> Option<&'c ParamValue> {
        self.container.params.get(name)
    }

    /// Keys currently being resolved, outermost first.
    pub fn path(&self) -> &[ServiceKey] {
        &self.path
    }

    pub fn resolve_key(&mut self, key: ServiceKey) -> Result<Instance, ResolutionError> {
        if let Some(hit) = self.container.cached(&key) {
            return Ok(hit);
        }

        if let Some(pos) = self.path.iter().position(|k| *k == key) {
            let mut path = self.path[pos..].to_vec();
            path.push(key);
            return Err(ResolutionError::Cycle { path });
        }
        if self.path.len() >= MAX_RESOLUTION_DEPTH {
            return Err(ResolutionError::DepthExceeded {
                key,
                limit: MAX_RESOLUTION_DEPTH,
            });
        }

        self.path.push(key);
        let result = self.materialize(key);
        self.path.pop();
        result
    }

    fn materialize(&mut self, key: ServiceKey) -> Result<Instance, ResolutionError> {
        let lifecycle = self
            .container
            .lifecycle(key)
            .ok_or(ResolutionError::Unbound(key))?;

        if lifecycle == Lifecycle::Transient {
            return self.construct(key);
        }

        let container = self.container;
        let _guard = container.init_lock.lock();
        // Another request may have finished it while we waited.
        if let Some(hit) = container.cached(&key) {
            return Ok(hit);
        }

        let instance = self.construct(key)?;
        container.singletons.insert(key, instance.clone());
        metrics::record_singleton_created();
        tracing::debug!(service = %key, "Singleton materialized");
        Ok(instance)
    }

    /// Build one instance of `key`. A panic in the factory or constructor
    /// becomes `ResolutionError::Panicked` for that key.
    fn construct(&mut self, key: ServiceKey) -> Result<Instance, ResolutionError> {
        boundary::catch_panic(|| self.instantiate(key)).unwrap_or_else(|message| {
            Err(ResolutionError::Panicked {
                service: key.type_name(),
                message,
            })
        })
    }

    fn instantiate(&mut self, key: ServiceKey) -> Result<Instance, ResolutionError> {
        let container = self.container;
        if let Some(binding) = container.bindings.get(&key) {
            return (binding.factory)(self);
        }

        let entry = container
            .descriptors
            .get(&key)
            .ok_or(ResolutionError::Unbound(key))?;

        let mut args = Vec::with_capacity(entry.descriptor.dependencies.len());
        for dependency in &entry.descriptor.dependencies {
            let argument = match dependency {
                Dependency::Service(dep) => Argument::Service(self.resolve_key(*dep)?),
                Dependency::Param { name, default } => {
                    let value = container
                        .params
                        .get(*name)
                        .or(default.as_ref())
                        .cloned()
                        .ok_or(ResolutionError::MissingParameter {
                            service: key,
                            parameter: *name,
                        })?;
                    Argument::Value(value)
                }
            };
            args.push(argument);
        }

        (entry.descriptor.construct)(&mut Arguments::new(key, args))
    }
}
