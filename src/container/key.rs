//! Service keys and type-erased instances.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Identity of a resolvable service.
///
/// Keys are types, which may be unsized: binding `dyn Trait` lets an
/// abstract interface resolve to a concrete implementation.
#[derive(Clone, Copy)]
pub struct ServiceKey {
    type_id: TypeId,
    type_name: &'static str,
}

impl ServiceKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl PartialEq for ServiceKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ServiceKey {}

impl std::hash::Hash for ServiceKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

/// A resolved service with its concrete type erased.
///
/// Holds an `Arc<T>` boxed behind `Any` so unsized keys survive the round trip.
#[derive(Clone)]
pub struct Instance {
    key: ServiceKey,
    value: Arc<dyn Any + Send + Sync>,
}

impl Instance {
    pub(crate) fn new<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            key: ServiceKey::of::<T>(),
            value: Arc::new(value),
        }
    }

    pub fn key(&self) -> ServiceKey {
        self.key
    }

    /// Recover the typed handle. `None` if `T` is not the stored type.
    pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.value.downcast_ref::<Arc<T>>().cloned()
    }

    /// Whether two instances share the same allocation.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance").field("key", &self.key).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    #[test]
    fn test_unsized_round_trip() {
        let greeter: Arc<dyn Greeter> = Arc::new(English);
        let instance = Instance::new(greeter);

        assert_eq!(instance.key(), ServiceKey::of::<dyn Greeter>());
        let back = instance.downcast::<dyn Greeter>().unwrap();
        assert_eq!(back.greet(), "hello");
        assert!(instance.downcast::<English>().is_none());
    }

    #[test]
    fn test_key_identity() {
        assert_eq!(ServiceKey::of::<u32>(), ServiceKey::of::<u32>());
        assert_ne!(ServiceKey::of::<u32>(), ServiceKey::of::<u64>());
        assert_eq!(ServiceKey::of::<String>().to_string(), "alloc::string::String");
    }
}
