//! Static dependency descriptors for auto-resolution.
//!
//! A type opts into auto-wiring by implementing [`Autowire`]: it lists its
//! constructor dependencies up front and builds itself from the resolved
//! [`Arguments`]. The container walks these lists instead of inspecting
//! types at runtime.

use std::sync::Arc;

use crate::container::error::ResolutionError;
use crate::container::key::{Instance, ServiceKey};

/// A primitive constructor value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// One entry of a constructor's dependency list.
#[derive(Debug, Clone)]
pub enum Dependency {
    /// Another service, resolved recursively.
    Service(ServiceKey),
    /// A primitive value looked up by name; `default` applies when the
    /// container has no value for it.
    Param {
        name: &'static str,
        default: Option<ParamValue>,
    },
}

impl Dependency {
    pub fn service<T: ?Sized + 'static>() -> Self {
        Self::Service(ServiceKey::of::<T>())
    }

    pub fn param(name: &'static str) -> Self {
        Self::Param {
            name,
            default: None,
        }
    }

    pub fn param_or(name: &'static str, default: impl Into<ParamValue>) -> Self {
        Self::Param {
            name,
            default: Some(default.into()),
        }
    }
}

/// A type the container can build without an explicit binding.
pub trait Autowire: Sized + Send + Sync + 'static {
    /// Constructor dependencies, in the order `construct` consumes them.
    fn dependencies() -> Vec<Dependency>;

    fn construct(args: &mut Arguments) -> Result<Self, ResolutionError>;
}

pub(crate) enum Argument {
    Service(Instance),
    Value(ParamValue),
}

/// Resolved constructor arguments, consumed front to back.
pub struct Arguments {
    service: ServiceKey,
    values: std::vec::IntoIter<Argument>,
    index: usize,
}

impl Arguments {
    pub(crate) fn new(service: ServiceKey, values: Vec<Argument>) -> Self {
        Self {
            service,
            values: values.into_iter(),
            index: 0,
        }
    }

    fn next_argument(&mut self, expected: &'static str) -> Result<Argument, ResolutionError> {
        let index = self.index;
        self.index += 1;
        self.values.next().ok_or(ResolutionError::TypeMismatch {
            service: self.service,
            index,
            expected,
        })
    }

    fn mismatch(&self, expected: &'static str) -> ResolutionError {
        ResolutionError::TypeMismatch {
            service: self.service,
            index: self.index - 1,
            expected,
        }
    }

    /// Next argument as a service handle.
    pub fn service<T: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Arc<T>, ResolutionError> {
        let expected = std::any::type_name::<T>();
        match self.next_argument(expected)? {
            Argument::Service(instance) => instance.downcast::<T>().ok_or_else(|| self.mismatch(expected)),
            Argument::Value(_) => Err(self.mismatch(expected)),
        }
    }

    /// Next argument as a primitive value.
    pub fn value(&mut self) -> Result<ParamValue, ResolutionError> {
        match self.next_argument("primitive")? {
            Argument::Value(value) => Ok(value),
            Argument::Service(_) => Err(self.mismatch("primitive")),
        }
    }

    pub fn string(&mut self) -> Result<String, ResolutionError> {
        match self.value()? {
            ParamValue::Str(s) => Ok(s),
            _ => Err(self.mismatch("string")),
        }
    }

    pub fn int(&mut self) -> Result<i64, ResolutionError> {
        match self.value()? {
            ParamValue::Int(i) => Ok(i),
            _ => Err(self.mismatch("integer")),
        }
    }

    pub fn boolean(&mut self) -> Result<bool, ResolutionError> {
        match self.value()? {
            ParamValue::Bool(b) => Ok(b),
            _ => Err(self.mismatch("bool")),
        }
    }
}

type Construct = fn(&mut Arguments) -> Result<Instance, ResolutionError>;

/// Type-erased entry of the autowire table.
#[derive(Clone)]
pub(crate) struct Descriptor {
    pub(crate) dependencies: Vec<Dependency>,
    pub(crate) construct: Construct,
}

impl Descriptor {
    pub(crate) fn of<T: Autowire>() -> Self {
        Self {
            dependencies: T::dependencies(),
            construct: |args| T::construct(args).map(|value| Instance::new(Arc::new(value))),
        }
    }
}
