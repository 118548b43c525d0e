//! Resolution failures.

use thiserror::Error;

use crate::container::key::ServiceKey;

type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Why a service could not be resolved.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// No binding and no autowire descriptor for the key.
    #[error("no binding or autowire descriptor registered for `{0}`")]
    Unbound(ServiceKey),

    /// A primitive constructor parameter had neither a supplied value nor a default.
    #[error("cannot construct `{service}`: parameter `{parameter}` has no value and no default")]
    MissingParameter {
        service: ServiceKey,
        parameter: &'static str,
    },

    /// A key reappeared on the in-progress resolution path.
    /// `path` starts and ends with the repeated key.
    #[error("dependency cycle detected: {}", format_path(.path))]
    Cycle { path: Vec<ServiceKey> },

    #[error("resolution depth limit of {limit} exceeded while resolving `{key}`")]
    DepthExceeded { key: ServiceKey, limit: usize },

    /// A constructor asked for an argument that does not match its descriptor.
    #[error("`{service}` requested argument {index} as `{expected}` but the descriptor disagrees")]
    TypeMismatch {
        service: ServiceKey,
        index: usize,
        expected: &'static str,
    },

    /// A factory or constructor panicked instead of returning.
    #[error("factory for `{service}` panicked: {message}")]
    Panicked {
        service: &'static str,
        message: String,
    },

    /// A factory or constructor reported its own failure.
    #[error("factory for `{key}` failed: {source}")]
    Factory {
        key: ServiceKey,
        #[source]
        source: DynError,
    },
}

impl ResolutionError {
    /// Wrap an arbitrary factory error for `T`.
    pub fn factory<T: ?Sized + 'static>(err: impl Into<DynError>) -> Self {
        Self::Factory {
            key: ServiceKey::of::<T>(),
            source: err.into(),
        }
    }

    /// Keys participating in a detected cycle.
    pub fn cycle(&self) -> Option<&[ServiceKey]> {
        match self {
            Self::Cycle { path } => Some(path),
            _ => None,
        }
    }
}

fn format_path(path: &[ServiceKey]) -> String {
    path.iter()
        .map(|k| k.type_name())
        .collect::<Vec<_>>()
        .join(" -> ")
}
