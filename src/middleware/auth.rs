//! Bearer token authentication.

use axum::http::{header, HeaderValue, StatusCode};

use crate::container::{Arguments, Autowire, Dependency, ResolutionError};
use crate::dispatch::{HandlerError, RequestContext, ResponseContext};
use crate::middleware::{Middleware, Next};

/// Authenticated caller, attached to the request for downstream use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
}

/// Rejects requests whose `Authorization` header does not carry the
/// configured bearer token.
#[derive(Debug, Clone)]
pub struct BearerAuth {
    token: String,
    subject: String,
}

impl BearerAuth {
    pub fn new(token: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            subject: subject.into(),
        }
    }

    fn reject(res: &mut ResponseContext, message: &str) {
        res.set_error(StatusCode::UNAUTHORIZED, message);
        res.headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
}

impl Middleware for BearerAuth {
    fn handle(
        &self,
        req: &mut RequestContext,
        res: &mut ResponseContext,
        next: Next<'_>,
    ) -> Result<(), HandlerError> {
        let presented = match req.header("authorization").and_then(|v| v.strip_prefix("Bearer ")) {
            Some(token) => token,
            None => {
                Self::reject(res, "missing bearer token");
                return Ok(());
            }
        };

        if presented != self.token {
            tracing::warn!(path = %req.path(), "Rejected invalid bearer token");
            Self::reject(res, "invalid bearer token");
            return Ok(());
        }

        req.extensions_mut().insert(Identity {
            subject: self.subject.clone(),
        });
        next.run(req, res)
    }
}

impl Autowire for BearerAuth {
    fn dependencies() -> Vec<Dependency> {
        vec![
            Dependency::param("auth_token"),
            Dependency::param_or("auth_subject", "api-client"),
        ]
    }

    fn construct(args: &mut Arguments) -> Result<Self, ResolutionError> {
        Ok(Self::new(args.string()?, args.string()?))
    }
}
