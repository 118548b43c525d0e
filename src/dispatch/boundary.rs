//! The dispatcher's failure boundary.
//!
//! Every continuation in a chain runs through [`contain`], so a failure is
//! converted to a 500 at the stage it escaped from and the middleware above
//! it still run their response phase against the converted response.
//! Handler and middleware resolution goes through [`catch_panic`] as well,
//! so a panicking factory surfaces as a resolution failure.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use axum::http::StatusCode;

use crate::dispatch::context::{RequestContext, ResponseContext};
use crate::dispatch::error::{DispatchError, HandlerError};

/// Run one stage, turning a returned error or a panic into a 500.
pub(crate) fn contain<F>(req: &mut RequestContext, res: &mut ResponseContext, stage: F)
where
    F: FnOnce(&mut RequestContext, &mut ResponseContext) -> Result<(), HandlerError>,
{
    let err = match catch_panic(|| stage(req, res)) {
        Ok(Ok(())) => return,
        Ok(Err(err)) => err,
        Err(message) => HandlerError::Panic(message),
    };
    fail(res, DispatchError::Handler(err));
}

/// Run `f`, returning the panic message instead of unwinding.
pub(crate) fn catch_panic<R>(f: impl FnOnce() -> R) -> Result<R, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

/// Replace the response with a generic 500, keeping `failure` for diagnostics.
pub(crate) fn fail(res: &mut ResponseContext, failure: DispatchError) {
    tracing::error!(
        route = res.route().unwrap_or("none"),
        error = %failure,
        "Request failed, responding 500"
    );
    res.set_error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error");
    res.record_failure(failure);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
