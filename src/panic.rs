//! Containment of panics raised by business logic and queued tasks.
//!
//! Every point where foreign code runs (decoding, invoking, observer
//! callbacks, serialized writes) goes through [`guard`]. A caught panic is
//! reported as a [`PanicMessage`] and converted into an `INTERNAL` status so
//! the peer still receives a protocol-correct close.

use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
};

use crate::status::Status;

/// Text of a caught panic payload.
///
/// The payload is downcast to `String` or `&'static str` if possible and falls
/// back to `Debug` formatting otherwise.
///
/// ```
/// use tricall::panic::format_panic;
/// assert_eq!(format_panic(Box::new("boom")).to_string(), "boom");
/// assert!(format_panic(Box::new(5_u32)).to_string().contains("Any"));
/// ```
#[derive(Debug)]
#[must_use]
pub struct PanicMessage(Box<dyn Any + Send>);

impl PanicMessage {
    /// `INTERNAL` status describing the panic under `context`.
    pub fn into_status(self, context: &str) -> Status {
        Status::internal().with_description(format!("{context}: {self}"))
    }
}

impl fmt::Display for PanicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.0.downcast_ref::<String>() {
            f.write_str(s)
        } else if let Some(s) = self.0.downcast_ref::<&'static str>() {
            f.write_str(s)
        } else {
            write!(f, "{:?}", self.0)
        }
    }
}

/// Wrap a caught panic payload.
pub fn format_panic(panic: Box<dyn Any + Send>) -> PanicMessage { PanicMessage(panic) }

/// Run `f`, converting a panic into a [`PanicMessage`].
///
/// State touched by `f` may be left half-updated; callers close the call
/// after a panic instead of continuing to use it.
///
/// # Errors
///
/// Returns the formatted payload if `f` panicked.
pub fn guard<T>(f: impl FnOnce() -> T) -> Result<T, PanicMessage> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(format_panic)
}
