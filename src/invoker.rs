//! Contract for the business-logic side of a call.

use futures::future::BoxFuture;
use thiserror::Error;

use crate::{
    invocation::Invocation,
    observer::StreamObserver,
    status::{BoxError, Status},
};

/// What an invoker hands back for one invocation.
pub enum Reply<M> {
    /// The unary response, sent as one message followed by an OK trailer.
    Value(M),
    /// A unary response produced later. The future is driven on the call's
    /// runtime and completes the call when it resolves.
    Pending(BoxFuture<'static, Result<M, InvokeError>>),
    /// No direct value: a server-streaming method writes its responses
    /// through the invocation's responder.
    Empty,
    /// Sink for the remaining requests of a client- or bidi-streaming call.
    Requests(Box<dyn StreamObserver<M>>),
}

impl<M: 'static> std::fmt::Debug for Reply<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Reply::Value(_) => "Value(..)",
            Reply::Pending(_) => "Pending(..)",
            Reply::Empty => "Empty",
            Reply::Requests(_) => "Requests(..)",
        })
    }
}

/// Failure reported by an invoker.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The business logic chose a specific status.
    #[error(transparent)]
    Status(#[from] Status),
    /// The business logic failed; the call closes with `INTERNAL`.
    #[error("invocation failed: {0}")]
    Failed(#[source] BoxError),
}

impl InvokeError {
    /// Wrap an arbitrary error as an internal failure.
    pub fn failed(error: impl Into<BoxError>) -> Self { Self::Failed(error.into()) }

    /// The status sent to the peer for this failure.
    #[must_use]
    pub fn into_status(self) -> Status {
        match self {
            Self::Status(status) => status,
            Self::Failed(cause) => Status::internal()
                .with_description("Invoke failed")
                .with_cause(cause),
        }
    }
}

/// Runs the business method for an invocation. Called at most once per call.
pub trait Invoker<M>: Send + Sync + 'static {
    /// Invoke the business method.
    ///
    /// # Errors
    ///
    /// Returns [`InvokeError`] if the business method fails.
    fn invoke(&self, invocation: Invocation<M>) -> Result<Reply<M>, InvokeError>;
}

impl<M, F> Invoker<M> for F
where
    F: Fn(Invocation<M>) -> Result<Reply<M>, InvokeError> + Send + Sync + 'static,
{
    fn invoke(&self, invocation: Invocation<M>) -> Result<Reply<M>, InvokeError> {
        self(invocation)
    }
}
