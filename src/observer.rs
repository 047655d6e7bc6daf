//! Observers connecting business logic to a call.
//!
//! [`StreamObserver`] is the callback shape used in both directions: the
//! listener feeds inbound requests into one supplied by the invoker, and
//! business logic pushes responses into a [`ResponseObserver`].

use std::{
    sync::{
        Arc,
        Mutex,
        PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::{
    call::{CallError, ServerCall},
    codec::Payload,
    metadata::Metadata,
    status::Status,
};

/// Receives a sequence of values followed by one terminal signal.
pub trait StreamObserver<M>: Send {
    /// Receive the next value.
    fn on_next(&mut self, value: M);

    /// Terminate the sequence with a failure.
    fn on_error(&mut self, status: Status);

    /// Terminate the sequence successfully.
    fn on_completed(&mut self);
}

/// Response sink handed to business logic.
///
/// Values are written through the call's serializer. The first terminal
/// signal closes the call; later signals and values are ignored. Clones
/// share termination state.
pub struct ResponseObserver<M> {
    call: Arc<ServerCall<M>>,
    terminated: Arc<AtomicBool>,
    attachments: Arc<Mutex<Option<Metadata>>>,
}

impl<M: 'static> Clone for ResponseObserver<M> {
    fn clone(&self) -> Self {
        Self {
            call: Arc::clone(&self.call),
            terminated: Arc::clone(&self.terminated),
            attachments: Arc::clone(&self.attachments),
        }
    }
}

impl<M: 'static> std::fmt::Debug for ResponseObserver<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseObserver")
            .field("method", &self.call.method_name())
            .field("terminated", &self.is_terminated())
            .finish_non_exhaustive()
    }
}

impl<M: 'static> ResponseObserver<M> {
    /// Returns `true` once a terminal signal has been sent.
    #[must_use]
    pub fn is_terminated(&self) -> bool { self.terminated.load(Ordering::Acquire) }
}

impl<M: Payload> ResponseObserver<M> {
    pub(crate) fn new(call: Arc<ServerCall<M>>) -> Self {
        Self {
            call,
            terminated: Arc::new(AtomicBool::new(false)),
            attachments: Arc::new(Mutex::new(None)),
        }
    }

    /// Queue one response message.
    pub fn on_next(&self, value: M) {
        if self.is_terminated() {
            warn!(
                "response observer for {} already terminated; dropping message",
                self.call.method_name()
            );
            return;
        }
        self.call.write_message(value);
    }

    /// Complete the call with `OK`.
    pub fn on_completed(&self) { self.finish(Status::ok()); }

    /// Complete the call with a chosen status.
    pub fn on_completed_with(&self, status: Status) { self.finish(status); }

    /// Fail the call with `status`.
    pub fn on_error(&self, status: Status) { self.finish(status); }

    /// Extra metadata to send with the trailers.
    pub fn set_response_attachments(&self, attachments: Metadata) {
        *self
            .attachments
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(attachments);
    }

    /// Returns `true` once the peer cancelled the call.
    #[must_use]
    pub fn is_cancelled(&self) -> bool { self.call.cancellation().is_cancelled() }

    /// Token cancelled when the peer resets the stream.
    #[must_use]
    pub fn cancellation(&self) -> CancellationToken { self.call.cancellation() }

    /// Select the response compressor by encoding name.
    ///
    /// # Errors
    ///
    /// See [`ServerCall::set_compression`].
    pub fn set_compression(&self, name: &str) -> Result<(), CallError> {
        self.call.set_compression(name)
    }

    /// Leave inbound flow control to [`ResponseObserver::request`].
    pub fn disable_auto_request_n(&self) { self.call.disable_auto_request_n(); }

    #[must_use]
    pub fn is_auto_request_n(&self) -> bool { self.call.is_auto_request_n() }

    /// Ask the transport for `n` more inbound messages.
    pub fn request(&self, n: u32) { self.call.request_n(n); }

    /// Deadline parsed from the request headers.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> { self.call.timeout() }

    fn finish(&self, status: Status) {
        if self.terminated.swap(true, Ordering::AcqRel) {
            debug!(
                "response observer for {} already terminated; dropping {status}",
                self.call.method_name()
            );
            return;
        }
        let attachments = self
            .attachments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.call.close(status, attachments);
    }
}

impl<M: Payload> StreamObserver<M> for ResponseObserver<M> {
    fn on_next(&mut self, value: M) { ResponseObserver::on_next(self, value); }

    fn on_error(&mut self, status: Status) { ResponseObserver::on_error(self, status); }

    fn on_completed(&mut self) { ResponseObserver::on_completed(self); }
}
