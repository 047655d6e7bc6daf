//! Inbound frame state machine for one call.
//!
//! A [`CallListener`] receives decoded frames from the transport, fills in
//! the invocation and dispatches it to the invoker exactly once. When that
//! happens depends on the method's cadence:
//!
//! | cadence | dispatch trigger |
//! |---|---|
//! | unary, server-streaming | inbound half-close |
//! | client-, bidi-streaming | first decoded message |
//!
//! Failures while decoding a frame or running business callbacks are
//! contained here and turned into an `INTERNAL` close.

mod cadence;

use std::sync::Arc;

use cadence::Cadence;
use log::{debug, error};

use crate::{
    call::{CallError, ServerCall},
    codec::Payload,
    descriptor::MethodDescriptor,
    invocation::Invocation,
    invoker::InvokeError,
    metrics::{self, Direction},
    observer::ResponseObserver,
    panic::guard,
    status::Status,
};

/// Sink for the inbound side of a transport stream.
pub trait ServerStreamListener: Send {
    /// One complete inbound message, still packed.
    fn on_message(&mut self, message: &[u8]);

    /// The peer half-closed its side of the stream.
    fn on_complete(&mut self);

    /// The peer reset the stream.
    fn on_cancel_by_remote(&mut self, status: Status);
}

/// Where a listener is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenerState {
    /// Accepting frames; business logic not yet invoked.
    Receiving,
    /// Business logic has been invoked.
    Dispatched,
    /// Inbound side finished, failed or cancelled; further frames are
    /// ignored.
    Closed,
}

/// Listener bound to one call's cadence.
pub struct CallListener<M> {
    call: Arc<ServerCall<M>>,
    method: Arc<MethodDescriptor>,
    invocation: Option<Invocation<M>>,
    responder: ResponseObserver<M>,
    cadence: Cadence<M>,
    state: ListenerState,
}

impl<M: 'static> std::fmt::Debug for CallListener<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallListener")
            .field("method", &self.method.method_name())
            .field("rpc_type", &self.method.rpc_type())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<M: Payload> CallListener<M> {
    pub(crate) fn new(
        call: Arc<ServerCall<M>>,
        method: Arc<MethodDescriptor>,
        mut invocation: Invocation<M>,
    ) -> Result<Self, CallError> {
        call.codec().check_method(&method)?;
        let responder = ResponseObserver::new(Arc::clone(&call));
        let cadence = Cadence::for_rpc_type(method.rpc_type());
        if cadence.uses_responder() {
            invocation.set_responder(responder.clone());
        }
        Ok(Self {
            call,
            method,
            invocation: Some(invocation),
            responder,
            cadence,
            state: ListenerState::Receiving,
        })
    }

    #[must_use]
    pub fn state(&self) -> ListenerState { self.state }

    fn handle_message(&mut self, message: &[u8]) -> Result<(), Status> {
        let value = self
            .call
            .codec()
            .parse_request(&self.method, message)
            .map_err(|e| Status::internal().with_description("Server error").with_cause(e))?;
        metrics::inc_messages(Direction::Inbound);

        if !self.cadence.is_streaming() {
            match self.invocation.as_mut() {
                Some(invocation) if self.state == ListenerState::Receiving => {
                    invocation.set_arguments(value.into_arguments());
                }
                _ => debug!(
                    "ignoring message for {} after dispatch",
                    self.method.method_name()
                ),
            }
            return Ok(());
        }

        if self.state == ListenerState::Receiving {
            self.dispatch();
        }
        if self.state == ListenerState::Dispatched {
            self.cadence.forward(value);
            if self.call.is_auto_request_n() {
                self.call.request_n(1);
            }
        }
        Ok(())
    }

    fn dispatch(&mut self) {
        let Some(invocation) = self.invocation.take() else {
            return;
        };
        self.state = ListenerState::Dispatched;
        let invoker = Arc::clone(self.call.invoker());
        let result = guard(|| invoker.invoke(invocation))
            .unwrap_or_else(|panic| Err(InvokeError::Status(panic.into_status("Invoke failed"))));
        let outcome = match result {
            Ok(reply) => self
                .cadence
                .accept(reply, &self.responder, self.call.runtime()),
            Err(e) => Err(e.into_status()),
        };
        if let Err(status) = outcome {
            self.fail(status);
        }
    }

    fn fail(&mut self, status: Status) {
        error!(
            "{} call {}/{} failed: {status}",
            self.method.rpc_type(),
            self.call.service_name(),
            self.method.method_name()
        );
        metrics::inc_errors();
        self.state = ListenerState::Closed;
        self.invocation = None;
        self.responder.on_error(status);
    }
}

impl<M: Payload> ServerStreamListener for CallListener<M> {
    fn on_message(&mut self, message: &[u8]) {
        if self.state == ListenerState::Closed {
            debug!(
                "ignoring message for closed {} call",
                self.method.method_name()
            );
            return;
        }
        let outcome = guard(|| self.handle_message(message))
            .unwrap_or_else(|panic| Err(panic.into_status("Server error")));
        if let Err(status) = outcome {
            self.fail(status);
        }
    }

    fn on_complete(&mut self) {
        match self.state {
            ListenerState::Closed => return,
            ListenerState::Receiving => self.dispatch(),
            ListenerState::Dispatched => {}
        }
        if self.state != ListenerState::Dispatched {
            return;
        }
        if self.cadence.is_streaming() {
            if let Err(panic) = guard(|| self.cadence.complete_requests()) {
                self.fail(panic.into_status("Server error"));
                return;
            }
        }
        self.state = ListenerState::Closed;
    }

    fn on_cancel_by_remote(&mut self, status: Status) {
        self.call.cancel_by_remote(&status);
        let previous = std::mem::replace(&mut self.state, ListenerState::Closed);
        self.invocation = None;
        match previous {
            ListenerState::Receiving => debug!(
                "{} cancelled before dispatch",
                self.method.method_name()
            ),
            ListenerState::Dispatched if self.cadence.is_streaming() => {
                if let Err(panic) = guard(|| self.cadence.cancel_requests(status)) {
                    error!("request observer panicked on cancel: {panic}");
                }
            }
            ListenerState::Dispatched | ListenerState::Closed => {}
        }
    }
}
