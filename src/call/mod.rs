//! Server side of one RPC call.
//!
//! [`ServerCall`] owns the header, compression and close state of a call.
//! The transport starts it with the request headers and receives a
//! [`CallListener`] as the sink for inbound frames. Business logic and the
//! listener emit responses through [`ServerCall::write_message`] and
//! [`ServerCall::close`], which run in submission order on the call's
//! [`SerialExecutor`].
//!
//! State transitions are made under one mutex so the header-sent and closed
//! flags are checked and set atomically with respect to the transport I/O
//! they guard. Queued work holds that lock while it talks to the transport.

mod builder;
mod error;

use std::{
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        OnceLock,
        PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

pub use builder::ServerCallBuilder;
pub use error::CallError;
use log::{debug, error, warn};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::{
    codec::{MessageCodec, Payload},
    compressor::{Compressor, CompressorRegistry},
    descriptor::{MethodDescriptor, ServiceDescriptor},
    invocation::InvocationBuilder,
    invoker::Invoker,
    listener::CallListener,
    metadata::{Metadata, headers},
    metrics::{self, Direction},
    serial::SerialExecutor,
    status::{Code, Status},
    stream::ServerStream,
    timeout::parse_timeout_millis,
    trailers,
};

#[derive(Default)]
struct CallState {
    header_sent: bool,
    closed: bool,
    compressor: Option<Arc<dyn Compressor>>,
    timeout: Option<Duration>,
    request_encoding: Option<String>,
}

struct Parts<M> {
    stream: Arc<dyn ServerStream>,
    invoker: Arc<dyn Invoker<M>>,
    codec: Arc<dyn MessageCodec<M>>,
    compressors: Arc<CompressorRegistry>,
    service: Option<Arc<ServiceDescriptor>>,
    service_name: String,
    method_name: String,
    accept_encoding: Option<String>,
    executor: SerialExecutor,
    runtime: Handle,
}

/// One RPC in progress on the server.
pub struct ServerCall<M> {
    stream: Arc<dyn ServerStream>,
    invoker: Arc<dyn Invoker<M>>,
    codec: Arc<dyn MessageCodec<M>>,
    compressors: Arc<CompressorRegistry>,
    service: Option<Arc<ServiceDescriptor>>,
    service_name: String,
    method_name: String,
    accept_encoding: Option<String>,
    executor: SerialExecutor,
    runtime: Handle,
    cancellation: CancellationToken,
    auto_request_n: AtomicBool,
    method: OnceLock<Arc<MethodDescriptor>>,
    state: Mutex<CallState>,
}

impl<M: 'static> std::fmt::Debug for ServerCall<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerCall")
            .field("service_name", &self.service_name)
            .field("method_name", &self.method_name)
            .field("header_sent", &self.is_header_sent())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl<M: 'static> ServerCall<M> {
    fn lock_state(&self) -> MutexGuard<'_, CallState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Service name from the request path.
    #[must_use]
    pub fn service_name(&self) -> &str { &self.service_name }

    /// Method name from the request path.
    #[must_use]
    pub fn method_name(&self) -> &str { &self.method_name }

    /// Method resolved by [`ServerCall::start_call`].
    #[must_use]
    pub fn method(&self) -> Option<&Arc<MethodDescriptor>> { self.method.get() }

    /// Deadline from the `grpc-timeout` header. Enforcement is left to the
    /// embedding scheduler.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> { self.lock_state().timeout }

    /// Encoding named by the request's `grpc-encoding` header.
    #[must_use]
    pub fn request_encoding(&self) -> Option<String> { self.lock_state().request_encoding.clone() }

    #[must_use]
    pub fn is_header_sent(&self) -> bool { self.lock_state().header_sent }

    /// Returns `true` once a terminal frame was sent or the peer cancelled.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.lock_state().closed }

    /// Token cancelled when the peer resets the stream.
    #[must_use]
    pub fn cancellation(&self) -> CancellationToken { self.cancellation.clone() }

    /// Stop requesting inbound messages automatically after each one is
    /// delivered to business logic.
    pub fn disable_auto_request_n(&self) { self.auto_request_n.store(false, Ordering::Release); }

    #[must_use]
    pub fn is_auto_request_n(&self) -> bool { self.auto_request_n.load(Ordering::Acquire) }

    /// Ask the transport for `n` more inbound messages.
    pub fn request_n(&self, n: u32) { self.stream.request_n(n); }

    /// Select the response compressor by encoding name.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::UnsupportedCompression`] if no compressor is
    /// registered under `name` and [`CallError::HeaderAlreadySent`] once the
    /// response headers have gone out.
    pub fn set_compression(&self, name: &str) -> Result<(), CallError> {
        let compressor = self
            .compressors
            .lookup(name)
            .ok_or_else(|| CallError::UnsupportedCompression(name.to_owned()))?;
        let mut state = self.lock_state();
        if state.header_sent {
            return Err(CallError::HeaderAlreadySent);
        }
        state.compressor = Some(compressor);
        Ok(())
    }

    /// Close the call without queueing, answering with `status` in a single
    /// header frame that ends the stream. Used when the call fails before any
    /// response header was sent. Once the headers are out the status is sent
    /// as trailers instead. Does nothing if the call is already closed.
    pub fn response_err(&self, status: Status) {
        let mut state = self.lock_state();
        if state.closed {
            debug!(
                "call {}/{} already closed; dropping {status}",
                self.service_name, self.method_name
            );
            return;
        }
        if state.header_sent {
            self.close_locked(&mut state, status, None);
            return;
        }
        state.closed = true;
        error!(
            "call {}/{} failed before response headers: {status}",
            self.service_name, self.method_name
        );
        metrics::inc_closed(status.code());
        self.stream
            .send_header_with_eos(trailers::error_headers(&status));
    }

    /// Wait until every write and close submitted before this call has been
    /// handed to the transport.
    pub async fn flush(&self) { self.executor.flush().await; }

    pub(crate) fn invoker(&self) -> &Arc<dyn Invoker<M>> { &self.invoker }

    pub(crate) fn codec(&self) -> &Arc<dyn MessageCodec<M>> { &self.codec }

    pub(crate) fn runtime(&self) -> &Handle { &self.runtime }

    /// The peer reset the stream. No terminal frame is owed afterwards.
    pub(crate) fn cancel_by_remote(&self, status: &Status) {
        self.cancellation.cancel();
        let mut state = self.lock_state();
        if state.closed {
            return;
        }
        state.closed = true;
        metrics::inc_closed(Code::Cancelled);
        debug!(
            "call {}/{} cancelled by remote: {status}",
            self.service_name, self.method_name
        );
    }

    fn close_after_panic(&self, status: Status) {
        let mut state = self.lock_state();
        self.close_locked(&mut state, status, None);
    }

    fn send_header_locked(&self, state: &mut CallState) {
        if state.header_sent {
            return;
        }
        state.header_sent = true;
        let encoding = state
            .compressor
            .as_ref()
            .map(|c| c.message_encoding().to_owned());
        self.stream.send_header(trailers::response_headers(
            self.accept_encoding.as_deref(),
            encoding.as_deref(),
        ));
    }

    fn close_locked(&self, state: &mut CallState, status: Status, attachments: Option<&Metadata>) {
        if state.closed {
            debug!(
                "call {}/{} already closed; dropping {status}",
                self.service_name, self.method_name
            );
            return;
        }
        self.send_header_locked(state);
        state.closed = true;
        metrics::inc_closed(status.code());
        let trailers = trailers::trailers(&status, attachments);
        self.stream.close(status, trailers);
    }

    fn write_locked(&self, state: &mut CallState, message: &M) {
        if state.closed {
            debug!(
                "call {}/{} closed; dropping response message",
                self.service_name, self.method_name
            );
            return;
        }
        let Some(method) = self.method.get() else {
            self.close_locked(
                state,
                Status::internal().with_description("Method not resolved"),
                None,
            );
            return;
        };
        self.send_header_locked(state);

        let packed = match self.codec.pack_response(method, message) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                self.close_locked(
                    state,
                    Status::internal().with_description("Missing response"),
                    None,
                );
                return;
            }
            Err(e) => {
                error!(
                    "failed to serialize response for {}/{}: {e}",
                    self.service_name, self.method_name
                );
                metrics::inc_errors();
                self.close_locked(
                    state,
                    Status::internal()
                        .with_description("Serialize response failed")
                        .with_cause(e),
                    None,
                );
                return;
            }
        };

        let compressor = state.compressor.clone();
        let (payload, compressed) = match compressor {
            None => (packed, false),
            Some(compressor) => match compressor.compress(packed) {
                Ok(bytes) => (bytes, !compressor.is_identity()),
                Err(e) => {
                    error!(
                        "failed to compress response for {}/{} with {}: {e}",
                        self.service_name,
                        self.method_name,
                        compressor.message_encoding()
                    );
                    metrics::inc_errors();
                    self.close_locked(
                        state,
                        Status::internal()
                            .with_description("Compress response failed")
                            .with_cause(e),
                        None,
                    );
                    return;
                }
            },
        };
        self.stream.write_message(payload, compressed);
        metrics::inc_messages(Direction::Outbound);
    }
}

impl<M: Payload> ServerCall<M> {
    /// Start configuring a call on `stream`.
    pub fn builder<S, I, C>(stream: Arc<S>, invoker: I, codec: C) -> ServerCallBuilder<M>
    where
        S: ServerStream,
        I: Invoker<M>,
        C: MessageCodec<M>,
    {
        ServerCallBuilder::new(stream, Arc::new(invoker), Arc::new(codec))
    }

    fn new(parts: Parts<M>) -> Self {
        Self {
            stream: parts.stream,
            invoker: parts.invoker,
            codec: parts.codec,
            compressors: parts.compressors,
            service: parts.service,
            service_name: parts.service_name,
            method_name: parts.method_name,
            accept_encoding: parts.accept_encoding,
            executor: parts.executor,
            runtime: parts.runtime,
            cancellation: CancellationToken::new(),
            auto_request_n: AtomicBool::new(true),
            method: OnceLock::new(),
            state: Mutex::new(CallState::default()),
        }
    }

    /// Resolve the target method and build the listener for inbound frames.
    ///
    /// Returns `None` after answering with an early error when the service
    /// or method is unknown or the listener cannot be built; the transport
    /// must then treat the call as terminated. A malformed `grpc-timeout`
    /// header is logged and ignored.
    pub fn start_call(self: &Arc<Self>, request_headers: &Metadata) -> Option<CallListener<M>> {
        metrics::inc_calls();
        let Some(service) = self.service.clone() else {
            self.response_err(
                Status::unimplemented()
                    .with_description(format!("Service not found:{}", self.service_name)),
            );
            return None;
        };
        let Some(method) = service.method(&self.method_name) else {
            self.response_err(Status::unimplemented().with_description(format!(
                "Method : {} not found of service:{}",
                self.method_name, self.service_name
            )));
            return None;
        };
        self.record_request_headers(request_headers);
        if self.method.set(Arc::clone(&method)).is_err() {
            warn!(
                "call {}/{} started more than once",
                self.service_name, self.method_name
            );
            return None;
        }

        let invocation = InvocationBuilder::new(&service, &method)
            .remote_address(self.stream.remote_address())
            .cancellation(self.cancellation())
            .timeout(self.timeout())
            .build(request_headers);
        match CallListener::new(Arc::clone(self), Arc::clone(&method), invocation) {
            Ok(listener) => {
                self.request_n(method.rpc_type().initial_request_n());
                Some(listener)
            }
            Err(e) => {
                error!(
                    "failed to create {} listener for {}/{}: {e}",
                    method.rpc_type(),
                    self.service_name,
                    self.method_name
                );
                self.response_err(
                    Status::internal()
                        .with_description("Create stream failed")
                        .with_cause(e),
                );
                None
            }
        }
    }

    /// Queue one response message for packing, compression and transmission.
    ///
    /// Returns immediately. The message is dropped if the call is closed by
    /// the time it is processed; packing or compression failures close the
    /// call with `INTERNAL`.
    pub fn write_message(self: &Arc<Self>, message: M) {
        let call = Arc::clone(self);
        self.executor.execute(move || {
            let mut state = call.lock_state();
            call.write_locked(&mut state, &message);
        });
    }

    /// Queue closing the call with `status`. Response headers are sent first
    /// if they have not gone out. Only the first close takes effect.
    pub fn close(self: &Arc<Self>, status: Status, attachments: Option<Metadata>) {
        let call = Arc::clone(self);
        self.executor.execute(move || {
            let mut state = call.lock_state();
            call.close_locked(&mut state, status, attachments.as_ref());
        });
    }

    fn record_request_headers(&self, request_headers: &Metadata) {
        let timeout = request_headers
            .get(headers::GRPC_TIMEOUT)
            .and_then(|raw| match parse_timeout_millis(raw) {
                Ok(millis) => millis.map(Duration::from_millis),
                Err(e) => {
                    warn!(
                        "ignoring grpc-timeout for {}/{}: {e}",
                        self.service_name, self.method_name
                    );
                    None
                }
            });
        let mut state = self.lock_state();
        state.timeout = timeout;
        state.request_encoding = request_headers.get(headers::GRPC_ENCODING).map(str::to_owned);
    }
}
