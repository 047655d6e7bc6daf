//! Builder for configuring a server call.

use std::sync::{Arc, Weak};

use tokio::runtime::Handle;

use super::{CallError, ServerCall};
use crate::{
    codec::{MessageCodec, Payload},
    compressor::CompressorRegistry,
    descriptor::ServiceDescriptor,
    invoker::Invoker,
    serial::SerialExecutor,
    stream::ServerStream,
};

/// Builder for [`ServerCall`].
///
/// Without a service descriptor every call is answered with
/// `UNIMPLEMENTED`. The compressor registry defaults to one holding only
/// the identity encoding, no `accept-encoding` header is advertised, and
/// the serializer runs on the current tokio runtime unless a handle is
/// supplied. Construct via [`ServerCall::builder`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use tricall::{
///     call::ServerCall,
///     codec::BincodeCodec,
///     descriptor::{MethodDescriptor, RpcType, ServiceDescriptor},
///     invoker::{InvokeError, Reply},
///     invocation::Invocation,
/// };
/// # use tricall::{metadata::Metadata, status::Status, stream::ServerStream};
/// # struct Sink;
/// # impl ServerStream for Sink {
/// #     fn remote_address(&self) -> Option<std::net::SocketAddr> { None }
/// #     fn send_header(&self, _: Metadata) {}
/// #     fn send_header_with_eos(&self, _: Metadata) {}
/// #     fn write_message(&self, _: bytes::Bytes, _: bool) {}
/// #     fn close(&self, _: Status, _: Metadata) {}
/// #     fn request_n(&self, _: u32) {}
/// # }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let service = ServiceDescriptor::new("Greeter")
///     .with_method(MethodDescriptor::new("sayHello", RpcType::Unary));
/// let invoker = |inv: Invocation<String>| -> Result<Reply<String>, InvokeError> {
///     Ok(Reply::Value(format!("Hello {}", inv.arguments().join(" "))))
/// };
/// let call = ServerCall::<String>::builder(Arc::new(Sink), invoker, BincodeCodec)
///     .service(service)
///     .method_name("sayHello")
///     .build()
///     .expect("failed to build call");
/// assert_eq!(call.service_name(), "Greeter");
/// # }
/// ```
pub struct ServerCallBuilder<M> {
    stream: Arc<dyn ServerStream>,
    invoker: Arc<dyn Invoker<M>>,
    codec: Arc<dyn MessageCodec<M>>,
    service: Option<ServiceDescriptor>,
    service_name: Option<String>,
    method_name: String,
    compressors: Option<Arc<CompressorRegistry>>,
    accept_encoding: Option<String>,
    advertise_compressors: bool,
    runtime: Option<Handle>,
}

impl<M: 'static> std::fmt::Debug for ServerCallBuilder<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerCallBuilder")
            .field("service", &self.service)
            .field("service_name", &self.service_name)
            .field("method_name", &self.method_name)
            .field("accept_encoding", &self.accept_encoding)
            .finish_non_exhaustive()
    }
}

impl<M: Payload> ServerCallBuilder<M> {
    pub(super) fn new(
        stream: Arc<dyn ServerStream>,
        invoker: Arc<dyn Invoker<M>>,
        codec: Arc<dyn MessageCodec<M>>,
    ) -> Self {
        Self {
            stream,
            invoker,
            codec,
            service: None,
            service_name: None,
            method_name: String::new(),
            compressors: None,
            accept_encoding: None,
            advertise_compressors: false,
            runtime: None,
        }
    }

    /// Service the call targets. Also sets the service name unless one was
    /// given explicitly.
    #[must_use]
    pub fn service(mut self, service: ServiceDescriptor) -> Self {
        self.service = Some(service);
        self
    }

    /// Service name taken from the request path.
    #[must_use]
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Method name taken from the request path.
    #[must_use]
    pub fn method_name(mut self, name: impl Into<String>) -> Self {
        self.method_name = name.into();
        self
    }

    /// Registry used to resolve compressor names.
    #[must_use]
    pub fn compressors(mut self, registry: Arc<CompressorRegistry>) -> Self {
        self.compressors = Some(registry);
        self
    }

    /// Value of the `accept-encoding` response header. `None` omits it.
    #[must_use]
    pub fn accept_encoding(mut self, accept: Option<String>) -> Self {
        self.accept_encoding = accept;
        self
    }

    /// Advertise every registered encoding in `accept-encoding`.
    #[must_use]
    pub fn advertise_compressors(mut self) -> Self {
        self.advertise_compressors = true;
        self
    }

    /// Runtime driving the call's serializer and pending replies.
    #[must_use]
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Build the call and start its serializer.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::NoRuntime`] if no runtime handle was configured
    /// and the builder is not running inside a tokio runtime.
    pub fn build(self) -> Result<Arc<ServerCall<M>>, CallError> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current()?,
        };
        let compressors = self.compressors.unwrap_or_default();
        let accept_encoding = if self.advertise_compressors {
            Some(compressors.accept_encoding())
        } else {
            self.accept_encoding
        };
        let service_name = self
            .service_name
            .or_else(|| self.service.as_ref().map(|s| s.interface_name().to_owned()))
            .unwrap_or_default();
        let service = self.service.map(Arc::new);

        Ok(Arc::new_cyclic(|weak: &Weak<ServerCall<M>>| {
            let weak = weak.clone();
            let executor = SerialExecutor::with_panic_hook(&runtime, move |panic| {
                if let Some(call) = weak.upgrade() {
                    call.close_after_panic(panic.into_status("Server error"));
                }
            });
            ServerCall::new(super::Parts {
                stream: self.stream,
                invoker: self.invoker,
                codec: self.codec,
                compressors,
                service,
                service_name,
                method_name: self.method_name,
                accept_encoding,
                executor,
                runtime,
            })
        }))
    }
}
