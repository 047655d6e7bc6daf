//! Dispatch-ready descriptions of business calls.
//!
//! [`InvocationBuilder`] turns decoded request headers and the resolved
//! descriptors into an [`Invocation`]. Listeners fill in the arguments as
//! messages arrive and hand the invocation to the invoker by value.

use std::{net::SocketAddr, time::Duration};

use tokio_util::sync::CancellationToken;

use crate::{
    descriptor::{MethodDescriptor, ServiceDescriptor},
    metadata::{Metadata, headers},
    observer::ResponseObserver,
};

/// Attribute name under which the peer address is reported.
pub const REMOTE_ADDRESS_KEY: &str = "tri.remote.address";

/// Everything the invoker needs to run one business call.
pub struct Invocation<M> {
    service_name: String,
    method_name: String,
    service_key: String,
    parameter_types: Vec<String>,
    return_types: Vec<String>,
    arguments: Vec<M>,
    attachments: Metadata,
    remote_address: Option<SocketAddr>,
    consumer_app_name: Option<String>,
    cancellation: CancellationToken,
    timeout: Option<Duration>,
    responder: Option<ResponseObserver<M>>,
}

impl<M: 'static> Invocation<M> {
    /// Interface name of the target service.
    #[must_use]
    pub fn service_name(&self) -> &str { &self.service_name }

    #[must_use]
    pub fn method_name(&self) -> &str { &self.method_name }

    /// `group/interface:version`, omitting absent parts.
    #[must_use]
    pub fn service_key(&self) -> &str { &self.service_key }

    #[must_use]
    pub fn parameter_types(&self) -> &[String] { &self.parameter_types }

    #[must_use]
    pub fn return_types(&self) -> &[String] { &self.return_types }

    #[must_use]
    pub fn arguments(&self) -> &[M] { &self.arguments }

    /// Take ownership of the positional arguments.
    pub fn take_arguments(&mut self) -> Vec<M> { std::mem::take(&mut self.arguments) }

    /// Request headers with protocol-reserved names removed.
    #[must_use]
    pub fn attachments(&self) -> &Metadata { &self.attachments }

    #[must_use]
    pub fn remote_address(&self) -> Option<SocketAddr> { self.remote_address }

    /// Value of the `tri-consumer-appname` header, when the caller sent one.
    #[must_use]
    pub fn consumer_app_name(&self) -> Option<&str> { self.consumer_app_name.as_deref() }

    /// Token cancelled when the peer resets the stream. Long-running or
    /// pending work should stop once it fires.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken { &self.cancellation }

    /// Deadline from the `grpc-timeout` request header.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> { self.timeout }

    /// Response sink for streaming cadences. Unary invocations reply through
    /// their return value instead and carry no responder.
    pub fn take_responder(&mut self) -> Option<ResponseObserver<M>> { self.responder.take() }

    pub(crate) fn set_arguments(&mut self, arguments: Vec<M>) { self.arguments = arguments; }

    pub(crate) fn set_responder(&mut self, responder: ResponseObserver<M>) {
        self.responder = Some(responder);
    }
}

impl<M: 'static> std::fmt::Debug for Invocation<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("service_key", &self.service_key)
            .field("method_name", &self.method_name)
            .field("arguments", &self.arguments.len())
            .field("attachments", &self.attachments)
            .field(REMOTE_ADDRESS_KEY, &self.remote_address)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Builds an [`Invocation`] from request headers.
///
/// ```
/// use tricall::{
///     descriptor::{MethodDescriptor, RpcType, ServiceDescriptor},
///     invocation::InvocationBuilder,
///     metadata::Metadata,
/// };
///
/// let service = ServiceDescriptor::new("Greeter");
/// let method = MethodDescriptor::new("sayHello", RpcType::Unary);
/// let headers: Metadata = [("tri-service-version", "1.0.0")].into_iter().collect();
/// let invocation = InvocationBuilder::new(&service, &method).build::<String>(&headers);
/// assert_eq!(invocation.service_key(), "Greeter:1.0.0");
/// ```
#[derive(Debug)]
pub struct InvocationBuilder<'a> {
    service: &'a ServiceDescriptor,
    method: &'a MethodDescriptor,
    remote_address: Option<SocketAddr>,
    cancellation: Option<CancellationToken>,
    timeout: Option<Duration>,
}

impl<'a> InvocationBuilder<'a> {
    #[must_use]
    pub fn new(service: &'a ServiceDescriptor, method: &'a MethodDescriptor) -> Self {
        Self {
            service,
            method,
            remote_address: None,
            cancellation: None,
            timeout: None,
        }
    }

    /// Record the caller's network address.
    #[must_use]
    pub fn remote_address(mut self, addr: Option<SocketAddr>) -> Self {
        self.remote_address = addr;
        self
    }

    /// Share the call's cancellation token with business logic. Without one
    /// the invocation gets a token that never fires.
    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the invocation with an empty argument list.
    #[must_use]
    pub fn build<M>(self, request_headers: &Metadata) -> Invocation<M> {
        let interface = self.service.interface_name();
        Invocation {
            service_name: interface.to_owned(),
            method_name: self.method.method_name().to_owned(),
            service_key: service_key(
                request_headers.get(headers::SERVICE_GROUP),
                interface,
                request_headers.get(headers::SERVICE_VERSION),
            ),
            parameter_types: self.method.parameter_types().to_vec(),
            return_types: self.method.return_types().to_vec(),
            arguments: Vec::new(),
            attachments: request_headers.without_reserved(),
            remote_address: self.remote_address,
            consumer_app_name: request_headers
                .get(headers::CONSUMER_APP_NAME)
                .map(str::to_owned),
            cancellation: self.cancellation.unwrap_or_default(),
            timeout: self.timeout,
            responder: None,
        }
    }
}

fn service_key(group: Option<&str>, interface: &str, version: Option<&str>) -> String {
    let mut key = String::with_capacity(interface.len() + 16);
    if let Some(group) = group.filter(|g| !g.is_empty()) {
        key.push_str(group);
        key.push('/');
    }
    key.push_str(interface);
    if let Some(version) = version.filter(|v| !v.is_empty()) {
        key.push(':');
        key.push_str(version);
    }
    key
}
