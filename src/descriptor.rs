//! Service and method descriptors resolved when a call starts.

use std::{fmt, sync::Arc};

/// The shape of an RPC: how many request and response messages it carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RpcType {
    /// One request, one response.
    Unary,
    /// One request, a stream of responses.
    ServerStream,
    /// A stream of requests, one response.
    ClientStream,
    /// Streams in both directions.
    BiStream,
}

impl RpcType {
    /// Whether requests arrive as a stream handed to business logic.
    #[must_use]
    pub fn is_request_stream(self) -> bool { matches!(self, Self::ClientStream | Self::BiStream) }

    /// Inbound frames requested from the transport as soon as the listener
    /// exists: the argument plus end-of-stream for single-request cadences,
    /// only the first argument for streaming ones.
    #[must_use]
    pub fn initial_request_n(self) -> u32 {
        if self.is_request_stream() { 1 } else { 2 }
    }
}

impl fmt::Display for RpcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unary => "UNARY",
            Self::ServerStream => "SERVER_STREAM",
            Self::ClientStream => "CLIENT_STREAM",
            Self::BiStream => "BI_STREAM",
        })
    }
}

/// Describes one method of a service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodDescriptor {
    method_name: String,
    rpc_type: RpcType,
    parameter_types: Vec<String>,
    return_types: Vec<String>,
}

impl MethodDescriptor {
    #[must_use]
    pub fn new(method_name: impl Into<String>, rpc_type: RpcType) -> Self {
        Self {
            method_name: method_name.into(),
            rpc_type,
            parameter_types: Vec::new(),
            return_types: Vec::new(),
        }
    }

    /// Declare the parameter type names, in positional order.
    #[must_use]
    pub fn with_parameter_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameter_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Declare the return type names.
    #[must_use]
    pub fn with_return_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.return_types = types.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn method_name(&self) -> &str { &self.method_name }

    #[must_use]
    pub fn rpc_type(&self) -> RpcType { self.rpc_type }

    #[must_use]
    pub fn parameter_types(&self) -> &[String] { &self.parameter_types }

    #[must_use]
    pub fn return_types(&self) -> &[String] { &self.return_types }
}

/// Describes a service interface and its methods.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceDescriptor {
    interface_name: String,
    methods: Vec<Arc<MethodDescriptor>>,
}

impl ServiceDescriptor {
    #[must_use]
    pub fn new(interface_name: impl Into<String>) -> Self {
        Self {
            interface_name: interface_name.into(),
            methods: Vec::new(),
        }
    }

    /// Add a method to the service.
    #[must_use]
    pub fn with_method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(Arc::new(method));
        self
    }

    #[must_use]
    pub fn interface_name(&self) -> &str { &self.interface_name }

    /// Resolve a method by name. Overloads are not distinguished; the first
    /// registered method with the name wins.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<Arc<MethodDescriptor>> {
        self.methods
            .iter()
            .find(|m| m.method_name() == name)
            .map(Arc::clone)
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.methods.iter().map(AsRef::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(RpcType::Unary, 2)]
    #[case(RpcType::ServerStream, 2)]
    #[case(RpcType::ClientStream, 1)]
    #[case(RpcType::BiStream, 1)]
    fn initial_request_counts(#[case] rpc_type: RpcType, #[case] expected: u32) {
        assert_eq!(rpc_type.initial_request_n(), expected);
    }

    #[test]
    fn resolves_first_method_by_name() {
        let service = ServiceDescriptor::new("Greeter")
            .with_method(
                MethodDescriptor::new("sayHello", RpcType::Unary).with_parameter_types(["String"]),
            )
            .with_method(MethodDescriptor::new("sayHello", RpcType::BiStream));
        let method = service.method("sayHello").expect("method present");
        assert_eq!(method.rpc_type(), RpcType::Unary);
        assert_eq!(method.parameter_types(), ["String".to_owned()]);
        assert!(service.method("missing").is_none());
        assert_eq!(service.methods().count(), 2);
    }
}
