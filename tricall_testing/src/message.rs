//! Test payloads and a service with one method per cadence.

use bincode::config;
use tricall::{
    codec::Payload,
    descriptor::{MethodDescriptor, RpcType, ServiceDescriptor},
};

/// Bincode payload used by the integration tests.
#[derive(Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub enum TestMessage {
    /// A single text value.
    Text(String),
    /// Several positional arguments sent as one payload.
    Args(Vec<TestMessage>),
}

impl TestMessage {
    pub fn text(value: impl Into<String>) -> Self { Self::Text(value.into()) }

    /// The text of a [`TestMessage::Text`], or `None` for argument lists.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Args(_) => None,
        }
    }
}

impl Payload for TestMessage {
    fn into_arguments(self) -> Vec<Self> {
        match self {
            Self::Args(args) => args,
            single @ Self::Text(_) => vec![single],
        }
    }
}

/// Encode `message` the way `BincodeCodec` does.
///
/// # Panics
///
/// Panics if encoding fails.
#[must_use]
pub fn encode(message: &TestMessage) -> Vec<u8> {
    bincode::encode_to_vec(message, config::standard()).expect("encode TestMessage")
}

/// Decode bytes written by `BincodeCodec`.
///
/// # Panics
///
/// Panics if `bytes` is not an encoded [`TestMessage`].
#[must_use]
pub fn decode(bytes: &[u8]) -> TestMessage {
    let (message, _) =
        bincode::decode_from_slice(bytes, config::standard()).expect("decode TestMessage");
    message
}

/// `Greeter` service: `sayHello` (unary), `streamHello` (server-streaming),
/// `collectHello` (client-streaming) and `chat` (bidi-streaming).
#[must_use]
pub fn greeter() -> ServiceDescriptor {
    let method = |name: &str, rpc_type: RpcType| {
        MethodDescriptor::new(name, rpc_type)
            .with_parameter_types(["String"])
            .with_return_types(["String"])
    };
    ServiceDescriptor::new("Greeter")
        .with_method(method("sayHello", RpcType::Unary))
        .with_method(method("streamHello", RpcType::ServerStream))
        .with_method(method("collectHello", RpcType::ClientStream))
        .with_method(method("chat", RpcType::BiStream))
}
