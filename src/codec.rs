//! Message packing contract between the call and the serialization layer.
//!
//! The call never inspects message bytes itself. It asks a [`MessageCodec`]
//! to parse each inbound frame and to pack each outbound message, passing
//! the resolved [`MethodDescriptor`] so decoding is driven by the method's
//! declared types. [`BincodeCodec`] is the default implementation.

use bincode::config;
use bytes::Bytes;
use thiserror::Error;

use crate::{descriptor::MethodDescriptor, status::BoxError};

/// A value exchanged as a request argument or response message.
pub trait Payload: Send + 'static {
    /// Split a decoded request into positional arguments.
    ///
    /// The default treats the value as a single argument. Types that can
    /// carry a multi-argument payload return its elements instead, so an
    /// argument list of one array-like element cannot be told apart from a
    /// spread payload.
    fn into_arguments(self) -> Vec<Self>
    where
        Self: Sized,
    {
        vec![self]
    }
}

impl Payload for String {}

/// Errors raised while packing or parsing messages.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CodecError {
    /// An outbound message could not be serialized.
    #[error("failed to pack response: {0}")]
    Pack(#[source] BoxError),
    /// An inbound frame could not be deserialized.
    #[error("failed to parse request: {0}")]
    Parse(#[source] BoxError),
    /// The codec cannot handle the method's declared types.
    #[error("method {0} is not supported by the codec")]
    UnsupportedMethod(String),
}

/// Packs responses and parses requests for one message type.
pub trait MessageCodec<M>: Send + Sync + 'static {
    /// Check that the codec can serve `method` before a listener is built.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnsupportedMethod`] when the method's declared
    /// types cannot be handled.
    fn check_method(&self, _method: &MethodDescriptor) -> Result<(), CodecError> { Ok(()) }

    /// Parse one inbound frame.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Parse`] if the bytes are malformed.
    fn parse_request(&self, method: &MethodDescriptor, bytes: &[u8]) -> Result<M, CodecError>;

    /// Pack one outbound message. `Ok(None)` signals that there is nothing
    /// to send, which the call treats as a missing response.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Pack`] if the message cannot be serialized.
    fn pack_response(
        &self,
        method: &MethodDescriptor,
        message: &M,
    ) -> Result<Option<Bytes>, CodecError>;
}

/// Codec using `bincode` with its standard configuration.
#[derive(Clone, Copy, Debug, Default)]
pub struct BincodeCodec;

impl<M> MessageCodec<M> for BincodeCodec
where
    M: bincode::Encode + bincode::Decode<()> + Payload,
{
    fn parse_request(&self, _method: &MethodDescriptor, bytes: &[u8]) -> Result<M, CodecError> {
        bincode::decode_from_slice(bytes, config::standard())
            .map(|(message, _)| message)
            .map_err(|e| CodecError::Parse(Box::new(e)))
    }

    fn pack_response(
        &self,
        _method: &MethodDescriptor,
        message: &M,
    ) -> Result<Option<Bytes>, CodecError> {
        bincode::encode_to_vec(message, config::standard())
            .map(|bytes| Some(Bytes::from(bytes)))
            .map_err(|e| CodecError::Pack(Box::new(e)))
    }
}
