//! Error types for server call configuration and misuse.

use thiserror::Error;
use tokio::runtime::TryCurrentError;

use crate::codec::CodecError;

/// Errors raised synchronously to the caller of a [`super::ServerCall`]
/// operation. Failures that happen while a call is running are reported to
/// the peer as a status instead.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CallError {
    /// Compression was selected after the response headers went out.
    #[error("response headers already sent")]
    HeaderAlreadySent,
    /// No compressor is registered under the requested encoding name.
    #[error("unsupported compression encoding {0:?}")]
    UnsupportedCompression(String),
    /// No runtime handle was configured and none is current.
    #[error("no tokio runtime available to drive the call")]
    NoRuntime(#[from] TryCurrentError),
    /// The codec refused the resolved method.
    #[error(transparent)]
    Codec(#[from] CodecError),
}
