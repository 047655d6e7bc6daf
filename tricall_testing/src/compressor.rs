//! Compressors with easily predicted output.

use std::io;

use bytes::Bytes;
use tricall::compressor::Compressor;

/// Non-identity compressor that reverses the payload.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReverseCompressor;

impl ReverseCompressor {
    pub const ENCODING: &'static str = "reverse";
}

impl Compressor for ReverseCompressor {
    fn message_encoding(&self) -> &str { Self::ENCODING }

    fn compress(&self, payload: Bytes) -> io::Result<Bytes> {
        let mut bytes = payload.to_vec();
        bytes.reverse();
        Ok(Bytes::from(bytes))
    }
}

/// Compressor that always fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingCompressor;

impl FailingCompressor {
    pub const ENCODING: &'static str = "broken";
}

impl Compressor for FailingCompressor {
    fn message_encoding(&self) -> &str { Self::ENCODING }

    fn compress(&self, _payload: Bytes) -> io::Result<Bytes> {
        Err(io::Error::other("compressor out of order"))
    }
}
