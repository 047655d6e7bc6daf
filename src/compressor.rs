//! Response compressors and the name-keyed registry used to select them.
//!
//! Compression algorithms live outside this crate; only [`Identity`] is
//! built in. Applications register further [`Compressor`]s with a
//! [`CompressorRegistry`] shared across calls.

use std::{io, sync::Arc};

use bytes::Bytes;
use dashmap::DashMap;

/// Message encoding name of the no-op compressor.
pub const IDENTITY_ENCODING: &str = "identity";

/// A message compressor selected by its `grpc-encoding` name.
pub trait Compressor: Send + Sync + 'static {
    /// Encoding name advertised in the `grpc-encoding` header.
    fn message_encoding(&self) -> &str;

    /// Compress one packed message.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the payload cannot be compressed.
    fn compress(&self, payload: Bytes) -> io::Result<Bytes>;

    /// Whether this compressor leaves payloads untouched. Messages written
    /// through an identity compressor carry a cleared compressed flag.
    fn is_identity(&self) -> bool { self.message_encoding() == IDENTITY_ENCODING }
}

/// The no-op compressor.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl Compressor for Identity {
    fn message_encoding(&self) -> &str { IDENTITY_ENCODING }

    fn compress(&self, payload: Bytes) -> io::Result<Bytes> { Ok(payload) }
}

/// Concurrent registry of compressors keyed by encoding name.
///
/// ```
/// use tricall::compressor::{CompressorRegistry, IDENTITY_ENCODING};
///
/// let registry = CompressorRegistry::default();
/// assert!(registry.lookup(IDENTITY_ENCODING).is_some());
/// assert!(registry.lookup("gzip").is_none());
/// ```
pub struct CompressorRegistry(DashMap<String, Arc<dyn Compressor>>);

impl Default for CompressorRegistry {
    fn default() -> Self {
        let registry = Self(DashMap::new());
        registry.register(Arc::new(Identity));
        registry
    }
}

impl CompressorRegistry {
    /// Registry containing only [`Identity`].
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Add or replace a compressor under its encoding name.
    pub fn register(&self, compressor: Arc<dyn Compressor>) {
        self.0
            .insert(compressor.message_encoding().to_owned(), compressor);
    }

    /// Find the compressor for `name`.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Compressor>> {
        self.0.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Comma-separated, sorted list of registered encodings, suitable for
    /// advertising as the accepted encodings.
    #[must_use]
    pub fn accept_encoding(&self) -> String {
        let mut names: Vec<String> = self.0.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names.join(",")
    }
}

impl std::fmt::Debug for CompressorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CompressorRegistry")
            .field(&self.accept_encoding())
            .finish()
    }
}
