//! Test support for driving a [`ServerCall`](tricall::ServerCall) without a
//! real transport.
//!
//! [`RecordingStream`] stands in for the HTTP/2 stream and records every
//! frame the call emits, in order. [`TestMessage`] is a bincode payload that
//! can carry several positional arguments, and [`greeter`] describes a
//! service with one method per cadence.
//!
//! ```rust
//! use tricall_testing::{RecordingStream, TestMessage, encode};
//!
//! let stream = RecordingStream::new();
//! assert!(stream.events().is_empty());
//! assert!(!encode(&TestMessage::text("world")).is_empty());
//! ```

pub mod compressor;
pub mod logging;
pub mod message;
pub mod stream;

pub use compressor::{FailingCompressor, ReverseCompressor};
pub use logging::{LoggerHandle, logger};
pub use message::{TestMessage, decode, encode, greeter};
pub use stream::{RecordingStream, StreamEvent};
