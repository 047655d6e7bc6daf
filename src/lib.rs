#![doc(html_root_url = "https://docs.rs/tricall/latest")]
//! Server-side lifecycle of a single RPC call.
//!
//! This crate drives one call over a multiplexed HTTP/2-style stream with
//! gRPC-compatible wire semantics: header and compression negotiation,
//! cadence-aware dispatch of inbound messages, ordered outbound writes and
//! protocol-correct status trailers. The transport, the business invoker,
//! the message codec and the compression algorithms are supplied by the
//! embedding server through the traits in [`stream`], [`invoker`], [`codec`]
//! and [`compressor`].

pub mod call;
pub mod codec;
pub mod compressor;
pub mod descriptor;
pub mod invocation;
pub mod invoker;
pub mod listener;
pub mod metadata;
pub mod metrics;
pub mod observer;
pub mod panic;
pub mod prelude;
pub mod serial;
pub mod status;
pub mod stream;
pub mod timeout;
pub mod trailers;

pub use call::{CallError, ServerCall, ServerCallBuilder};
pub use codec::{BincodeCodec, CodecError, MessageCodec, Payload};
pub use listener::{CallListener, ListenerState, ServerStreamListener};
pub use metadata::Metadata;
pub use metrics::{CALLS_CLOSED, CALLS_STARTED, Direction, ERRORS_TOTAL, MESSAGES, TASK_PANICS};
pub use status::{Code, Status};
