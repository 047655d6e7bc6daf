//! Optional convenience imports for implementing services.
//!
//! Prefer importing specialised APIs directly from their owning modules.
//!
//! # Examples
//!
//! ```
//! use tricall::prelude::*;
//!
//! fn greet(mut inv: Invocation<String>) -> Result<Reply<String>, InvokeError> {
//!     let name = inv.take_arguments().pop().unwrap_or_default();
//!     Ok(Reply::Value(format!("Hello {name}")))
//! }
//! # let _ = greet;
//! ```

pub use crate::{
    call::{CallError, ServerCall},
    codec::{BincodeCodec, MessageCodec, Payload},
    descriptor::{MethodDescriptor, RpcType, ServiceDescriptor},
    invocation::Invocation,
    invoker::{InvokeError, Invoker, Reply},
    listener::ServerStreamListener,
    metadata::Metadata,
    observer::{ResponseObserver, StreamObserver},
    status::{Code, Status},
    stream::ServerStream,
};
