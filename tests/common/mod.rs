//! Shared utilities for integration tests.
//!
//! Builds calls against the `Greeter` service on a [`RecordingStream`] and
//! provides invokers used across test binaries.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::sync::Arc;

use tricall::{
    BincodeCodec,
    Metadata,
    ServerCall,
    invocation::Invocation,
    invoker::{InvokeError, Invoker, Reply},
};
use tricall_testing::{RecordingStream, StreamEvent, TestMessage, greeter};

pub type Call = Arc<ServerCall<TestMessage>>;
pub type Outcome = Result<Reply<TestMessage>, InvokeError>;

/// Headers a Triple client sends for `Greeter/<method>`.
pub fn request_headers(method: &str) -> Metadata {
    [
        (":path", format!("/Greeter/{method}")),
        (":method", "POST".to_owned()),
        ("content-type", "application/grpc+proto".to_owned()),
        ("te", "trailers".to_owned()),
    ]
    .into_iter()
    .collect()
}

/// Build a call for `method` of the `Greeter` service.
#[expect(
    clippy::expect_used,
    reason = "tests run inside a tokio runtime, so building cannot fail"
)]
pub fn greeter_call<I>(stream: &Arc<RecordingStream>, method: &str, invoker: I) -> Call
where
    I: Invoker<TestMessage>,
{
    ServerCall::builder(Arc::clone(stream), invoker, BincodeCodec)
        .service(greeter())
        .method_name(method)
        .build()
        .expect("failed to build call")
}

/// Unary invoker answering `Hello <first argument>`.
pub fn hello(mut invocation: Invocation<TestMessage>) -> Outcome {
    let args = invocation.take_arguments();
    let name = args
        .first()
        .and_then(TestMessage::as_text)
        .unwrap_or_default();
    Ok(Reply::Value(TestMessage::text(format!("Hello {name}"))))
}

/// Invoker for calls that must never be dispatched.
pub fn unreachable_invoker(_: Invocation<TestMessage>) -> Outcome {
    panic!("invoker must not be called")
}

/// Data frames decoded as text.
pub fn texts(stream: &RecordingStream) -> Vec<String> {
    stream
        .messages()
        .iter()
        .map(|(data, _)| match tricall_testing::decode(data) {
            TestMessage::Text(text) => text,
            other => format!("{other:?}"),
        })
        .collect()
}

/// The single trailer frame, failing the test otherwise.
pub fn only_close(stream: &RecordingStream) -> (tricall::Status, Metadata) {
    let closes: Vec<_> = stream
        .frames()
        .into_iter()
        .filter_map(|e| match e {
            StreamEvent::Close { status, trailers } => Some((status, trailers)),
            _ => None,
        })
        .collect();
    assert_eq!(closes.len(), 1, "expected exactly one trailer frame");
    closes.into_iter().next().unwrap_or_else(|| unreachable!())
}
