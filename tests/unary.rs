//! Unary calls driven end to end through a recording transport.

mod common;

use std::{
    io,
    net::{Ipv4Addr, SocketAddr},
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use common::{Outcome, greeter_call, hello, only_close, request_headers, texts};
use rstest::rstest;
use tokio::sync::oneshot;
use tricall::{
    Code,
    ListenerState,
    ServerStreamListener,
    Status,
    invocation::Invocation,
    invoker::{InvokeError, Reply},
};
use tricall_testing::{RecordingStream, StreamEvent, TestMessage, decode, encode};

fn recording_invoker(
    seen: &Arc<Mutex<Vec<Vec<TestMessage>>>>,
) -> impl Fn(Invocation<TestMessage>) -> Outcome + Send + Sync + 'static {
    let seen = Arc::clone(seen);
    move |invocation| {
        seen.lock()
            .expect("poisoned")
            .push(invocation.arguments().to_vec());
        hello(invocation)
    }
}

#[tokio::test]
async fn greeter_says_hello_once() {
    let stream = Arc::new(RecordingStream::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let call = greeter_call(&stream, "sayHello", recording_invoker(&seen));

    let mut listener = call
        .start_call(&request_headers("sayHello"))
        .expect("listener for known method");
    listener.on_message(&encode(&TestMessage::text("world")));
    listener.on_complete();
    call.flush().await;

    assert_eq!(
        *seen.lock().expect("poisoned"),
        vec![vec![TestMessage::text("world")]]
    );
    let frames = stream.frames();
    assert_eq!(frames.len(), 3, "header, one message, trailer: {frames:?}");
    match &frames[0] {
        StreamEvent::Header(headers) => {
            assert_eq!(headers.get(":status"), Some("200"));
            assert_eq!(headers.get("content-type"), Some("application/grpc+proto"));
            assert!(headers.get("grpc-encoding").is_none());
        }
        other => panic!("expected header, got {other:?}"),
    }
    match &frames[1] {
        StreamEvent::Message { data, compressed } => {
            assert!(!compressed);
            assert_eq!(decode(data), TestMessage::text("Hello world"));
        }
        other => panic!("expected message, got {other:?}"),
    }
    match &frames[2] {
        StreamEvent::Close { status, trailers } => {
            assert!(status.is_ok());
            assert_eq!(trailers.get("grpc-status"), Some("0"));
            assert!(trailers.get("grpc-message").is_none());
        }
        other => panic!("expected trailer, got {other:?}"),
    }
    assert_eq!(stream.requested(), 2);
    assert!(call.is_closed());
    assert_eq!(listener.state(), ListenerState::Closed);
}

#[tokio::test]
async fn frames_after_completion_are_ignored() {
    let stream = Arc::new(RecordingStream::new());
    let call = greeter_call(&stream, "sayHello", hello);

    let mut listener = call.start_call(&request_headers("sayHello")).expect("listener");
    listener.on_message(&encode(&TestMessage::text("world")));
    listener.on_complete();
    call.flush().await;
    assert_eq!(listener.state(), ListenerState::Closed);

    listener.on_message(&[0xFF, 0xFF, 0xFF]);
    call.flush().await;

    assert_eq!(listener.state(), ListenerState::Closed);
    assert_eq!(stream.frames().len(), 3);
    assert!(only_close(&stream).0.is_ok());
}

#[tokio::test]
async fn invocation_carries_request_context() {
    let peer = SocketAddr::from((Ipv4Addr::new(10, 0, 0, 7), 40000));
    let stream = Arc::new(RecordingStream::with_remote_address(Some(peer)));
    let captured = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&captured);
    let call = greeter_call(&stream, "sayHello", move |invocation: Invocation<TestMessage>| {
        *sink.lock().expect("poisoned") = Some(format!(
            "{}|{}|{:?}|{:?}|{:?}|{:?}",
            invocation.service_key(),
            invocation.method_name(),
            invocation.consumer_app_name(),
            invocation.attachments().get("trace-id"),
            invocation.attachments().get("te"),
            invocation.remote_address(),
        ));
        hello(invocation)
    });

    let mut headers = request_headers("sayHello");
    headers.insert("tri-service-group", "blue");
    headers.insert("tri-service-version", "2.0.0");
    headers.insert("tri-consumer-appname", "gateway");
    headers.insert("Trace-Id", "abc123");
    let mut listener = call.start_call(&headers).expect("listener");
    listener.on_message(&encode(&TestMessage::text("world")));
    listener.on_complete();
    call.flush().await;

    assert_eq!(
        captured.lock().expect("poisoned").as_deref(),
        Some(
            "blue/Greeter:2.0.0|sayHello|Some(\"gateway\")|Some(\"abc123\")|None|Some(10.0.0.7:40000)"
        )
    );
}

#[tokio::test]
async fn multi_argument_payload_is_spread() {
    let stream = Arc::new(RecordingStream::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let call = greeter_call(&stream, "sayHello", recording_invoker(&seen));

    let mut listener = call.start_call(&request_headers("sayHello")).expect("listener");
    listener.on_message(&encode(&TestMessage::Args(vec![
        TestMessage::text("a"),
        TestMessage::text("b"),
    ])));
    listener.on_complete();
    call.flush().await;

    assert_eq!(
        *seen.lock().expect("poisoned"),
        vec![vec![TestMessage::text("a"), TestMessage::text("b")]]
    );
    assert_eq!(texts(&stream), ["Hello a"]);
}

#[tokio::test]
async fn later_frame_replaces_arguments_before_dispatch() {
    let stream = Arc::new(RecordingStream::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let call = greeter_call(&stream, "sayHello", recording_invoker(&seen));

    let mut listener = call.start_call(&request_headers("sayHello")).expect("listener");
    listener.on_message(&encode(&TestMessage::text("first")));
    listener.on_message(&encode(&TestMessage::text("second")));
    listener.on_complete();
    listener.on_message(&encode(&TestMessage::text("late")));
    listener.on_complete();
    call.flush().await;

    assert_eq!(
        *seen.lock().expect("poisoned"),
        vec![vec![TestMessage::text("second")]]
    );
    assert_eq!(stream.terminal_count(), 1);
}

#[rstest]
#[case::explicit_status(
    InvokeError::from(Status::new(Code::NotFound).with_description("no such user")),
    Code::NotFound,
    "no such user"
)]
#[case::failure(
    InvokeError::failed(io::Error::other("db down")),
    Code::Internal,
    "Invoke failed: db down"
)]
#[tokio::test]
async fn invoker_failure_closes_with_status(
    #[case] failure: InvokeError,
    #[case] code: Code,
    #[case] message: &str,
) {
    let stream = Arc::new(RecordingStream::new());
    let failure = Mutex::new(Some(failure));
    let call = greeter_call(&stream, "sayHello", move |_: Invocation<TestMessage>| -> Outcome {
        Err(failure
            .lock()
            .expect("poisoned")
            .take()
            .expect("invoked once"))
    });

    let mut listener = call.start_call(&request_headers("sayHello")).expect("listener");
    listener.on_message(&encode(&TestMessage::text("world")));
    listener.on_complete();
    call.flush().await;

    let (status, trailers) = only_close(&stream);
    assert_eq!(status.code(), code);
    assert_eq!(trailers.get("grpc-message"), Some(message));
    assert!(stream.messages().is_empty());
    assert!(matches!(stream.frames()[0], StreamEvent::Header(_)));
    assert_eq!(listener.state(), ListenerState::Closed);
}

#[tokio::test]
async fn invoker_panic_becomes_internal() {
    let stream = Arc::new(RecordingStream::new());
    let call = greeter_call(&stream, "sayHello", |_: Invocation<TestMessage>| -> Outcome {
        panic!("boom")
    });

    let mut listener = call.start_call(&request_headers("sayHello")).expect("listener");
    listener.on_message(&encode(&TestMessage::text("world")));
    listener.on_complete();
    call.flush().await;

    let (status, _) = only_close(&stream);
    assert_eq!(status.code(), Code::Internal);
    assert_eq!(status.description(), Some("Invoke failed: boom"));
}

#[tokio::test]
async fn empty_unary_reply_is_missing_response() {
    let stream = Arc::new(RecordingStream::new());
    let call = greeter_call(&stream, "sayHello", |_: Invocation<TestMessage>| -> Outcome {
        Ok(Reply::Empty)
    });

    let mut listener = call.start_call(&request_headers("sayHello")).expect("listener");
    listener.on_message(&encode(&TestMessage::text("world")));
    listener.on_complete();
    call.flush().await;

    let (status, _) = only_close(&stream);
    assert_eq!(status.code(), Code::Internal);
    assert_eq!(status.description(), Some("Missing response"));
}

#[tokio::test]
async fn malformed_frame_closes_without_dispatch() {
    let stream = Arc::new(RecordingStream::new());
    let invoked = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&invoked);
    let call = greeter_call(&stream, "sayHello", move |inv: Invocation<TestMessage>| {
        counter.fetch_add(1, Ordering::SeqCst);
        hello(inv)
    });

    let mut listener = call.start_call(&request_headers("sayHello")).expect("listener");
    listener.on_message(&[0xFF, 0xFF, 0xFF]);
    listener.on_message(&encode(&TestMessage::text("world")));
    listener.on_complete();
    call.flush().await;

    assert_eq!(invoked.load(Ordering::SeqCst), 0);
    assert_eq!(listener.state(), ListenerState::Closed);
    let (status, _) = only_close(&stream);
    assert_eq!(status.code(), Code::Internal);
    assert_eq!(status.description(), Some("Server error"));
    assert!(status.cause().is_some());
}

#[tokio::test]
async fn cancel_before_dispatch_is_silent() {
    let stream = Arc::new(RecordingStream::new());
    let invoked = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&invoked);
    let call = greeter_call(&stream, "sayHello", move |inv: Invocation<TestMessage>| {
        counter.fetch_add(1, Ordering::SeqCst);
        hello(inv)
    });
    let token = call.cancellation();

    let mut listener = call.start_call(&request_headers("sayHello")).expect("listener");
    listener.on_message(&encode(&TestMessage::text("world")));
    listener.on_cancel_by_remote(Status::cancelled());
    listener.on_complete();
    call.flush().await;

    assert_eq!(invoked.load(Ordering::SeqCst), 0);
    assert!(stream.frames().is_empty());
    assert!(token.is_cancelled());
    assert!(call.is_closed());
}

#[tokio::test]
async fn pending_reply_completes_later() {
    let stream = Arc::new(RecordingStream::new());
    let call = greeter_call(&stream, "sayHello", |mut inv: Invocation<TestMessage>| -> Outcome {
        let name = inv
            .take_arguments()
            .pop()
            .and_then(|m| m.as_text().map(str::to_owned))
            .unwrap_or_default();
        Ok(Reply::Pending(Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok::<_, InvokeError>(TestMessage::text(format!("Hello {name}, eventually")))
        })))
    });

    let mut listener = call.start_call(&request_headers("sayHello")).expect("listener");
    listener.on_message(&encode(&TestMessage::text("world")));
    listener.on_complete();
    tokio::time::timeout(Duration::from_secs(5), stream.terminated())
        .await
        .expect("pending reply never completed");

    assert_eq!(texts(&stream), ["Hello world, eventually"]);
    assert!(only_close(&stream).0.is_ok());
}

#[tokio::test]
async fn pending_reply_observes_remote_cancel() {
    let stream = Arc::new(RecordingStream::new());
    let (observed_tx, observed_rx) = oneshot::channel();
    let observed_tx = Mutex::new(Some(observed_tx));
    let call = greeter_call(&stream, "sayHello", move |inv: Invocation<TestMessage>| -> Outcome {
        let token = inv.cancellation().clone();
        let observed = observed_tx
            .lock()
            .expect("poisoned")
            .take()
            .expect("invoked once");
        Ok(Reply::Pending(Box::pin(async move {
            token.cancelled().await;
            let _ = observed.send(());
            Err::<TestMessage, _>(InvokeError::from(Status::cancelled()))
        })))
    });

    let mut listener = call.start_call(&request_headers("sayHello")).expect("listener");
    listener.on_message(&encode(&TestMessage::text("world")));
    listener.on_complete();
    assert!(!call.cancellation().is_cancelled());

    listener.on_cancel_by_remote(Status::cancelled());
    tokio::time::timeout(Duration::from_secs(5), observed_rx)
        .await
        .expect("pending reply never saw the cancellation")
        .expect("pending reply dropped");
    call.flush().await;

    assert!(call.cancellation().is_cancelled());
    assert!(call.is_closed());
    assert_eq!(stream.terminal_count(), 0);
}

#[tokio::test]
async fn pending_failure_closes_with_its_status() {
    let stream = Arc::new(RecordingStream::new());
    let call = greeter_call(&stream, "sayHello", |_: Invocation<TestMessage>| -> Outcome {
        Ok(Reply::Pending(Box::pin(async {
            Err::<TestMessage, _>(InvokeError::from(Status::new(Code::Unavailable)))
        })))
    });

    let mut listener = call.start_call(&request_headers("sayHello")).expect("listener");
    listener.on_complete();
    tokio::time::timeout(Duration::from_secs(5), stream.terminated())
        .await
        .expect("pending reply never completed");

    assert_eq!(only_close(&stream).0.code(), Code::Unavailable);
}

#[rstest]
#[case::seconds(Some("5S"), Some(Duration::from_secs(5)))]
#[case::nanos(Some("2500000n"), Some(Duration::from_millis(2)))]
#[case::unknown_unit(Some("5x"), None)]
#[case::absent(None, None)]
#[tokio::test]
async fn timeout_header_is_recorded(
    #[case] header: Option<&str>,
    #[case] expected: Option<Duration>,
) {
    let stream = Arc::new(RecordingStream::new());
    let deadline = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&deadline);
    let call = greeter_call(&stream, "sayHello", move |inv: Invocation<TestMessage>| {
        *seen.lock().expect("poisoned") = Some(inv.timeout());
        hello(inv)
    });
    let mut headers = request_headers("sayHello");
    if let Some(value) = header {
        headers.insert("grpc-timeout", value);
    }
    headers.insert("grpc-encoding", "gzip");

    let mut listener = call.start_call(&headers).expect("listener");
    listener.on_complete();

    assert_eq!(call.timeout(), expected);
    assert_eq!(deadline.lock().expect("poisoned").take(), Some(expected));
    assert_eq!(call.request_encoding().as_deref(), Some("gzip"));
}
