//! In-memory transport stream recording every frame.

use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::{Mutex, PoisonError},
};

use bytes::Bytes;
use tokio::sync::Notify;
use tricall::{Metadata, Status, stream::ServerStream};

/// One frame or flow-control request observed by [`RecordingStream`].
#[derive(Clone, Debug)]
pub enum StreamEvent {
    Header(Metadata),
    HeaderWithEos(Metadata),
    Message { data: Bytes, compressed: bool },
    Close { status: Status, trailers: Metadata },
    RequestN(u32),
}

impl StreamEvent {
    /// Whether the event ends the stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool { matches!(self, Self::HeaderWithEos(_) | Self::Close { .. }) }
}

/// [`ServerStream`] that records what the call sends.
#[derive(Debug)]
pub struct RecordingStream {
    remote: Option<SocketAddr>,
    events: Mutex<Vec<StreamEvent>>,
    terminal: Notify,
}

impl Default for RecordingStream {
    fn default() -> Self {
        Self::with_remote_address(Some(SocketAddr::from((Ipv4Addr::LOCALHOST, 50051))))
    }
}

impl RecordingStream {
    /// Stream whose peer is `127.0.0.1:50051`.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn with_remote_address(remote: Option<SocketAddr>) -> Self {
        Self {
            remote,
            events: Mutex::new(Vec::new()),
            terminal: Notify::new(),
        }
    }

    fn record(&self, event: StreamEvent) {
        let terminal = event.is_terminal();
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        if terminal {
            self.terminal.notify_one();
        }
    }

    /// Every recorded event, in order.
    #[must_use]
    pub fn events(&self) -> Vec<StreamEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Frames only, without flow-control requests.
    #[must_use]
    pub fn frames(&self) -> Vec<StreamEvent> {
        self.events()
            .into_iter()
            .filter(|e| !matches!(e, StreamEvent::RequestN(_)))
            .collect()
    }

    /// Data frames as `(bytes, compressed)` pairs.
    #[must_use]
    pub fn messages(&self) -> Vec<(Bytes, bool)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                StreamEvent::Message { data, compressed } => Some((data, compressed)),
                _ => None,
            })
            .collect()
    }

    /// Sum of all `request_n` calls.
    #[must_use]
    pub fn requested(&self) -> u32 {
        self.events()
            .iter()
            .map(|e| match e {
                StreamEvent::RequestN(n) => *n,
                _ => 0,
            })
            .sum()
    }

    /// Number of frames that ended the stream.
    #[must_use]
    pub fn terminal_count(&self) -> usize {
        self.events().iter().filter(|e| e.is_terminal()).count()
    }

    /// Status of the trailer frame, if the stream was closed normally.
    #[must_use]
    pub fn close_status(&self) -> Option<Status> {
        self.events().into_iter().find_map(|e| match e {
            StreamEvent::Close { status, .. } => Some(status),
            _ => None,
        })
    }

    /// Wait until a terminal frame has been recorded.
    pub async fn terminated(&self) {
        while self.terminal_count() == 0 {
            self.terminal.notified().await;
        }
    }
}

impl ServerStream for RecordingStream {
    fn remote_address(&self) -> Option<SocketAddr> { self.remote }

    fn send_header(&self, headers: Metadata) { self.record(StreamEvent::Header(headers)); }

    fn send_header_with_eos(&self, headers: Metadata) {
        self.record(StreamEvent::HeaderWithEos(headers));
    }

    fn write_message(&self, message: Bytes, compressed: bool) {
        self.record(StreamEvent::Message {
            data: message,
            compressed,
        });
    }

    fn close(&self, status: Status, trailers: Metadata) {
        self.record(StreamEvent::Close { status, trailers });
    }

    fn request_n(&self, n: u32) { self.record(StreamEvent::RequestN(n)); }
}
