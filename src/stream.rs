//! Contract for the transport stream beneath a call.
//!
//! The transport owns frame I/O, flow-control windows and connection
//! multiplexing. It must transmit frames in the order these methods are
//! called. Calls are fire-and-forget: transmission failures surface through
//! the transport's own cancellation path, not as return values here.

use std::net::SocketAddr;

use bytes::Bytes;

use crate::{metadata::Metadata, status::Status};

/// Server side of one HTTP/2 stream.
pub trait ServerStream: Send + Sync + 'static {
    /// Address of the remote peer, when known.
    fn remote_address(&self) -> Option<SocketAddr>;

    /// Send the response header frame.
    fn send_header(&self, headers: Metadata);

    /// Send a header frame with end-of-stream set, terminating the stream.
    fn send_header_with_eos(&self, headers: Metadata);

    /// Send one length-prefixed message. `compressed` sets the
    /// compressed-flag byte of the message prefix.
    fn write_message(&self, message: Bytes, compressed: bool);

    /// Send the trailer frame and terminate the stream.
    fn close(&self, status: Status, trailers: Metadata);

    /// Allow `n` more inbound messages to be delivered.
    fn request_n(&self, n: u32);
}
