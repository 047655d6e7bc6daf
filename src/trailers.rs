//! Builders for response header and trailer frames.
//!
//! A call ends in exactly one of two ways. The early-error path sends
//! [`error_headers`] as a single header frame with end-of-stream set. The
//! normal path sends [`response_headers`], then data, then [`trailers`].

use crate::{
    metadata::{Metadata, headers},
    status::Status,
};

/// Headers opening a normal response.
///
/// `accept_encoding` is advertised when the server declared the encodings
/// it accepts; `message_encoding` names the active response compressor.
#[must_use]
pub fn response_headers(accept_encoding: Option<&str>, message_encoding: Option<&str>) -> Metadata {
    let mut md = base_headers();
    if let Some(accept) = accept_encoding {
        md.insert(headers::ACCEPT_ENCODING, accept);
    }
    if let Some(encoding) = message_encoding {
        md.insert(headers::GRPC_ENCODING, encoding);
    }
    md
}

/// Headers-as-trailers for the early-error path.
#[must_use]
pub fn error_headers(status: &Status) -> Metadata {
    let mut md = base_headers();
    insert_status(&mut md, status);
    md
}

/// Trailers closing a normal response.
///
/// Reserved names in `attachments` are dropped so applications cannot
/// overwrite the status fields.
#[must_use]
pub fn trailers(status: &Status, attachments: Option<&Metadata>) -> Metadata {
    let mut md = attachments.map(Metadata::without_reserved).unwrap_or_default();
    insert_status(&mut md, status);
    md
}

fn base_headers() -> Metadata {
    let mut md = Metadata::new();
    md.insert(headers::STATUS, headers::HTTP_OK);
    md.insert(headers::CONTENT_TYPE, headers::CONTENT_PROTO);
    md
}

fn insert_status(md: &mut Metadata, status: &Status) {
    md.insert(headers::GRPC_STATUS, status.code().as_u8().to_string());
    let message = status.to_encoded_message();
    if !message.is_empty() {
        md.insert(headers::GRPC_MESSAGE, message);
    }
}
