//! RPC outcome codes and the [`Status`] value sent to the peer.
//!
//! A [`Status`] pairs a [`Code`] with an optional human-readable description
//! and an optional cause kept for diagnostics. The description and cause are
//! rendered into the `grpc-message` field by [`Status::to_encoded_message`].

use std::{error::Error, fmt, fmt::Write as _, sync::Arc};

/// Boxed error type used for causes and codec failures.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Maximum length of the rendered `grpc-message` before percent-encoding.
const MAX_MESSAGE_BYTES: usize = 1024;

/// Status codes (<https://grpc.github.io/grpc/core/md_doc_statuscodes.html>).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Code {
    Ok = 0,
    Cancelled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl Code {
    /// Parse a status code from its wire value. Unknown values map to
    /// [`Code::Unknown`].
    #[must_use]
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Ok,
            1 => Self::Cancelled,
            3 => Self::InvalidArgument,
            4 => Self::DeadlineExceeded,
            5 => Self::NotFound,
            6 => Self::AlreadyExists,
            7 => Self::PermissionDenied,
            8 => Self::ResourceExhausted,
            9 => Self::FailedPrecondition,
            10 => Self::Aborted,
            11 => Self::OutOfRange,
            12 => Self::Unimplemented,
            13 => Self::Internal,
            14 => Self::Unavailable,
            15 => Self::DataLoss,
            16 => Self::Unauthenticated,
            _ => Self::Unknown,
        }
    }

    /// The wire value of this code.
    #[must_use]
    pub fn as_u8(self) -> u8 { self as u8 }

    /// Canonical upper-case name, also used as a metrics label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Cancelled => "CANCELLED",
            Self::Unknown => "UNKNOWN",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Self::FailedPrecondition => "FAILED_PRECONDITION",
            Self::Aborted => "ABORTED",
            Self::OutOfRange => "OUT_OF_RANGE",
            Self::Unimplemented => "UNIMPLEMENTED",
            Self::Internal => "INTERNAL",
            Self::Unavailable => "UNAVAILABLE",
            Self::DataLoss => "DATA_LOSS",
            Self::Unauthenticated => "UNAUTHENTICATED",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Outcome of a call: code, optional description and optional cause.
#[derive(Clone, Debug)]
pub struct Status {
    code: Code,
    description: Option<String>,
    cause: Option<Arc<dyn Error + Send + Sync + 'static>>,
}

impl Status {
    /// Create a status with the given code and no description.
    #[must_use]
    pub fn new(code: Code) -> Self {
        Self {
            code,
            description: None,
            cause: None,
        }
    }

    #[must_use]
    pub fn ok() -> Self { Self::new(Code::Ok) }

    #[must_use]
    pub fn cancelled() -> Self { Self::new(Code::Cancelled) }

    #[must_use]
    pub fn unknown() -> Self { Self::new(Code::Unknown) }

    #[must_use]
    pub fn unimplemented() -> Self { Self::new(Code::Unimplemented) }

    #[must_use]
    pub fn internal() -> Self { Self::new(Code::Internal) }

    /// Attach a human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach the error that caused this outcome.
    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<BoxError>) -> Self {
        let cause: BoxError = cause.into();
        self.cause = Some(Arc::from(cause));
        self
    }

    #[must_use]
    pub fn code(&self) -> Code { self.code }

    #[must_use]
    pub fn is_ok(&self) -> bool { self.code == Code::Ok }

    #[must_use]
    pub fn description(&self) -> Option<&str> { self.description.as_deref() }

    #[must_use]
    pub fn cause(&self) -> Option<&(dyn Error + Send + Sync + 'static)> { self.cause.as_deref() }

    /// Render the description followed by the cause, if any.
    #[must_use]
    pub fn to_message(&self) -> String {
        match (&self.description, &self.cause) {
            (Some(description), Some(cause)) => format!("{description}: {cause}"),
            (Some(description), None) => description.clone(),
            (None, Some(cause)) => cause.to_string(),
            (None, None) => String::new(),
        }
    }

    /// Render the `grpc-message` value: the message truncated to 1 KiB and
    /// percent-encoded.
    #[must_use]
    pub fn to_encoded_message(&self) -> String {
        let message = self.to_message();
        percent_encode(truncate_on_char_boundary(&message, MAX_MESSAGE_BYTES))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = self.to_message();
        if message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {message}", self.code)
        }
    }
}

impl Error for Status {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn Error + 'static))
    }
}

fn truncate_on_char_boundary(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// Percent-encode bytes outside the printable ASCII range and `%` itself.
fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if (0x20..=0x7e).contains(&byte) && byte != b'%' {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}
