//! Metric helpers for `tricall`.
//!
//! This module defines metric names and simple helper functions wrapping
//! the [`metrics`](https://docs.rs/metrics) crate. Without the `metrics`
//! feature the helpers compile to nothing.

#[cfg(feature = "metrics")]
use metrics::counter;

use crate::status::Code;

/// Name of the counter tracking started calls.
pub const CALLS_STARTED: &str = "tricall_calls_started_total";
/// Name of the counter tracking terminal statuses, labelled by `code`.
pub const CALLS_CLOSED: &str = "tricall_calls_closed_total";
/// Name of the counter tracking messages, labelled by `direction`.
pub const MESSAGES: &str = "tricall_messages_total";
/// Name of the counter tracking decode, pack and invoke failures.
pub const ERRORS_TOTAL: &str = "tricall_errors_total";
/// Name of the counter tracking panics caught on the write path.
pub const TASK_PANICS: &str = "tricall_task_panics_total";

/// Direction of a message relative to the server.
#[derive(Clone, Copy, Debug)]
pub enum Direction {
    /// Request messages decoded from the peer.
    Inbound,
    /// Response messages written to the peer.
    Outbound,
}

impl Direction {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Record a started call.
pub fn inc_calls() {
    #[cfg(feature = "metrics")]
    counter!(CALLS_STARTED).increment(1);
}

/// Record a terminal status sent to the peer.
pub fn inc_closed(code: Code) {
    #[cfg(feature = "metrics")]
    counter!(CALLS_CLOSED, "code" => code.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = code;
}

/// Record a message in the given direction.
pub fn inc_messages(direction: Direction) {
    #[cfg(feature = "metrics")]
    counter!(MESSAGES, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record a decode, pack or invoke failure.
pub fn inc_errors() {
    #[cfg(feature = "metrics")]
    counter!(ERRORS_TOTAL).increment(1);
}

/// Record a panic caught while running a serialized task.
pub fn inc_task_panics() {
    #[cfg(feature = "metrics")]
    counter!(TASK_PANICS).increment(1);
}
