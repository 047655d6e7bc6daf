//! Header maps exchanged with the transport.
//!
//! [`Metadata`] stores lower-cased header names in sorted order so frames
//! compare deterministically. The [`headers`] module names the keys this
//! crate reads or writes.

use std::collections::{BTreeMap, btree_map};

/// Header and trailer names used by the call.
pub mod headers {
    /// HTTP/2 response status pseudo-header.
    pub const STATUS: &str = ":status";
    pub const CONTENT_TYPE: &str = "content-type";
    pub const ACCEPT_ENCODING: &str = "accept-encoding";
    pub const TE: &str = "te";
    pub const USER_AGENT: &str = "user-agent";
    pub const GRPC_STATUS: &str = "grpc-status";
    pub const GRPC_MESSAGE: &str = "grpc-message";
    pub const GRPC_STATUS_DETAILS: &str = "grpc-status-details-bin";
    pub const GRPC_ENCODING: &str = "grpc-encoding";
    pub const GRPC_ACCEPT_ENCODING: &str = "grpc-accept-encoding";
    pub const GRPC_TIMEOUT: &str = "grpc-timeout";
    /// Name of the calling application.
    pub const CONSUMER_APP_NAME: &str = "tri-consumer-appname";
    pub const SERVICE_VERSION: &str = "tri-service-version";
    pub const SERVICE_GROUP: &str = "tri-service-group";
    pub const SERVICE_TIMEOUT: &str = "tri-service-timeout";
    pub const HEADER_CONVERT: &str = "tri-header-convert";
    pub const EXCEPTION_CODE: &str = "tri-exception-code";

    /// Content type of every response.
    pub const CONTENT_PROTO: &str = "application/grpc+proto";
    /// Value of [`STATUS`] on every response.
    pub const HTTP_OK: &str = "200";

    const RESERVED: &[&str] = &[
        CONTENT_TYPE,
        ACCEPT_ENCODING,
        TE,
        USER_AGENT,
        GRPC_STATUS,
        GRPC_MESSAGE,
        GRPC_STATUS_DETAILS,
        GRPC_ENCODING,
        GRPC_ACCEPT_ENCODING,
        GRPC_TIMEOUT,
        CONSUMER_APP_NAME,
        SERVICE_VERSION,
        SERVICE_GROUP,
        SERVICE_TIMEOUT,
        HEADER_CONVERT,
        EXCEPTION_CODE,
    ];

    /// Whether `key` belongs to the transport or protocol rather than the
    /// application. Pseudo-headers (leading `:`) are always reserved.
    #[must_use]
    pub fn is_reserved(key: &str) -> bool { key.starts_with(':') || RESERVED.contains(&key) }
}

/// Ordered header map with lower-cased keys.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Insert a header, lower-casing its name. Returns the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let mut key = key.into();
        key.make_ascii_lowercase();
        self.0.insert(key, value.into())
    }

    /// Look up a header by name (case-insensitive).
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        if key.bytes().any(|b| b.is_ascii_uppercase()) {
            return self.0.get(&key.to_ascii_lowercase()).map(String::as_str);
        }
        self.0.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool { self.get(key).is_some() }

    pub fn remove(&mut self, key: &str) -> Option<String> { self.0.remove(&key.to_ascii_lowercase()) }

    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copy of this map without reserved headers.
    #[must_use]
    pub fn without_reserved(&self) -> Self {
        self.0
            .iter()
            .filter(|(k, _)| !headers::is_reserved(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut metadata = Self::new();
        metadata.extend(iter);
        metadata
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Metadata {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl IntoIterator for Metadata {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter { self.0.into_iter() }
}
