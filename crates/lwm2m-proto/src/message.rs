//! Transport-neutral request and response records.
//!
//! These carry exactly what the object model needs: method, path, query,
//! payload, plus the correlation fields (token, message id) that a response
//! must mirror. The CoAP datagram codec in [`crate::coap`] converts to and
//! from these.

use bytes::Bytes;

use crate::code::{Method, ResponseCode};

/// An inbound or outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Request method.
    pub method: Method,
    /// Uri-Path segments.
    pub path: Vec<String>,
    /// Uri-Query `key=value` pairs.
    pub query: Vec<(String, String)>,
    /// Body.
    pub payload: Bytes,
    /// Content-Format of the body.
    pub content_format: Option<u16>,
    /// Correlation token.
    pub token: Bytes,
    /// Message id.
    pub message_id: u16,
}

impl Request {
    /// Create a request for `path` (slash separated).
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: split_path(path),
            query: Vec::new(),
            payload: Bytes::new(),
            content_format: None,
            token: Bytes::new(),
            message_id: 0,
        }
    }

    /// Append a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set the body and its content format.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Bytes>, content_format: u16) -> Self {
        self.payload = payload.into();
        self.content_format = Some(content_format);
        self
    }

    /// Set correlation fields.
    #[must_use]
    pub fn with_correlation(mut self, token: impl Into<Bytes>, message_id: u16) -> Self {
        self.token = token.into();
        self.message_id = message_id;
        self
    }

    /// Path rendered with a leading slash.
    pub fn path_str(&self) -> String {
        join_path(&self.path)
    }

    /// First value of query parameter `key`.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

/// A response to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Result code.
    pub code: ResponseCode,
    /// Body.
    pub payload: Bytes,
    /// Content-Format of the body.
    pub content_format: Option<u16>,
    /// Location-Path segments (set by the server on registration).
    pub location_path: Vec<String>,
    /// Token copied from the request.
    pub token: Bytes,
    /// Message id copied from the request.
    pub message_id: u16,
}

impl Response {
    /// Bare response with no correlation.
    pub fn new(code: ResponseCode) -> Self {
        Self {
            code,
            payload: Bytes::new(),
            content_format: None,
            location_path: Vec::new(),
            token: Bytes::new(),
            message_id: 0,
        }
    }

    /// Response to `request`, mirroring its token and message id.
    pub fn reply_to(request: &Request, code: ResponseCode) -> Self {
        Self { token: request.token.clone(), message_id: request.message_id, ..Self::new(code) }
    }

    /// Set the body and its content format.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Bytes>, content_format: u16) -> Self {
        self.payload = payload.into();
        self.content_format = Some(content_format);
        self
    }

    /// Set the Location-Path (slash separated).
    #[must_use]
    pub fn with_location(mut self, location: &str) -> Self {
        self.location_path = split_path(location);
        self
    }

    /// Location-Path rendered with a leading slash, if any.
    pub fn location(&self) -> Option<String> {
        (!self.location_path.is_empty()).then(|| join_path(&self.location_path))
    }
}

fn split_path(path: &str) -> Vec<String> {
    path.split('/').filter(|s| !s.is_empty()).map(str::to_owned).collect()
}

fn join_path(segments: &[String]) -> String {
    let mut out = String::new();
    for segment in segments {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}
