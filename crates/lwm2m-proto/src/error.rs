//! Wire-level error types.

use thiserror::Error;

use crate::types::ObjectType;

/// Errors parsing an `/object/instance/resource` path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// No segments at all.
    #[error("empty object path")]
    Empty,

    /// A segment was not a decimal `u16`.
    #[error("invalid path segment: {segment:?}")]
    InvalidSegment {
        /// Offending segment text.
        segment: String,
    },

    /// More than three segments.
    #[error("path too deep: {depth} segments")]
    TooDeep {
        /// Number of segments found.
        depth: usize,
    },
}

/// Errors loading or exporting an object definition document.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Document is not valid JSON or does not match the definition schema.
    #[error("invalid definition document: {0}")]
    Json(#[from] serde_json::Error),

    /// The same object type is defined twice.
    #[error("object {object_type} defined more than once")]
    DuplicateObject {
        /// Repeated object type.
        object_type: ObjectType,
    },
}

/// Errors decoding an OMA-TLV payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TlvError {
    /// Input ended before a complete entry was read.
    #[error("truncated TLV: needed {needed} bytes, {available} available")]
    Truncated {
        /// Bytes required to continue.
        needed: usize,
        /// Bytes remaining in the input.
        available: usize,
    },

    /// Entry identifier type did not match what the resource expects.
    #[error("unexpected TLV entry kind {kind:#04b} for resource {resource_id}")]
    UnexpectedKind {
        /// Two-bit identifier type from the type byte.
        kind: u8,
        /// Resource being decoded.
        resource_id: u16,
    },

    /// Entry identifier did not match the addressed resource.
    #[error("TLV entry for resource {actual}, expected {expected}")]
    ResourceMismatch {
        /// Resource the caller asked for.
        expected: u16,
        /// Resource found in the payload.
        actual: u16,
    },

    /// Value bytes are not valid for the resource type.
    #[error("invalid {type_name} value of {len} bytes")]
    InvalidValue {
        /// Resource type being decoded.
        type_name: &'static str,
        /// Length of the value bytes.
        len: usize,
    },

    /// Payload held entries after the one being decoded.
    #[error("{count} unexpected TLV entries after the resource")]
    TrailingEntries {
        /// Number of extra entries.
        count: usize,
    },

    /// Value is too large to encode.
    #[error("TLV value too large: {len} bytes")]
    TooLarge {
        /// Length of the value bytes.
        len: usize,
    },
}

/// Errors decoding or encoding a CoAP message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoapError {
    /// Datagram shorter than the fixed header plus token.
    #[error("datagram too short: {len} bytes")]
    TooShort {
        /// Datagram length.
        len: usize,
    },

    /// Version field was not 1.
    #[error("unsupported CoAP version {0}")]
    UnsupportedVersion(u8),

    /// Token length above 8.
    #[error("invalid token length {0}")]
    InvalidTokenLength(u8),

    /// Option delta or length used the reserved nibble 15.
    #[error("malformed option at offset {offset}")]
    MalformedOption {
        /// Byte offset of the option header.
        offset: usize,
    },

    /// Payload marker present with no payload.
    #[error("payload marker without payload")]
    EmptyPayload,

    /// Code byte does not map to a known method or response.
    #[error("unknown CoAP code {class}.{detail:02}")]
    UnknownCode {
        /// Code class.
        class: u8,
        /// Code detail.
        detail: u8,
    },

    /// Option value too long to encode.
    #[error("option value too long: {len} bytes")]
    OptionTooLong {
        /// Option value length.
        len: usize,
    },
}

/// Errors parsing CoRE link-format text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkFormatError {
    /// Link target was not enclosed in angle brackets.
    #[error("malformed link: {link:?}")]
    MalformedLink {
        /// Offending link text.
        link: String,
    },

    /// Link target was not an object path.
    #[error("invalid link target: {0}")]
    Path(#[from] PathError),

    /// Attribute value was not a space-separated list of resource ids.
    #[error("invalid resource list in attribute {attribute}")]
    InvalidResourceList {
        /// Attribute name.
        attribute: String,
    },
}
