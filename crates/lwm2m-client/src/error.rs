//! Client error types.

use lwm2m_proto::{CoapError, ObjectType, ResponseCode};
use thiserror::Error;

use crate::registration::RegistrationState;

/// Errors from client configuration and registration.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The object table has no registry to look definitions up in.
    #[error("no object registry configured")]
    NoRegistry,

    /// Object type is already present in the table.
    #[error("object {object_type} is already enabled")]
    AlreadyEnabled {
        /// Offending object type.
        object_type: ObjectType,
    },

    /// Object type has not been enabled.
    #[error("object {object_type} is not enabled")]
    NotEnabled {
        /// Offending object type.
        object_type: ObjectType,
    },

    /// Registry has no definition for the object type.
    #[error("object {object_type} is not defined in the registry")]
    UnknownObject {
        /// Offending object type.
        object_type: ObjectType,
    },

    /// Endpoint name is empty.
    #[error("endpoint name is empty")]
    EmptyEndpointName,

    /// Endpoint name exceeds the configured bound.
    #[error("endpoint name is {len} characters, limit is {max}")]
    EndpointNameTooLong {
        /// Length of the rejected name.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Registration operation is not valid in the current state.
    #[error("cannot {operation} while {state}")]
    StateConflict {
        /// Attempted operation.
        operation: &'static str,
        /// State the session was in.
        state: RegistrationState,
    },

    /// Server answered a registration operation with an unexpected code.
    #[error("server rejected {operation} with {code}")]
    Rejected {
        /// Attempted operation.
        operation: &'static str,
        /// Code returned by the server.
        code: ResponseCode,
    },

    /// Server accepted the registration without assigning a location.
    #[error("registration response carried no location path")]
    MissingLocation,

    /// Client routes were already installed on the transport.
    #[error("client already started")]
    AlreadyStarted,

    /// Underlying transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl ClientError {
    /// Returns true if retrying the same call may succeed.
    ///
    /// Configuration and state errors will fail the same way on every retry.
    /// Transport failures and server rejections depend on the network and the
    /// server, so a later attempt can succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_transient(),
            Self::Rejected { code, .. } => code.class() == 5,
            Self::MissingLocation => true,

            Self::NoRegistry
            | Self::AlreadyEnabled { .. }
            | Self::NotEnabled { .. }
            | Self::UnknownObject { .. }
            | Self::EmptyEndpointName
            | Self::EndpointNameTooLong { .. }
            | Self::StateConflict { .. }
            | Self::AlreadyStarted => false,
        }
    }
}

/// Errors reported by a [`Transport`](crate::Transport) implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket-level failure.
    #[error("I/O error: {reason}")]
    Io {
        /// Description of the I/O failure.
        reason: String,
    },

    /// No response arrived in time.
    #[error("request timed out after {timeout_ms}ms")]
    Timeout {
        /// Configured timeout.
        timeout_ms: u64,
    },

    /// Datagram could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CoapError),

    /// Route pattern is malformed.
    #[error("invalid route pattern {pattern:?}: {reason}")]
    InvalidRoute {
        /// Rejected pattern.
        pattern: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Transport is shut down.
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    /// Returns true if the failure is tied to network conditions.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Timeout { .. })
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io { reason: err.to_string() }
    }
}
