//! Device error types.

use std::{io, net::SocketAddr};

use lwm2m_client::{ClientError, TransportError};
use thiserror::Error;

/// Errors that can occur running the device.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Local socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested local address.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Socket configuration or query failed.
    #[error("socket error: {0}")]
    Io(#[from] io::Error),

    /// Client configuration or registration failed.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Blocking task could not be joined.
    #[error("runtime error: {reason}")]
    Runtime {
        /// Description of the failure.
        reason: String,
    },
}

impl From<TransportError> for DeviceError {
    fn from(err: TransportError) -> Self {
        Self::Client(ClientError::Transport(err))
    }
}

impl DeviceError {
    /// Returns true if the device cannot continue.
    ///
    /// Socket and runtime failures are fatal. Client errors are fatal unless
    /// a retry could succeed.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Bind { .. } | Self::Io(_) | Self::Runtime { .. } => true,
            Self::Client(e) => !e.is_transient(),
        }
    }
}
