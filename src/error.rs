// Error types for the session layer
// Only TransportInit is fatal; everything else is reported and the session carries on

use thiserror::Error;

use crate::network::state::ConnectionState;
use crate::network::transport::{ConnectionId, SessionId};

/// Failures reported by a peer transport implementation
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is not initialized")]
    NotInitialized,

    #[error("transport is already initialized")]
    AlreadyInitialized,

    #[error("could not connect to peer {0}")]
    PeerUnavailable(SessionId),

    #[error("connection {0} is closed")]
    ChannelClosed(ConnectionId),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// The transport never produced a session id. The session cannot start.
    #[error("transport failed to initialize: {0}")]
    TransportInit(String),

    #[error("failed to connect to {peer}: {reason}")]
    Connect { peer: SessionId, reason: String },

    #[error("rejected inbound connection from {peer} while {state}")]
    AdmissionRejected {
        peer: SessionId,
        state: ConnectionState,
    },

    #[error("dropped {len} byte payload: no open connection")]
    RelayDropped { len: usize },

    #[error("failed to encode game message: {0}")]
    Encode(String),

    #[error("session driver has stopped")]
    DriverStopped,
}

impl SessionError {
    /// Whether the session can no longer make progress after this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::TransportInit(_) | SessionError::DriverStopped)
    }
}
