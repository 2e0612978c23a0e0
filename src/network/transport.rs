// Peer transport contract consumed by the connection manager
// Identity, dialing and per-connection data channels live behind these traits

use std::fmt;

use crate::error::TransportError;

/// Application payload relayed verbatim between peers
pub type Payload = Vec<u8>;

/// Opaque address issued by the transport; a second peer dials it to join
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Transport-assigned identifier of one connection, inbound or outbound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// One reliable, ordered data channel to a remote peer
pub trait ConnectionHandle {
    fn id(&self) -> ConnectionId;

    /// Session id of the peer on the other end
    fn peer(&self) -> &SessionId;

    fn send(&self, payload: &[u8]) -> Result<(), TransportError>;

    /// Admit an inbound channel. Only after this does the dialing side see
    /// it open; a channel closed without being accepted never opens there.
    fn accept(&self);

    /// Close the channel. Closing twice must be harmless.
    fn close(&self);
}

/// Peer-to-peer transport collaborator.
///
/// Both operations only *request* work. Their outcomes are delivered later as
/// [`TransportEvent`]s, in the order the transport observed them.
pub trait Transport {
    type Handle: ConnectionHandle;

    /// Come online. Completes with `Ready` or `InitFailed`.
    fn initialize(&mut self) -> Result<(), TransportError>;

    /// Dial a remote peer. Completes with `Opened` or `Errored` for the
    /// returned handle's id.
    fn connect_to(&mut self, remote: &SessionId) -> Result<Self::Handle, TransportError>;
}

/// Notifications from the transport, processed one at a time
#[derive(Debug)]
pub enum TransportEvent<H> {
    /// Identity acquired
    Ready(SessionId),

    InitFailed(String),

    /// A remote peer dialed us
    Incoming(H),

    /// An outbound connection finished its handshake
    Opened(ConnectionId),

    Data { conn: ConnectionId, payload: Payload },

    Closed(ConnectionId),

    Errored { conn: ConnectionId, message: String },
}

impl<H> TransportEvent<H> {
    /// Connection the event refers to, if any
    pub fn connection(&self) -> Option<ConnectionId> {
        match self {
            TransportEvent::Opened(conn) | TransportEvent::Closed(conn) => Some(*conn),
            TransportEvent::Data { conn, .. } | TransportEvent::Errored { conn, .. } => Some(*conn),
            TransportEvent::Ready(_) | TransportEvent::InitFailed(_) | TransportEvent::Incoming(_) => {
                None
            }
        }
    }
}
