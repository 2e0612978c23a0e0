// Connection and lifecycle state types
// Phase is the tagged state the manager guards its transitions on

use std::fmt;

use super::transport::{ConnectionHandle, ConnectionId, SessionId};

/// Which side of the session this peer plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Accepted the inbound connection
    Host,
    /// Dialed the host
    Client,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Host => f.write_str("host"),
            Role::Client => f.write_str("client"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Pending,
    Open,
    Closed,
}

/// Observable lifecycle state of a connection manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    AwaitingIdentity,
    Idle,
    Connecting,
    Connected,
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Uninitialized => "uninitialized",
            ConnectionState::AwaitingIdentity => "awaiting identity",
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Identity was never acquired
    InitFailed(String),
    /// Remote side closed the channel
    Closed,
    /// Transport reported an error on the active channel
    Errored(String),
    /// Torn down on request of the local caller
    Local,
}

/// The single peer connection a manager may own
pub struct Connection<H> {
    handle: H,
    role: Role,
    state: LinkState,
}

impl<H: ConnectionHandle> Connection<H> {
    pub(crate) fn new(handle: H, role: Role) -> Self {
        Self {
            handle,
            role,
            state: LinkState::Pending,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.handle.id()
    }

    pub fn remote(&self) -> &SessionId {
        self.handle.peer()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub(crate) fn handle(&self) -> &H {
        &self.handle
    }

    pub(crate) fn mark_open(&mut self) {
        self.state = LinkState::Open;
    }

    pub(crate) fn close(&mut self) {
        if self.state != LinkState::Closed {
            self.handle.close();
            self.state = LinkState::Closed;
        }
    }
}

impl<H: ConnectionHandle> fmt::Debug for Connection<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id())
            .field("remote", self.remote())
            .field("role", &self.role)
            .field("state", &self.state)
            .finish()
    }
}

pub(crate) enum Phase<H> {
    Uninitialized,
    AwaitingIdentity,
    Idle,
    Connecting { pending: Connection<H> },
    Connected { link: Connection<H> },
    Disconnected { reason: DisconnectReason },
}

impl<H> Phase<H> {
    pub(crate) fn state(&self) -> ConnectionState {
        match self {
            Phase::Uninitialized => ConnectionState::Uninitialized,
            Phase::AwaitingIdentity => ConnectionState::AwaitingIdentity,
            Phase::Idle => ConnectionState::Idle,
            Phase::Connecting { .. } => ConnectionState::Connecting,
            Phase::Connected { .. } => ConnectionState::Connected,
            Phase::Disconnected { .. } => ConnectionState::Disconnected,
        }
    }
}
