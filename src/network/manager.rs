// Connection lifecycle state machine
// Admits exactly one peer connection, assigns roles and relays payloads

use std::mem;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::coordinator::SessionCoordinator;
use super::state::{Connection, ConnectionState, DisconnectReason, Phase, Role};
use super::transport::{ConnectionHandle, ConnectionId, Payload, SessionId, Transport, TransportEvent};
use crate::error::SessionError;

/// How long the host waits after admitting a client before asking for the
/// initial full state push
pub const DEFAULT_STATE_SYNC_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Gives the remote side time to finish its own setup. Best effort only:
    /// the client must accept state whenever it arrives.
    pub state_sync_delay: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            state_sync_delay: DEFAULT_STATE_SYNC_DELAY,
        }
    }
}

/// Owns the one peer connection of this process and the data path through it.
///
/// The manager never performs I/O or reads the clock on its own. Transport
/// notifications are fed in through [`handle_event`](Self::handle_event) one at
/// a time, and the deferred state sync is exposed as a deadline through
/// [`poll_timeout`](Self::poll_timeout) / [`handle_timeout`](Self::handle_timeout).
pub struct ConnectionManager<T: Transport, C> {
    transport: T,
    coordinator: C,
    config: ManagerConfig,
    session_id: Option<SessionId>,
    phase: Phase<T::Handle>,
    sync_deadline: Option<Instant>,
}

impl<T: Transport, C: SessionCoordinator> ConnectionManager<T, C> {
    pub fn new(transport: T, coordinator: C, config: ManagerConfig) -> Self {
        Self {
            transport,
            coordinator,
            config,
            session_id: None,
            phase: Phase::Uninitialized,
            sync_deadline: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.phase.state()
    }

    /// Local identity, once the transport has issued it
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.phase, Phase::Connected { .. })
    }

    /// Role of the open connection
    pub fn role(&self) -> Option<Role> {
        match &self.phase {
            Phase::Connected { link } => Some(link.role()),
            _ => None,
        }
    }

    /// The pending or open connection, if there is one
    pub fn connection(&self) -> Option<&Connection<T::Handle>> {
        match &self.phase {
            Phase::Connecting { pending } => Some(pending),
            Phase::Connected { link } => Some(link),
            _ => None,
        }
    }

    pub fn disconnect_reason(&self) -> Option<&DisconnectReason> {
        match &self.phase {
            Phase::Disconnected { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn coordinator(&self) -> &C {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut C {
        &mut self.coordinator
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Ask the transport to come online.
    ///
    /// The session id arrives later as [`TransportEvent::Ready`]. A transport
    /// that refuses outright is fatal and moves the manager to `Disconnected`.
    pub fn initialize(&mut self) -> Result<(), SessionError> {
        if !matches!(self.phase, Phase::Uninitialized) {
            debug!(state = %self.state(), "transport already initialized");
            return Ok(());
        }

        self.phase = Phase::AwaitingIdentity;
        if let Err(e) = self.transport.initialize() {
            let message = e.to_string();
            error!(error = %message, "transport initialization failed");
            self.phase = Phase::Disconnected {
                reason: DisconnectReason::InitFailed(message.clone()),
            };
            return Err(SessionError::TransportInit(message));
        }

        debug!("waiting for session id");
        Ok(())
    }

    /// Dial a remote peer. Only honoured while idle; the connection counts as
    /// established once the transport acknowledges the open.
    pub fn connect(&mut self, remote: SessionId) {
        if !matches!(self.phase, Phase::Idle) {
            warn!(%remote, state = %self.state(), "connect request collides with current state, ignoring");
            return;
        }

        info!(%remote, "connecting to peer");
        match self.transport.connect_to(&remote) {
            Ok(handle) => {
                debug!(conn = %handle.id(), "outbound connection pending");
                self.phase = Phase::Connecting {
                    pending: Connection::new(handle, Role::Client),
                };
            }
            Err(e) => {
                let reason = e.to_string();
                let err = SessionError::Connect {
                    peer: remote,
                    reason: reason.clone(),
                };
                warn!(error = %err, "outbound connect refused");
                self.coordinator.on_connect_error(&reason);
            }
        }
    }

    /// Relay a payload to the peer.
    ///
    /// Returns false when the payload was dropped: there is no open
    /// connection, or the transport refused it. Nothing is queued.
    pub fn send(&mut self, payload: Payload) -> bool {
        let Phase::Connected { link } = &self.phase else {
            let err = SessionError::RelayDropped { len: payload.len() };
            debug!(error = %err, "send without open connection");
            return false;
        };

        match link.handle().send(&payload) {
            Ok(()) => true,
            Err(e) => {
                warn!(conn = %link.id(), error = %e, "transport refused payload");
                false
            }
        }
    }

    /// Tear the session down from this side. Terminal, like a remote drop,
    /// but the coordinator is not told about an opponent disconnect.
    pub fn disconnect(&mut self) {
        let previous = mem::replace(
            &mut self.phase,
            Phase::Disconnected {
                reason: DisconnectReason::Local,
            },
        );

        match previous {
            Phase::Connected { mut link } => {
                info!(conn = %link.id(), peer = %link.remote(), "closing connection");
                link.close();
            }
            Phase::Connecting { mut pending } => {
                info!(conn = %pending.id(), peer = %pending.remote(), "abandoning pending connection");
                pending.close();
            }
            Phase::Disconnected { reason } => {
                self.phase = Phase::Disconnected { reason };
            }
            _ => info!("session closed before any connection"),
        }
        self.sync_deadline = None;
    }

    pub fn handle_event(&mut self, event: TransportEvent<T::Handle>, now: Instant) {
        match event {
            TransportEvent::Ready(id) => self.on_ready(id),
            TransportEvent::InitFailed(message) => self.on_init_failed(message),
            TransportEvent::Incoming(handle) => self.admit(handle, now),
            TransportEvent::Opened(conn) => self.on_opened(conn, now),
            TransportEvent::Data { conn, payload } => self.on_data(conn, payload),
            TransportEvent::Closed(conn) => self.on_link_lost(conn, None),
            TransportEvent::Errored { conn, message } => self.on_link_lost(conn, Some(message)),
        }
    }

    /// Earliest instant at which [`handle_timeout`](Self::handle_timeout) has work to do
    pub fn poll_timeout(&self) -> Option<Instant> {
        self.sync_deadline
    }

    pub fn handle_timeout(&mut self, now: Instant) {
        let Some(deadline) = self.sync_deadline else {
            return;
        };
        if now < deadline {
            return;
        }

        self.sync_deadline = None;
        if self.is_connected() {
            debug!("requesting full state sync");
            self.coordinator.request_full_state_sync();
        }
    }

    /// Drop the active connection and end the session.
    ///
    /// Notifications for a connection that is not the active one, including
    /// a second close/error for a connection already torn down, are no-ops.
    pub fn handle_disconnect(&mut self, conn: ConnectionId, reason: DisconnectReason) {
        match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Connected { mut link } if link.id() == conn => {
                info!(%conn, peer = %link.remote(), ?reason, "opponent disconnected");
                link.close();
                self.sync_deadline = None;
                self.phase = Phase::Disconnected { reason };
                self.coordinator.on_opponent_disconnected();
            }
            other => {
                self.phase = other;
                debug!(%conn, state = %self.state(), "disconnect for inactive connection ignored");
            }
        }
    }

    fn on_ready(&mut self, id: SessionId) {
        if !matches!(self.phase, Phase::AwaitingIdentity) {
            warn!(%id, state = %self.state(), "unexpected session id, ignoring");
            return;
        }

        info!(session_id = %id, "session id acquired");
        self.session_id = Some(id);
        self.phase = Phase::Idle;
    }

    fn on_init_failed(&mut self, message: String) {
        if !matches!(self.phase, Phase::AwaitingIdentity) {
            warn!(error = %message, state = %self.state(), "transport error outside initialization");
            return;
        }

        error!(error = %message, "transport initialization failed");
        self.phase = Phase::Disconnected {
            reason: DisconnectReason::InitFailed(message),
        };
    }

    fn admit(&mut self, handle: T::Handle, now: Instant) {
        match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => {
                info!(conn = %handle.id(), peer = %handle.peer(), "accepted inbound connection");
                handle.accept();
                self.enter_connected(Connection::new(handle, Role::Host), now);
            }
            Phase::Connecting { mut pending } => {
                // First to reach Connected wins; the outbound dial has not opened yet
                info!(
                    conn = %handle.id(),
                    peer = %handle.peer(),
                    superseded = %pending.remote(),
                    "inbound connection won over pending outbound connect"
                );
                pending.close();
                handle.accept();
                self.enter_connected(Connection::new(handle, Role::Host), now);
            }
            other => {
                self.phase = other;
                let err = SessionError::AdmissionRejected {
                    peer: handle.peer().clone(),
                    state: self.state(),
                };
                info!(conn = %handle.id(), error = %err, "closing inbound connection");
                handle.close();
            }
        }
    }

    fn on_opened(&mut self, conn: ConnectionId, now: Instant) {
        match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Connecting { pending } if pending.id() == conn => {
                info!(%conn, peer = %pending.remote(), "outbound connection open");
                self.enter_connected(pending, now);
            }
            other => {
                self.phase = other;
                debug!(%conn, "open for superseded connection ignored");
            }
        }
    }

    fn on_data(&mut self, conn: ConnectionId, payload: Payload) {
        match &self.phase {
            Phase::Connected { link } if link.id() == conn => {
                self.coordinator.on_message(payload);
            }
            _ => debug!(%conn, len = payload.len(), "data for inactive connection dropped"),
        }
    }

    fn on_link_lost(&mut self, conn: ConnectionId, error: Option<String>) {
        if let Phase::Connecting { pending } = &self.phase {
            if pending.id() == conn {
                self.fail_pending(error);
                return;
            }
        }

        let reason = match error {
            Some(message) => DisconnectReason::Errored(message),
            None => DisconnectReason::Closed,
        };
        self.handle_disconnect(conn, reason);
    }

    /// An outbound dial failed before opening: report it and go back to idle
    /// so the caller may try again.
    fn fail_pending(&mut self, error: Option<String>) {
        match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Connecting { mut pending } => {
                pending.close();
                let reason = error.unwrap_or_else(|| {
                    format!("connection to {} closed before it opened", pending.remote())
                });
                let err = SessionError::Connect {
                    peer: pending.remote().clone(),
                    reason: reason.clone(),
                };
                warn!(error = %err, "outbound connection failed, back to idle");
                self.coordinator.on_connect_error(&reason);
            }
            other => self.phase = other,
        }
    }

    fn enter_connected(&mut self, mut link: Connection<T::Handle>, now: Instant) {
        link.mark_open();
        let role = link.role();
        self.phase = Phase::Connected { link };

        self.coordinator.on_role_assigned(role);
        self.coordinator.on_opponent_connected();
        if role == Role::Host {
            self.sync_deadline = Some(now + self.config.state_sync_delay);
        }
    }
}
