// Session coordinator interface
// The connection manager reports lifecycle and data events here and nowhere else

use tokio::sync::mpsc;

use super::state::Role;
use super::transport::Payload;

/// Consumer of connection lifecycle events; owns game and chat semantics.
///
/// Every callback runs synchronously inside the manager's event flow, so
/// implementations must not block.
pub trait SessionCoordinator {
    fn on_role_assigned(&mut self, role: Role);

    fn on_opponent_connected(&mut self);

    fn on_opponent_disconnected(&mut self);

    /// Payload exactly as the transport delivered it
    fn on_message(&mut self, payload: Payload);

    /// Human-readable reason an outbound connect did not succeed
    fn on_connect_error(&mut self, message: &str);

    /// Host only: push the full game state to the newly joined peer
    fn request_full_state_sync(&mut self);
}

/// Coordinator callbacks as values, for consumers outside the driver task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    RoleAssigned(Role),
    OpponentConnected,
    OpponentDisconnected,
    Message(Payload),
    ConnectError(String),
    FullStateSyncRequested,
}

/// Forwards every callback over a channel to the game loop
#[derive(Debug, Clone)]
pub struct ChannelCoordinator {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelCoordinator {
    pub fn new(tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { tx }
    }

    fn emit(&self, event: SessionEvent) {
        // A dropped receiver means nobody is listening anymore
        let _ = self.tx.send(event);
    }
}

impl SessionCoordinator for ChannelCoordinator {
    fn on_role_assigned(&mut self, role: Role) {
        self.emit(SessionEvent::RoleAssigned(role));
    }

    fn on_opponent_connected(&mut self) {
        self.emit(SessionEvent::OpponentConnected);
    }

    fn on_opponent_disconnected(&mut self) {
        self.emit(SessionEvent::OpponentDisconnected);
    }

    fn on_message(&mut self, payload: Payload) {
        self.emit(SessionEvent::Message(payload));
    }

    fn on_connect_error(&mut self, message: &str) {
        self.emit(SessionEvent::ConnectError(message.to_string()));
    }

    fn request_full_state_sync(&mut self) {
        self.emit(SessionEvent::FullStateSyncRequested);
    }
}
