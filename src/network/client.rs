// Session client interface for the game loop
// Provides channels to communicate with the session driver task

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::mpsc;

use super::coordinator::SessionEvent;
use super::transport::{Payload, SessionId};
use crate::error::SessionError;

/// Commands the game loop sends to the driver task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Dial a remote peer (client role)
    Connect(SessionId),

    /// Relay a payload to the opponent
    Send(Payload),

    /// End the session from this side
    Disconnect,
}

/// Handle for the game loop to talk to the session.
/// Uses channels to send/receive messages to/from the driver task.
#[derive(Debug)]
pub struct SessionClient {
    session_id: SessionId,

    /// Commands TO the driver
    tx: mpsc::UnboundedSender<SessionCommand>,

    /// Events FROM the driver
    rx: mpsc::UnboundedReceiver<SessionEvent>,

    /// Mirrors whether the driver holds an open connection
    connected: Arc<AtomicBool>,
}

impl SessionClient {
    pub(crate) fn new(
        session_id: SessionId,
        tx: mpsc::UnboundedSender<SessionCommand>,
        rx: mpsc::UnboundedReceiver<SessionEvent>,
        connected: Arc<AtomicBool>,
    ) -> Self {
        Self {
            session_id,
            tx,
            rx,
            connected,
        }
    }

    /// Identity the opponent dials to join this session
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn connect(&self, remote: SessionId) -> Result<(), SessionError> {
        self.command(SessionCommand::Connect(remote))
    }

    /// Queue a payload for the opponent. It is dropped by the driver if no
    /// connection is open when it gets there.
    pub fn send(&self, payload: Payload) -> Result<(), SessionError> {
        self.command(SessionCommand::Send(payload))
    }

    pub fn disconnect(&self) -> Result<(), SessionError> {
        self.command(SessionCommand::Disconnect)
    }

    /// Try to receive a session event (non-blocking)
    pub fn try_recv_event(&mut self) -> Option<SessionEvent> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next session event. `None` once the driver has stopped
    /// and every pending event was delivered.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.rx.recv().await
    }

    fn command(&self, cmd: SessionCommand) -> Result<(), SessionError> {
        self.tx.send(cmd).map_err(|_| SessionError::DriverStopped)
    }
}
