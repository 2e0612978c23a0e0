// Session runtime - drives the connection manager inside one tokio task
// Bridges transport events, game loop commands and the state-sync timer

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::client::{SessionClient, SessionCommand};
use super::coordinator::{ChannelCoordinator, SessionCoordinator};
use super::manager::{ConnectionManager, ManagerConfig};
use super::state::{ConnectionState, DisconnectReason};
use super::transport::{SessionId, Transport, TransportEvent};
use crate::error::SessionError;

/// Bring a transport online and spawn the driver task for it.
///
/// Resolves once the session id is known; a transport that cannot come
/// online is reported as [`SessionError::TransportInit`] and nothing is
/// spawned. Must be called from within a tokio runtime.
pub async fn start_session<T>(
    transport: T,
    events: mpsc::UnboundedReceiver<TransportEvent<T::Handle>>,
    config: ManagerConfig,
) -> Result<SessionClient, SessionError>
where
    T: Transport + Send + 'static,
    T::Handle: Send + 'static,
{
    // Create channels for bidirectional communication
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

    // Shared connection state flag
    let connected = Arc::new(AtomicBool::new(false));

    let manager = ConnectionManager::new(transport, ChannelCoordinator::new(event_tx), config);
    let mut driver = SessionDriver::new(manager, events);
    let session_id = driver.acquire_identity().await?;

    tokio::spawn(driver.run(cmd_rx, connected.clone()));

    Ok(SessionClient::new(session_id, cmd_tx, event_rx, connected))
}

/// Owns a connection manager and feeds it from the transport's event stream.
///
/// All manager logic runs on the task polling the driver, one event at a time.
pub struct SessionDriver<T: Transport, C> {
    manager: ConnectionManager<T, C>,
    events: mpsc::UnboundedReceiver<TransportEvent<T::Handle>>,
}

impl<T: Transport, C: SessionCoordinator> SessionDriver<T, C> {
    pub fn new(
        manager: ConnectionManager<T, C>,
        events: mpsc::UnboundedReceiver<TransportEvent<T::Handle>>,
    ) -> Self {
        Self { manager, events }
    }

    pub fn manager(&self) -> &ConnectionManager<T, C> {
        &self.manager
    }

    /// Initialize the transport and wait until it issues our session id
    pub async fn acquire_identity(&mut self) -> Result<SessionId, SessionError> {
        if let Some(id) = self.manager.session_id() {
            return Ok(id.clone());
        }
        self.manager.initialize()?;

        loop {
            let Some(event) = self.events.recv().await else {
                return Err(SessionError::TransportInit(
                    "transport event stream ended".to_string(),
                ));
            };
            self.dispatch(event);

            match self.manager.state() {
                ConnectionState::AwaitingIdentity => continue,
                ConnectionState::Disconnected => {
                    let message = match self.manager.disconnect_reason() {
                        Some(DisconnectReason::InitFailed(message)) => message.clone(),
                        _ => "transport went away during initialization".to_string(),
                    };
                    return Err(SessionError::TransportInit(message));
                }
                _ => {
                    if let Some(id) = self.manager.session_id() {
                        return Ok(id.clone());
                    }
                }
            }
        }
    }

    /// Main event loop. Runs until the session is disconnected, the game
    /// loop asks to stop, or the transport goes away.
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
        connected: Arc<AtomicBool>,
    ) {
        info!("session driver running");

        loop {
            let deadline = self.manager.poll_timeout().map(Instant::from_std);

            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.dispatch(event),
                    None => {
                        warn!("transport event stream ended");
                        self.manager.disconnect();
                    }
                },
                cmd = commands.recv() => match cmd {
                    Some(SessionCommand::Connect(remote)) => self.manager.connect(remote),
                    Some(SessionCommand::Send(payload)) => {
                        self.manager.send(payload);
                    }
                    Some(SessionCommand::Disconnect) | None => self.manager.disconnect(),
                },
                _ = sleep_until_deadline(deadline) => {
                    self.manager.handle_timeout(Instant::now().into_std());
                }
            }

            connected.store(self.manager.is_connected(), Ordering::Relaxed);
            if self.manager.state() == ConnectionState::Disconnected {
                info!(reason = ?self.manager.disconnect_reason(), "session ended");
                break;
            }
        }
    }

    fn dispatch(&mut self, event: TransportEvent<T::Handle>) {
        if let Some(conn) = event.connection() {
            debug!(%conn, "transport event");
        }
        self.manager.handle_event(event, Instant::now().into_std());
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::coordinator::SessionEvent;
    use crate::network::loopback::LoopbackNetwork;
    use crate::network::state::Role;
    use std::time::Duration;

    async fn start(network: &LoopbackNetwork) -> SessionClient {
        let (transport, events) = network.endpoint();
        start_session(transport, events, ManagerConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_and_client_handshake() {
        let network = LoopbackNetwork::new();
        let mut host = start(&network).await;
        let mut guest = start(&network).await;
        assert_ne!(host.session_id(), guest.session_id());

        let started = Instant::now();
        guest.connect(host.session_id().clone()).unwrap();

        assert_eq!(guest.next_event().await, Some(SessionEvent::RoleAssigned(Role::Client)));
        assert_eq!(guest.next_event().await, Some(SessionEvent::OpponentConnected));

        assert_eq!(host.next_event().await, Some(SessionEvent::RoleAssigned(Role::Host)));
        assert_eq!(host.next_event().await, Some(SessionEvent::OpponentConnected));
        assert_eq!(host.next_event().await, Some(SessionEvent::FullStateSyncRequested));
        assert!(started.elapsed() >= Duration::from_millis(500));

        assert!(host.is_connected());
        assert!(guest.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_payloads_relay_in_order() {
        let network = LoopbackNetwork::new();
        let mut host = start(&network).await;
        let mut guest = start(&network).await;
        guest.connect(host.session_id().clone()).unwrap();
        guest.next_event().await;
        guest.next_event().await;

        for i in 0..3u8 {
            guest.send(vec![i]).unwrap();
        }

        let mut received = Vec::new();
        while received.len() < 3 {
            match host.next_event().await {
                Some(SessionEvent::Message(payload)) => received.push(payload),
                Some(_) => {}
                None => panic!("host session ended early"),
            }
        }
        assert_eq!(received, vec![vec![0], vec![1], vec![2]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_guest_disconnect_reaches_host_once() {
        let network = LoopbackNetwork::new();
        let mut host = start(&network).await;
        let mut guest = start(&network).await;
        guest.connect(host.session_id().clone()).unwrap();
        guest.next_event().await;
        guest.next_event().await;

        guest.disconnect().unwrap();

        let mut events = Vec::new();
        while let Some(event) = host.next_event().await {
            events.push(event);
        }
        let disconnects = events
            .iter()
            .filter(|e| **e == SessionEvent::OpponentDisconnected)
            .count();
        assert_eq!(disconnects, 1);
        assert!(!host.is_connected());

        // the driver is gone once the session ended
        assert!(matches!(host.send(vec![1]), Err(SessionError::DriverStopped)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_to_unknown_peer_reports_error() {
        let network = LoopbackNetwork::new();
        let mut guest = start(&network).await;

        guest.connect(SessionId::from("NO-SUCH-PEER")).unwrap();

        assert_eq!(
            guest.next_event().await,
            Some(SessionEvent::ConnectError("Could not connect to peer NO-SUCH-PEER".into()))
        );
        assert!(!guest.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_third_peer_is_refused_and_can_retry() {
        let network = LoopbackNetwork::new();
        let mut host = start(&network).await;
        let mut guest = start(&network).await;
        let mut third = start(&network).await;

        guest.connect(host.session_id().clone()).unwrap();
        assert_eq!(guest.next_event().await, Some(SessionEvent::RoleAssigned(Role::Client)));
        assert_eq!(guest.next_event().await, Some(SessionEvent::OpponentConnected));

        third.connect(host.session_id().clone()).unwrap();
        match third.next_event().await {
            Some(SessionEvent::ConnectError(message)) => {
                assert!(message.contains(host.session_id().as_str()))
            }
            other => panic!("expected ConnectError, got {:?}", other),
        }
        assert!(!third.is_connected());

        // still idle, so a second attempt is processed rather than dropped
        third.connect(host.session_id().clone()).unwrap();
        assert!(matches!(
            third.next_event().await,
            Some(SessionEvent::ConnectError(_))
        ));
        assert!(third.try_recv_event().is_none());

        assert_eq!(host.next_event().await, Some(SessionEvent::RoleAssigned(Role::Host)));
        assert_eq!(host.next_event().await, Some(SessionEvent::OpponentConnected));
        assert_eq!(host.next_event().await, Some(SessionEvent::FullStateSyncRequested));
        assert!(host.try_recv_event().is_none());
        assert!(host.is_connected());
        assert!(guest.is_connected());
    }

    #[tokio::test]
    async fn test_offline_transport_fails_to_start() {
        let network = LoopbackNetwork::offline();
        let (transport, events) = network.endpoint();

        let err = start_session(transport, events, ManagerConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::TransportInit(msg) if msg.contains("broker")));
    }
}
