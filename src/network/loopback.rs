// In-process peer transport
// A shared broker hands out session ids and wires duplex links between endpoints.
// Used by the demo binary and the async tests; behaves like a reliable ordered channel.

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};

use rand::Rng;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::transport::{ConnectionHandle, ConnectionId, SessionId, Transport, TransportEvent};
use crate::error::TransportError;

/// Length of generated session ids unless configured otherwise
pub const DEFAULT_ID_LENGTH: usize = 6;

type EventSender = mpsc::UnboundedSender<TransportEvent<LoopbackHandle>>;

/// Receiving half of an endpoint's transport notifications
pub type LoopbackEvents = mpsc::UnboundedReceiver<TransportEvent<LoopbackHandle>>;

#[derive(Debug, Default)]
struct Broker {
    peers: HashMap<SessionId, EventSender>,
    next_conn: u64,
}

impl Broker {
    fn next_conn_id(&mut self) -> ConnectionId {
        self.next_conn += 1;
        ConnectionId(self.next_conn)
    }

    fn unused_id(&self, length: usize) -> SessionId {
        loop {
            let id = generate_short_peer_id(length);
            if !self.peers.contains_key(&id) {
                return id;
            }
        }
    }
}

/// Generate a short, human-friendly peer id (uppercase letters)
fn generate_short_peer_id(length: usize) -> SessionId {
    let mut rng = rand::thread_rng();
    let id: String = (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..26);
            (b'A' + idx) as char
        })
        .collect();
    SessionId::from(id)
}

/// Shared broker all loopback endpoints register with
#[derive(Debug, Clone)]
pub struct LoopbackNetwork {
    broker: Arc<Mutex<Broker>>,
    online: bool,
    id_length: usize,
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        Self {
            broker: Arc::new(Mutex::new(Broker::default())),
            online: true,
            id_length: DEFAULT_ID_LENGTH,
        }
    }

    /// A network whose broker can never be reached; every endpoint fails to
    /// initialize
    pub fn offline() -> Self {
        Self {
            online: false,
            ..Self::new()
        }
    }

    pub fn with_id_length(mut self, length: usize) -> Self {
        self.id_length = length.max(1);
        self
    }

    /// Create a new endpoint and the stream of events it will produce
    pub fn endpoint(&self) -> (LoopbackTransport, LoopbackEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = LoopbackTransport {
            network: self.clone(),
            events: tx,
            session_id: None,
        };
        (transport, rx)
    }

    /// Number of endpoints currently online
    pub fn peer_count(&self) -> usize {
        self.broker().peers.len()
    }

    fn broker(&self) -> MutexGuard<'_, Broker> {
        // A panic while holding the lock leaves the map itself intact
        self.broker.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for LoopbackNetwork {
    fn default() -> Self {
        Self::new()
    }
}

/// One peer's view of the loopback network
#[derive(Debug)]
pub struct LoopbackTransport {
    network: LoopbackNetwork,
    events: EventSender,
    session_id: Option<SessionId>,
}

impl LoopbackTransport {
    fn emit(&self, event: TransportEvent<LoopbackHandle>) {
        if self.events.send(event).is_err() {
            debug!("loopback endpoint events dropped: receiver gone");
        }
    }
}

impl Transport for LoopbackTransport {
    type Handle = LoopbackHandle;

    fn initialize(&mut self) -> Result<(), TransportError> {
        if self.session_id.is_some() {
            return Err(TransportError::AlreadyInitialized);
        }

        if !self.network.online {
            self.emit(TransportEvent::InitFailed(
                "could not reach the peer broker".to_string(),
            ));
            return Ok(());
        }

        let id = {
            let mut broker = self.network.broker();
            let id = broker.unused_id(self.network.id_length);
            broker.peers.insert(id.clone(), self.events.clone());
            id
        };
        debug!(session_id = %id, "loopback endpoint registered");
        self.session_id = Some(id.clone());
        self.emit(TransportEvent::Ready(id));
        Ok(())
    }

    fn connect_to(&mut self, remote: &SessionId) -> Result<LoopbackHandle, TransportError> {
        let local = self.session_id.clone().ok_or(TransportError::NotInitialized)?;

        let mut broker = self.network.broker();
        let dial_id = broker.next_conn_id();
        let link = Arc::new(AtomicBool::new(false));

        let Some(remote_tx) = broker.peers.get(remote).cloned() else {
            drop(broker);
            warn!(%remote, "loopback dial to unknown peer");
            self.emit(TransportEvent::Errored {
                conn: dial_id,
                message: format!("Could not connect to peer {remote}"),
            });
            return Ok(LoopbackHandle {
                id: dial_id,
                peer: remote.clone(),
                own_events: self.events.clone(),
                remote: None,
                closed: link,
            });
        };
        let accept_id = broker.next_conn_id();
        drop(broker);

        let accepted = LoopbackHandle {
            id: accept_id,
            peer: local,
            own_events: remote_tx.clone(),
            remote: Some(RemoteEnd {
                events: self.events.clone(),
                conn: dial_id,
            }),
            closed: link.clone(),
        };
        let dialed = LoopbackHandle {
            id: dial_id,
            peer: remote.clone(),
            own_events: self.events.clone(),
            remote: Some(RemoteEnd {
                events: remote_tx.clone(),
                conn: accept_id,
            }),
            closed: link,
        };

        // The dialer hears Opened once the remote side accepts
        let _ = remote_tx.send(TransportEvent::Incoming(accepted));
        Ok(dialed)
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        if let Some(id) = self.session_id.take() {
            self.network.broker().peers.remove(&id);
        }
    }
}

#[derive(Debug)]
struct RemoteEnd {
    events: EventSender,
    conn: ConnectionId,
}

/// One end of a loopback link. Both ends share the closed flag.
#[derive(Debug)]
pub struct LoopbackHandle {
    id: ConnectionId,
    peer: SessionId,
    own_events: EventSender,
    remote: Option<RemoteEnd>,
    closed: Arc<AtomicBool>,
}

impl ConnectionHandle for LoopbackHandle {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer(&self) -> &SessionId {
        &self.peer
    }

    fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::ChannelClosed(self.id));
        }
        let remote = self.remote.as_ref().ok_or(TransportError::ChannelClosed(self.id))?;
        remote
            .events
            .send(TransportEvent::Data {
                conn: remote.conn,
                payload: payload.to_vec(),
            })
            .map_err(|_| TransportError::ChannelClosed(self.id))
    }

    fn accept(&self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if let Some(remote) = &self.remote {
            let _ = remote.events.send(TransportEvent::Opened(remote.conn));
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.own_events.send(TransportEvent::Closed(self.id));
        if let Some(remote) = &self.remote {
            let _ = remote.events.send(TransportEvent::Closed(remote.conn));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_endpoint(network: &LoopbackNetwork) -> (LoopbackTransport, LoopbackEvents, SessionId) {
        let (mut transport, mut events) = network.endpoint();
        transport.initialize().unwrap();
        match events.try_recv().unwrap() {
            TransportEvent::Ready(id) => (transport, events, id),
            other => panic!("expected Ready, got {:?}", other),
        }
    }

    #[test]
    fn test_initialize_issues_short_uppercase_id() {
        let network = LoopbackNetwork::new().with_id_length(4);
        let (_transport, _events, id) = ready_endpoint(&network);

        assert_eq!(id.as_str().len(), 4);
        assert!(id.as_str().chars().all(|c| c.is_ascii_uppercase()));
        assert_eq!(network.peer_count(), 1);
    }

    #[test]
    fn test_initialize_twice_is_refused() {
        let network = LoopbackNetwork::new();
        let (mut transport, _events, _id) = ready_endpoint(&network);

        assert!(matches!(
            transport.initialize(),
            Err(TransportError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_offline_network_reports_init_failure() {
        let network = LoopbackNetwork::offline();
        let (mut transport, mut events) = network.endpoint();
        transport.initialize().unwrap();

        assert!(matches!(events.try_recv(), Ok(TransportEvent::InitFailed(_))));
        assert_eq!(network.peer_count(), 0);
    }

    #[test]
    fn test_connect_before_initialize_fails() {
        let network = LoopbackNetwork::new();
        let (mut transport, _events) = network.endpoint();

        assert!(matches!(
            transport.connect_to(&SessionId::from("ABCD")),
            Err(TransportError::NotInitialized)
        ));
    }

    #[test]
    fn test_dial_unknown_peer_reports_error_event() {
        let network = LoopbackNetwork::new();
        let (mut transport, mut events, _id) = ready_endpoint(&network);

        let handle = transport.connect_to(&SessionId::from("NOPE")).unwrap();
        match events.try_recv().unwrap() {
            TransportEvent::Errored { conn, message } => {
                assert_eq!(conn, handle.id());
                assert_eq!(message, "Could not connect to peer NOPE");
            }
            other => panic!("expected Errored, got {:?}", other),
        }
        assert!(handle.send(b"x").is_err());
    }

    #[test]
    fn test_link_delivers_in_order_both_ways() {
        let network = LoopbackNetwork::new();
        let (_host, mut host_events, host_id) = ready_endpoint(&network);
        let (mut guest, mut guest_events, guest_id) = ready_endpoint(&network);

        let dialed = guest.connect_to(&host_id).unwrap();
        assert!(guest_events.try_recv().is_err());
        let accepted = match host_events.try_recv().unwrap() {
            TransportEvent::Incoming(handle) => handle,
            other => panic!("expected Incoming, got {:?}", other),
        };
        accepted.accept();
        assert!(matches!(guest_events.try_recv(), Ok(TransportEvent::Opened(conn)) if conn == dialed.id()));
        assert_eq!(accepted.peer(), &guest_id);
        assert_eq!(dialed.peer(), &host_id);

        dialed.send(b"one").unwrap();
        dialed.send(b"two").unwrap();
        accepted.send(b"back").unwrap();

        for expected in [b"one".as_slice(), b"two".as_slice()] {
            match host_events.try_recv().unwrap() {
                TransportEvent::Data { conn, payload } => {
                    assert_eq!(conn, accepted.id());
                    assert_eq!(payload, expected);
                }
                other => panic!("expected Data, got {:?}", other),
            }
        }
        assert!(matches!(
            guest_events.try_recv(),
            Ok(TransportEvent::Data { payload, .. }) if payload == b"back"
        ));
    }

    #[test]
    fn test_close_notifies_both_ends_once() {
        let network = LoopbackNetwork::new();
        let (_host, mut host_events, host_id) = ready_endpoint(&network);
        let (mut guest, mut guest_events, _guest_id) = ready_endpoint(&network);

        let dialed = guest.connect_to(&host_id).unwrap();
        let accepted = match host_events.try_recv().unwrap() {
            TransportEvent::Incoming(handle) => handle,
            other => panic!("expected Incoming, got {:?}", other),
        };
        accepted.accept();
        assert!(matches!(guest_events.try_recv(), Ok(TransportEvent::Opened(_))));

        accepted.close();
        accepted.close();
        dialed.close();

        assert!(matches!(host_events.try_recv(), Ok(TransportEvent::Closed(c)) if c == accepted.id()));
        assert!(matches!(guest_events.try_recv(), Ok(TransportEvent::Closed(c)) if c == dialed.id()));
        assert!(host_events.try_recv().is_err());
        assert!(guest_events.try_recv().is_err());
        assert!(dialed.send(b"late").is_err());
    }

    #[test]
    fn test_link_closed_before_accept_never_opens_for_dialer() {
        let network = LoopbackNetwork::new();
        let (_host, mut host_events, host_id) = ready_endpoint(&network);
        let (mut guest, mut guest_events, _guest_id) = ready_endpoint(&network);

        let dialed = guest.connect_to(&host_id).unwrap();
        let rejected = match host_events.try_recv().unwrap() {
            TransportEvent::Incoming(handle) => handle,
            other => panic!("expected Incoming, got {:?}", other),
        };
        rejected.close();
        rejected.accept();

        assert!(matches!(guest_events.try_recv(), Ok(TransportEvent::Closed(c)) if c == dialed.id()));
        assert!(guest_events.try_recv().is_err());
    }

    #[test]
    fn test_dropping_transport_unregisters_peer() {
        let network = LoopbackNetwork::new();
        let (transport, _events, _id) = ready_endpoint(&network);
        assert_eq!(network.peer_count(), 1);

        drop(transport);
        assert_eq!(network.peer_count(), 0);
    }
}
