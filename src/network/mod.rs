// Session networking module for Cuelink
// Connection lifecycle, admission control and payload relay between two players

pub mod client;
pub mod coordinator;
pub mod loopback;
pub mod manager;
pub mod runtime;
pub mod state;
pub mod transport;

pub use client::{SessionClient, SessionCommand};
pub use coordinator::{ChannelCoordinator, SessionCoordinator, SessionEvent};
pub use loopback::{LoopbackEvents, LoopbackHandle, LoopbackNetwork, LoopbackTransport};
pub use manager::{ConnectionManager, ManagerConfig, DEFAULT_STATE_SYNC_DELAY};
pub use runtime::{start_session, SessionDriver};
pub use state::{Connection, ConnectionState, DisconnectReason, LinkState, Role};
pub use transport::{ConnectionHandle, ConnectionId, Payload, SessionId, Transport, TransportEvent};
