// Cuelink - two-player pool over a peer-to-peer session
// Session lifecycle, game coordination, configuration and logging

pub mod config;
pub mod debug;
pub mod error;
pub mod game;
pub mod network;

pub use error::{SessionError, TransportError};
pub use game::{GameMessage, GameSession};
pub use network::{start_session, ConnectionManager, SessionClient, SessionCoordinator, SessionEvent};
