// Game-side consumer of the session layer
// Owns player numbering, the shared table snapshot and chat

pub mod protocol;
pub mod session;
pub mod state;

pub use protocol::GameMessage;
pub use session::{player_color, player_number, ChatLine, GameSession};
pub use state::{Ball, BallGroup, TableState};
