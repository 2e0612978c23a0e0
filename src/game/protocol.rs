// Game protocol definition
// Messages the two players exchange through the session layer

use serde::{Deserialize, Serialize};

use super::state::TableState;

/// Messages exchanged between players during a game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameMessage {
    /// Complete table state (sent by host)
    StateSync(TableState),

    /// Chat line typed by the sender
    Chat { text: String },
}

impl GameMessage {
    /// Serialize message to bytes for transmission
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize message from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_sync_serialization() {
        let mut table = TableState::racked();
        table.current_player = 2;
        table.player1_pocketed.push(3);

        let bytes = GameMessage::StateSync(table.clone()).to_bytes().unwrap();
        match GameMessage::from_bytes(&bytes).unwrap() {
            GameMessage::StateSync(decoded) => assert_eq!(decoded, table),
            other => panic!("StateSync didn't round-trip correctly, got: {:?}", other),
        }
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(GameMessage::from_bytes(&[0xff, 0xff, 0xff, 0xff]).is_err());
        assert!(GameMessage::from_bytes(&[]).is_err());
    }
}
