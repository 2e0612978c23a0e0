// Game-side session coordinator
// Turns session events into player numbering, turn ownership, table sync and chat

use tracing::{debug, warn};

use super::protocol::GameMessage;
use super::state::TableState;
use crate::error::SessionError;
use crate::network::{Role, SessionClient, SessionEvent, SessionId};

/// Host plays as player 1, the joining client as player 2
pub fn player_number(role: Role) -> u8 {
    match role {
        Role::Host => 1,
        Role::Client => 2,
    }
}

pub fn player_color(player: u8) -> &'static str {
    match player {
        1 => "red",
        _ => "blue",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub text: String,
    pub from_self: bool,
}

/// One player's view of a networked game
pub struct GameSession {
    client: SessionClient,
    role: Option<Role>,
    my_player_number: Option<u8>,
    opponent_connected: bool,
    table: TableState,
    state_syncs_received: u32,
    log: Vec<String>,
    chat: Vec<ChatLine>,
}

impl GameSession {
    pub fn new(client: SessionClient) -> Self {
        Self {
            client,
            role: None,
            my_player_number: None,
            opponent_connected: false,
            table: TableState::racked(),
            state_syncs_received: 0,
            log: Vec::new(),
            chat: Vec::new(),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        self.client.session_id()
    }

    pub fn client(&self) -> &SessionClient {
        &self.client
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn my_player_number(&self) -> Option<u8> {
        self.my_player_number
    }

    pub fn opponent_connected(&self) -> bool {
        self.opponent_connected
    }

    pub fn table(&self) -> &TableState {
        &self.table
    }

    pub fn state_syncs_received(&self) -> u32 {
        self.state_syncs_received
    }

    /// Game log lines, oldest first
    pub fn log(&self) -> &[String] {
        &self.log
    }

    pub fn chat(&self) -> &[ChatLine] {
        &self.chat
    }

    pub fn is_my_turn(&self) -> bool {
        self.opponent_connected
            && !self.table.game_over
            && self.my_player_number == Some(self.table.current_player)
    }

    /// Join the game hosted under `remote`
    pub fn join(&mut self, remote: SessionId) -> Result<(), SessionError> {
        self.log_message(format!("Joining game {remote}..."));
        self.client.connect(remote)
    }

    pub fn leave(&self) -> Result<(), SessionError> {
        self.client.disconnect()
    }

    /// Wait for one session event and apply it. Returns false once the
    /// session has ended and no events remain.
    pub async fn pump(&mut self) -> bool {
        match self.client.next_event().await {
            Some(event) => {
                self.apply(event);
                true
            }
            None => false,
        }
    }

    pub fn apply(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::RoleAssigned(role) => {
                self.role = Some(role);
                self.my_player_number = Some(player_number(role));
            }
            SessionEvent::OpponentConnected => {
                self.opponent_connected = true;
                let message = match self.role {
                    Some(Role::Host) => "Player 2 has joined! You are Player 1 (red).",
                    Some(Role::Client) => "Connected to Player 1! You are Player 2 (blue).",
                    None => "Opponent connected.",
                };
                self.log_message(message);
            }
            SessionEvent::OpponentDisconnected => {
                self.opponent_connected = false;
                self.log_message("Opponent disconnected.");
            }
            SessionEvent::Message(payload) => self.handle_network_message(&payload),
            SessionEvent::ConnectError(message) => {
                self.log_message(format!("Failed to connect: {message}"));
            }
            SessionEvent::FullStateSyncRequested => {
                if let Err(e) = self.sync_state_to_remote() {
                    warn!(error = %e, "initial state sync not sent");
                }
            }
        }
    }

    /// Push the whole table to the opponent
    pub fn sync_state_to_remote(&self) -> Result<(), SessionError> {
        self.send_message(&GameMessage::StateSync(self.table.clone()))
    }

    /// Send a chat line and record it locally. Fails with `RelayDropped`
    /// when no opponent is connected; nothing is recorded then.
    pub fn send_chat(&mut self, text: &str) -> Result<(), SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        if !self.client.is_connected() {
            return Err(SessionError::RelayDropped { len: text.len() });
        }

        self.send_message(&GameMessage::Chat {
            text: text.to_string(),
        })?;
        self.chat.push(ChatLine {
            text: text.to_string(),
            from_self: true,
        });
        Ok(())
    }

    /// Put the session id on the system clipboard so it can be shared
    pub fn copy_session_id(&mut self) -> bool {
        let id = self.session_id().to_string();
        let copied = arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(id));

        match copied {
            Ok(()) => {
                self.log_message("Game ID copied to clipboard! Share it with a friend.");
                true
            }
            Err(e) => {
                warn!(error = %e, "clipboard unavailable");
                self.log_message("Please select and copy the Game ID manually.");
                false
            }
        }
    }

    fn handle_network_message(&mut self, payload: &[u8]) {
        match GameMessage::from_bytes(payload) {
            Ok(GameMessage::StateSync(table)) => {
                debug!(current_player = table.current_player, "table state received");
                self.table = table;
                self.state_syncs_received += 1;
            }
            Ok(GameMessage::Chat { text }) => {
                self.chat.push(ChatLine {
                    text,
                    from_self: false,
                });
            }
            Err(e) => {
                warn!(error = %e, len = payload.len(), "undecodable game message dropped");
            }
        }
    }

    fn send_message(&self, msg: &GameMessage) -> Result<(), SessionError> {
        let bytes = msg
            .to_bytes()
            .map_err(|e| SessionError::Encode(e.to_string()))?;
        self.client.send(bytes)
    }

    fn log_message(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!(%message, "game log");
        self.log.push(message);
    }
}
