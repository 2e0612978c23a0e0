// Cuelink configuration types
// Every section falls back to defaults when missing from the file

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::network::{loopback::DEFAULT_ID_LENGTH, ManagerConfig, DEFAULT_STATE_SYNC_DELAY};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    // Delay between admitting a client and pushing the full table (host only)
    pub state_sync_delay_ms: u64,

    // Length of generated session ids
    pub id_length: usize,
}

impl SessionConfig {
    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            state_sync_delay: Duration::from_millis(self.state_sync_delay_ms),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            state_sync_delay_ms: DEFAULT_STATE_SYNC_DELAY.as_millis() as u64,
            id_length: DEFAULT_ID_LENGTH,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    // Same as passing --debug
    pub debug: bool,

    pub log_file: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            debug: false,
            log_file: PathBuf::from("/tmp/cuelink-debug.log"),
        }
    }
}
