// Configuration file loading and creation

use super::types::Config;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Get the path to the configuration file
pub fn get_config_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("cuelink");

    // Create config directory if it doesn't exist
    fs::create_dir_all(&path).ok();

    path.push("config.toml");
    path
}

/// Load configuration from file, or create default if it doesn't exist
pub fn load_config() -> Result<Config, io::Error> {
    load_config_from(&get_config_path())
}

/// Load configuration from `path`. A missing file is created with defaults;
/// a file that fails to parse is reported and replaced by defaults in memory.
pub fn load_config_from(path: &Path) -> Result<Config, io::Error> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        match toml::from_str(&contents) {
            Ok(config) => Ok(config),
            Err(e) => {
                // Logging is not up yet when the config is read
                eprintln!("Warning: Failed to parse config file: {}", e);
                eprintln!("Using default configuration");
                warn!(path = %path.display(), error = %e, "config parse failed");
                Ok(Config::default())
            }
        }
    } else {
        create_default_config(path)?;
        Ok(Config::default())
    }
}

/// Create a default configuration file with helpful comments
pub fn create_default_config(path: &Path) -> Result<(), io::Error> {
    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    let commented_toml = format!(
        "# Cuelink Configuration File\n\
         # After editing, restart the game for changes to take effect\n\
         #\n\
         # state_sync_delay_ms: how long the host waits before sending the table\n\
         # log_file: written only when debug = true or --debug is passed\n\n\
         {}",
        toml_string
    );

    fs::write(path, commented_toml)?;
    println!("Created default config file at: {}", path.display());
    Ok(())
}
