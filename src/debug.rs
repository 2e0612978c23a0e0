// Debug logging module for Cuelink
// Routes tracing output to a file when enabled via --debug or the config

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// With `enabled` set, the log file is truncated, given a header, and
/// receives everything down to `debug` (overridable through `RUST_LOG`).
/// Otherwise only warnings reach stderr. Calling this more than once keeps
/// the first subscriber.
pub fn init(enabled: bool, log_path: &Path) -> io::Result<()> {
    if !enabled {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter("warn"))
            .with_writer(io::stderr)
            .try_init();
        return Ok(());
    }

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_path)?;

    writeln!(file, "=== Cuelink Debug Log ===")?;
    writeln!(file, "Session started: {:?}", SystemTime::now())?;
    writeln!(file, "To monitor: tail -f {}", log_path.display())?;
    writeln!(file, "========================================\n")?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter("cuelink=debug,info"))
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();

    Ok(())
}

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled_logging_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debug.log");

        init(true, &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("=== Cuelink Debug Log ==="));
        assert!(contents.contains(&path.display().to_string()));
    }

    #[test]
    fn test_disabled_logging_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debug.log");

        init(false, &path).unwrap();

        assert!(!path.exists());
    }
}
