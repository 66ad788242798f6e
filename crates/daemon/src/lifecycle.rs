// SPDX-License-Identifier: MIT

//! Process-wide startup/shutdown (spec §4.J): acquire an exclusive lock on
//! the state directory before doing anything else fallible, bind the
//! socket last, and clean up only what this run created.

use std::fs::File;
use std::io::Write;

use fs2::FileExt;
use thiserror::Error;
use tracing::info;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine a state directory ($HOME is unset)")]
    NoStateDir,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("another simd instance already holds the lock at {0}")]
    LockFailed(std::path::PathBuf),
}

/// Held for the daemon's lifetime; dropping releases the advisory lock.
#[derive(Debug)]
pub struct StartupResult {
    _lock_file: File,
}

/// Acquires the lock file first, then creates the logs directory. A
/// `LockFailed` error means another daemon owns the state directory and
/// none of these files belong to this process — they are left untouched.
/// Any other failure cleans up the lock file it just created.
pub fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    if let Some(parent) = config.lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut lock_file = File::create(&config.lock_path)?;
    if lock_file.try_lock_exclusive().is_err() {
        return Err(LifecycleError::LockFailed(config.lock_path.clone()));
    }

    if let Err(err) = std::fs::create_dir_all(&config.logs_dir) {
        let _ = std::fs::remove_file(&config.lock_path);
        return Err(err.into());
    }
    if let Err(err) = write!(lock_file, "{}", std::process::id()) {
        let _ = std::fs::remove_file(&config.lock_path);
        return Err(err.into());
    }

    info!(lock = %config.lock_path.display(), pid = std::process::id(), "daemon lock acquired");
    Ok(StartupResult { _lock_file: lock_file })
}

/// Graceful shutdown: remove the socket and lock files this instance owns.
/// Called only after the listener has stopped accepting connections.
pub fn shutdown(config: &Config, _startup: StartupResult) {
    let _ = std::fs::remove_file(&config.socket_path);
    let _ = std::fs::remove_file(&config.lock_path);
    info!("daemon shut down cleanly");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &std::path::Path) -> Config {
        Config {
            socket_path: dir.join("sim.sock"),
            lock_path: dir.join("simd.lock"),
            logs_dir: dir.join("logs"),
            port_min: 10000,
            port_max: 10999,
        }
    }

    #[test]
    fn startup_acquires_the_lock_and_creates_the_logs_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let started = startup(&config).unwrap();
        assert!(config.logs_dir.is_dir());
        shutdown(&config, started);
        assert!(!config.lock_path.exists());
    }

    #[test]
    fn a_second_startup_against_the_same_state_dir_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let first = startup(&config).unwrap();
        let err = startup(&config).unwrap_err();
        assert!(matches!(err, LifecycleError::LockFailed(_)));
        shutdown(&config, first);
    }
}
