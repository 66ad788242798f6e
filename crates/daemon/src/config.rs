// SPDX-License-Identifier: MIT

//! Shared configuration surface for both binaries (spec §4.M): socket
//! path, log directory, port range, and the daemon's own listen address
//! (which doubles as the `--launcher` callback address handed to every
//! spawned engine controller).

use std::path::PathBuf;

use thiserror::Error;

use crate::env;
use crate::lifecycle::LifecycleError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Lifecycle(#[from] LifecycleError),
    #[error("invalid --port-range {0:?}: expected \"lo-hi\"")]
    InvalidPortRange(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub socket_path: PathBuf,
    pub lock_path: PathBuf,
    pub logs_dir: PathBuf,
    pub port_min: u32,
    pub port_max: u32,
}

impl Config {
    /// Resolves a config rooted at the state directory, applying the
    /// flags parsed by the caller (each binary parses its own CLI args
    /// and hands the results in; this function owns only path/defaults
    /// logic, not flag parsing).
    pub fn load(listen: Option<PathBuf>, port_range: Option<&str>, logs_dir: Option<PathBuf>) -> Result<Self, ConfigError> {
        let state_dir = env::state_dir()?;
        let socket_path = listen.unwrap_or_else(|| state_dir.join("sim.sock"));
        let lock_path = state_dir.join("simd.lock");
        let logs_dir = logs_dir.unwrap_or_else(|| state_dir.join("logs"));
        let (port_min, port_max) = match port_range {
            Some(range) => parse_port_range(range)?,
            None => (10000, 10999),
        };
        Ok(Self { socket_path, lock_path, logs_dir, port_min, port_max })
    }
}

fn parse_port_range(range: &str) -> Result<(u32, u32), ConfigError> {
    let (lo, hi) = range
        .split_once('-')
        .ok_or_else(|| ConfigError::InvalidPortRange(range.to_string()))?;
    let lo: u32 = lo.parse().map_err(|_| ConfigError::InvalidPortRange(range.to_string()))?;
    let hi: u32 = hi.parse().map_err(|_| ConfigError::InvalidPortRange(range.to_string()))?;
    if lo > hi {
        return Err(ConfigError::InvalidPortRange(range.to_string()));
    }
    Ok((lo, hi))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_range() {
        assert_eq!(parse_port_range("10000-10999").unwrap(), (10000, 10999));
    }

    #[test]
    fn rejects_an_inverted_range() {
        assert!(parse_port_range("10999-10000").is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_port_range("nope").is_err());
    }
}
