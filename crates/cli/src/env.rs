// SPDX-License-Identifier: MIT

//! Resolves the daemon socket path the same way `simd` resolves its own
//! state directory, so a bare `sim` invocation talks to the daemon
//! started with matching defaults.

use std::path::PathBuf;

pub fn state_dir() -> Result<PathBuf, &'static str> {
    if let Ok(dir) = std::env::var("SIM_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("sim"));
    }
    let home = std::env::var("HOME").map_err(|_| "could not determine a state directory ($HOME is unset)")?;
    Ok(PathBuf::from(home).join(".local").join("state").join("sim"))
}

pub fn default_socket_path() -> Result<PathBuf, &'static str> {
    Ok(state_dir()?.join("sim.sock"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial(sim_env)]
    fn explicit_override_wins() {
        std::env::set_var("SIM_STATE_DIR", "/tmp/sim-explicit");
        std::env::remove_var("XDG_STATE_HOME");
        assert_eq!(default_socket_path().unwrap(), PathBuf::from("/tmp/sim-explicit/sim.sock"));
        std::env::remove_var("SIM_STATE_DIR");
    }

    #[test]
    #[serial(sim_env)]
    fn xdg_state_home_is_used_when_no_override() {
        std::env::remove_var("SIM_STATE_DIR");
        std::env::set_var("XDG_STATE_HOME", "/tmp/xdg");
        assert_eq!(default_socket_path().unwrap(), PathBuf::from("/tmp/xdg/sim/sim.sock"));
        std::env::remove_var("XDG_STATE_HOME");
    }
}
