// SPDX-License-Identifier: MIT

//! State-directory resolution, mirroring the donor daemon's own `env.rs`:
//! an explicit override first, then the XDG base directory, then a
//! hardcoded fallback under the user's home.

use std::path::PathBuf;

use crate::lifecycle::LifecycleError;

pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("SIM_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("sim"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local").join("state").join("sim"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn explicit_override_wins() {
        std::env::set_var("SIM_STATE_DIR", "/tmp/sim-state-override");
        let dir = state_dir().unwrap();
        std::env::remove_var("SIM_STATE_DIR");
        assert_eq!(dir, PathBuf::from("/tmp/sim-state-override"));
    }

    #[test]
    #[serial]
    fn xdg_state_home_is_used_when_no_override() {
        std::env::remove_var("SIM_STATE_DIR");
        std::env::set_var("XDG_STATE_HOME", "/tmp/xdg-state");
        let dir = state_dir().unwrap();
        std::env::remove_var("XDG_STATE_HOME");
        assert_eq!(dir, PathBuf::from("/tmp/xdg-state/sim"));
    }
}
