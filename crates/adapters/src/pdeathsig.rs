// SPDX-License-Identifier: MIT

//! Parent-death signal propagation for spawned engine/replica processes.
//!
//! Without this, a crashed instance-manager leaks its supervised data-plane
//! children. Linux only; a no-op everywhere else, matching the upstream
//! implementation this behavior is grounded on, which only ever ran on Linux
//! hosts.

use tokio::process::Command;

#[cfg(target_os = "linux")]
pub fn set_pre_exec(cmd: &mut Command) {
    use std::io;
    use std::os::unix::process::CommandExt;

    // SAFETY: the closure runs in the forked child between fork() and
    // exec(), calling only the async-signal-safe `prctl(2)` wrapper from
    // `nix`. It touches no heap state shared with the parent and performs
    // no allocation.
    #[allow(unsafe_code)]
    unsafe {
        cmd.pre_exec(|| {
            nix::sys::prctl::set_pdeathsig(nix::sys::signal::Signal::SIGKILL)
                .map_err(|errno| io::Error::from_raw_os_error(errno as i32))?;
            Ok(())
        });
    }
}

#[cfg(not(target_os = "linux"))]
pub fn set_pre_exec(_cmd: &mut Command) {}
