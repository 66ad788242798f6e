//! Test helpers for black-box specifications of `sim`/`simd`.
//!
//! Unlike the donor CLI, `sim` never spawns `simd` itself — the daemon is a
//! separately managed long-running process. Tests that need a live daemon
//! start one explicitly with [`Daemon::start`] and tear it down on drop.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::Duration;

fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }
    standard
}

fn sim_binary() -> PathBuf {
    binary_path("sim")
}

fn simd_binary() -> PathBuf {
    binary_path("simd")
}

/// A running `simd` instance bound to an isolated state directory.
pub struct Daemon {
    child: Child,
    state_dir: tempfile::TempDir,
}

impl Daemon {
    /// Starts `simd` against a fresh state directory and waits for its
    /// `READY` line on stdout.
    pub fn start() -> Self {
        let state_dir = tempfile::tempdir().unwrap();
        let mut child = Command::new(simd_binary())
            .env("SIM_STATE_DIR", state_dir.path())
            .env_remove("XDG_STATE_HOME")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("simd should spawn");

        let stdout = child.stdout.take().expect("piped stdout");
        let mut reader = BufReader::new(stdout);
        let mut line = String::new();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            line.clear();
            if std::time::Instant::now() > deadline {
                panic!("simd did not print READY in time");
            }
            match reader.read_line(&mut line) {
                Ok(0) => panic!("simd exited before printing READY"),
                Ok(_) if line.trim() == "READY" => break,
                Ok(_) => continue,
                Err(err) => panic!("reading simd stdout: {err}"),
            }
        }

        Daemon { child, state_dir }
    }

    pub fn state_path(&self) -> &Path {
        self.state_dir.path()
    }

    pub fn socket_path(&self) -> PathBuf {
        self.state_dir.path().join("sim.sock")
    }

    /// Runs a `sim` subcommand against this daemon.
    pub fn sim(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(sim_binary());
        cmd.args(args);
        cmd.env("SIM_STATE_DIR", self.state_path());
        cmd.env_remove("XDG_STATE_HOME");
        cmd
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub trait RunExt {
    fn run(&mut self) -> Output;
}

impl RunExt for Command {
    fn run(&mut self) -> Output {
        self.output().expect("command should run")
    }
}

pub fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

pub fn wait_for<F: FnMut() -> bool>(timeout_ms: u64, mut condition: F) -> bool {
    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(timeout_ms);
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}
