//! S1: daemon startup acquires the lock, binds the socket, and reports
//! READY; a second instance against the same state directory fails closed
//! without disturbing the first (spec.md §8, SPEC_FULL.md §4.J).

use crate::prelude::Daemon;
use std::process::{Command, Stdio};

#[test]
fn daemon_reports_ready_and_status_round_trips() {
    let daemon = Daemon::start();
    let output = daemon.sim(&["status"]).output().unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("protocol_version"));
    assert!(stdout.contains("process_count"));
    assert!(stdout.contains("engine_count"));
}

#[test]
fn a_second_daemon_against_the_same_state_dir_refuses_to_start() {
    let daemon = Daemon::start();

    // CARGO_MANIFEST_DIR points at the workspace root's tests crate; simd
    // lives alongside it in target/debug.
    let simd = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("target/debug/simd");
    let simd = if simd.exists() {
        simd
    } else {
        std::env::current_exe()
            .unwrap()
            .parent()
            .unwrap()
            .parent()
            .unwrap()
            .join("simd")
    };

    let mut second = Command::new(simd)
        .env("SIM_STATE_DIR", daemon.state_path())
        .env_remove("XDG_STATE_HOME")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    let status = second.wait().unwrap();
    assert!(!status.success(), "a second daemon instance should exit non-zero when the lock is already held");

    // The first instance must be untouched by the failed second startup.
    let output = daemon.sim(&["status"]).output().unwrap();
    assert!(output.status.success(), "first daemon should still be serving after a rejected second startup");
}
