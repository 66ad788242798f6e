//! `sim` error-path behavior: a missing daemon socket and an invalid RPC
//! argument both fail the process with a non-zero exit and a readable
//! message, never a panic.

use crate::prelude::Daemon;
use std::process::Command;

#[test]
fn connecting_to_a_nonexistent_socket_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let sim = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("target/debug/sim");
    let sim = if sim.exists() {
        sim
    } else {
        std::env::current_exe().unwrap().parent().unwrap().parent().unwrap().join("sim")
    };

    let output = Command::new(sim)
        .args(["--socket"])
        .arg(dir.path().join("no-such.sock"))
        .arg("status")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("sim:"), "stderr should be prefixed for the operator: {stderr}");
}

#[test]
fn process_create_rejects_a_binary_outside_the_allowlist() {
    let daemon = Daemon::start();
    let output = daemon
        .sim(&["process", "create", "vol-a", "/tmp/not-allowlisted", "--port-count", "1"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("InvalidArgument"), "expected an InvalidArgument status, got: {stderr}");
}

#[test]
fn process_get_on_an_unknown_name_reports_not_found() {
    let daemon = Daemon::start();
    let output = daemon.sim(&["process", "get", "does-not-exist"]).output().unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("NotFound"), "expected a NotFound status, got: {stderr}");
}
