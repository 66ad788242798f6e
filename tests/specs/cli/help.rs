//! `sim --help` and subcommand `--help` always succeed and advertise the
//! full RPC surface, independent of whether a daemon is running.

use std::process::Command;

fn sim() -> Command {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("target/debug/sim");
    let path = if path.exists() {
        path
    } else {
        std::env::current_exe().unwrap().parent().unwrap().parent().unwrap().join("sim")
    };
    Command::new(path)
}

#[test]
fn top_level_help_lists_every_subcommand() {
    let output = sim().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["process", "engine", "frontend", "status"] {
        assert!(stdout.contains(name), "expected --help to mention `{name}`\n{stdout}");
    }
}

#[test]
fn process_help_lists_every_operation() {
    let output = sim().args(["process", "--help"]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["create", "replace", "delete", "get", "list", "log", "watch"] {
        assert!(stdout.contains(name), "expected process --help to mention `{name}`\n{stdout}");
    }
}

#[test]
fn engine_help_lists_every_operation() {
    let output = sim().args(["engine", "--help"]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["create", "delete", "get", "list", "upgrade", "log", "watch"] {
        assert!(stdout.contains(name), "expected engine --help to mention `{name}`\n{stdout}");
    }
}
