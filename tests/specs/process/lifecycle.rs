//! End-to-end process lifecycle through the CLI: create, get, list,
//! delete (spec.md §8 scenarios S2/S4). Requires a binary under one of
//! the allowlisted engine-binaries prefixes (SPEC_FULL.md §4.*,
//! `sim_supervisor::validate_binary_path`) — this test provisions its
//! own fixture binary there rather than relying on the host image, the
//! same assumption production deployments make about the mounted
//! engine-binaries volume.

use crate::prelude::{wait_for, Daemon};

fn fixture_binary() -> std::path::PathBuf {
    let dir = std::path::PathBuf::from("/engine-binaries/sim-specs-fixture");
    let path = dir.join("longhorn");
    if !path.exists() {
        std::fs::create_dir_all(&dir).expect("allowlisted engine-binaries dir must be writable in this environment");
        // Binds the port handed to it as argv[1] so the health probe's
        // bare TCP connect succeeds, then idles until killed.
        let script = "#!/bin/sh\npython3 -c \"\nimport socket, sys, time\ns = socket.socket()\ns.setsockopt(socket.SOL_SOCKET, socket.SO_REUSEADDR, 1)\ns.bind(('0.0.0.0', int(sys.argv[1])))\ns.listen(1)\ntime.sleep(60)\n\" \"$1\"\n";
        std::fs::write(&path, script).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&path).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&path, perms).unwrap();
        }
    }
    path
}

#[test]
#[ignore = "requires a writable /engine-binaries allowlisted fixture directory and python3"]
fn create_get_list_delete_round_trip() {
    let daemon = Daemon::start();
    let binary = fixture_binary();
    let binary = binary.to_str().unwrap();

    let output = daemon
        .sim(&["process", "create", "vol-a", binary, "--port-count", "1", "--port-arg", ""])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let got_running = wait_for(3000, || {
        let out = daemon.sim(&["-o", "json", "process", "get", "vol-a"]).output().unwrap();
        out.status.success() && String::from_utf8_lossy(&out.stdout).contains("\"Running\"")
    });
    assert!(got_running, "process vol-a should reach the Running state");

    let list = daemon.sim(&["-o", "json", "process", "list"]).output().unwrap();
    assert!(list.status.success());
    assert!(String::from_utf8_lossy(&list.stdout).contains("vol-a"));

    let delete = daemon.sim(&["process", "delete", "vol-a"]).output().unwrap();
    assert!(delete.status.success(), "stderr: {}", String::from_utf8_lossy(&delete.stderr));
}
