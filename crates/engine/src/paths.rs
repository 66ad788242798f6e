// SPDX-License-Identifier: MIT

//! Filesystem/naming conventions from the external-interfaces contract.

use std::path::PathBuf;

pub fn controller_socket_path(volume: &str) -> PathBuf {
    PathBuf::from(format!("/var/run/longhorn-{volume}.sock"))
}

pub fn device_node_path(volume: &str) -> PathBuf {
    PathBuf::from(format!("/dev/longhorn/{volume}"))
}

pub fn iqn_for(volume: &str) -> String {
    format!("iqn.2019-10.io.longhorn:{volume}")
}
