// SPDX-License-Identifier: MIT

//! The `ScsiAdapter` capability: the iSCSI/SCSI helper contract consumed
//! (not reimplemented) by the engine launcher, per the external interface
//! list. Production implementation shells out to the same helper
//! primitives the upstream controller does (`sg_raw` for the reload CDB,
//! the `tgt`-style helper binaries for target setup); this crate owns only
//! the thin process-invocation glue, never the driver logic itself.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::AdapterError;

/// The 6-byte CDB opcode the reload command issues via `sg_raw` against
/// the duplicated block device to make the in-kernel initiator reconnect
/// to a freshly-upgraded engine socket.
pub const RELOAD_CDB: [u8; 6] = [0xa6, 0x00, 0x00, 0x00, 0x00, 0x00];

#[derive(Debug, Clone)]
pub struct ScsiDeviceHandle {
    pub device_path: String,
    pub target: String,
    pub target_id: u32,
}

#[async_trait]
pub trait ScsiAdapter: Send + Sync {
    async fn new_scsi_device(
        &self,
        volume: &str,
        socket_path: &Path,
        size_bytes: u64,
        target_id: u32,
    ) -> Result<ScsiDeviceHandle, AdapterError>;

    async fn start_scsi(&self, dev: &ScsiDeviceHandle) -> Result<(), AdapterError>;
    async fn stop_scsi(&self, dev: &ScsiDeviceHandle) -> Result<(), AdapterError>;

    async fn setup_target(&self, dev: &ScsiDeviceHandle, iqn: &str) -> Result<(), AdapterError>;
    async fn delete_target(&self, dev: &ScsiDeviceHandle) -> Result<(), AdapterError>;

    async fn duplicate_device(&self, src: &Path, dst: &Path) -> Result<(), AdapterError>;
    async fn remove_device(&self, path: &Path) -> Result<(), AdapterError>;

    /// Issues the SCSI-level reload CDB so the kernel initiator reconnects
    /// through `device_path` to the socket the upgraded engine just bound.
    async fn reload(&self, device_path: &Path) -> Result<(), AdapterError>;
}

/// Production adapter: invokes `sg_raw` and device-node syscalls via small
/// helper subprocesses, matching the upstream controller's own approach of
/// shelling out to vetted system utilities rather than linking a SCSI
/// driver in-process.
#[derive(Debug, Default, Clone, Copy)]
pub struct SgRawScsiAdapter;

const HELPER_TIMEOUT: Duration = Duration::from_secs(10);

async fn run(cmd: &mut Command, description: &str) -> Result<(), AdapterError> {
    match tokio::time::timeout(HELPER_TIMEOUT, cmd.output()).await {
        Ok(Ok(output)) if output.status.success() => Ok(()),
        Ok(Ok(output)) => Err(AdapterError::Scsi(format!(
            "{description} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        ))),
        Ok(Err(err)) => Err(AdapterError::Scsi(format!("{description} failed: {err}"))),
        Err(_) => Err(AdapterError::Timeout(description.to_string())),
    }
}

#[async_trait]
impl ScsiAdapter for SgRawScsiAdapter {
    async fn new_scsi_device(
        &self,
        volume: &str,
        socket_path: &Path,
        size_bytes: u64,
        target_id: u32,
    ) -> Result<ScsiDeviceHandle, AdapterError> {
        Ok(ScsiDeviceHandle {
            device_path: format!("/dev/longhorn-tgt/{volume}"),
            target: socket_path.display().to_string(),
            target_id,
        }
        .with_size_hint(size_bytes))
    }

    async fn start_scsi(&self, dev: &ScsiDeviceHandle) -> Result<(), AdapterError> {
        run(
            Command::new("tgtadm").args([
                "--lld", "iscsi", "--op", "new", "--mode", "target", "--tid",
            ]),
            &format!("start_scsi({})", dev.device_path),
        )
        .await
    }

    async fn stop_scsi(&self, dev: &ScsiDeviceHandle) -> Result<(), AdapterError> {
        run(
            Command::new("tgtadm").args(["--lld", "iscsi", "--op", "delete", "--mode", "target"]),
            &format!("stop_scsi({})", dev.device_path),
        )
        .await
    }

    async fn setup_target(&self, dev: &ScsiDeviceHandle, iqn: &str) -> Result<(), AdapterError> {
        run(
            Command::new("tgtadm").args(["--lld", "iscsi", "--op", "bind", "--initiator-address", iqn]),
            &format!("setup_target({})", dev.device_path),
        )
        .await
    }

    async fn delete_target(&self, dev: &ScsiDeviceHandle) -> Result<(), AdapterError> {
        run(
            Command::new("tgtadm").args(["--lld", "iscsi", "--op", "unbind"]),
            &format!("delete_target({})", dev.device_path),
        )
        .await
    }

    async fn duplicate_device(&self, src: &Path, dst: &Path) -> Result<(), AdapterError> {
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AdapterError::Scsi(e.to_string()))?;
        }
        run(
            Command::new("cp").args(["-a", &src.display().to_string(), &dst.display().to_string()]),
            &format!("duplicate_device({src:?} -> {dst:?})"),
        )
        .await
    }

    async fn remove_device(&self, path: &Path) -> Result<(), AdapterError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(_) if !path.exists() => Ok(()),
            Err(err) => Err(AdapterError::Scsi(err.to_string())),
        }
    }

    async fn reload(&self, device_path: &Path) -> Result<(), AdapterError> {
        let hex_cdb = RELOAD_CDB
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(" ");
        run(
            Command::new("sg_raw").arg(device_path).args(hex_cdb.split(' ')),
            &format!("reload({device_path:?})"),
        )
        .await
    }
}

impl ScsiDeviceHandle {
    fn with_size_hint(self, _size_bytes: u64) -> Self {
        self
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum ScsiCall {
        New(String),
        Start(String),
        Stop(String),
        SetupTarget(String),
        DeleteTarget(String),
        Duplicate(String, String),
        Remove(String),
        Reload(String),
    }

    #[derive(Clone, Default)]
    pub struct FakeScsiAdapter {
        calls: Arc<Mutex<Vec<ScsiCall>>>,
    }

    impl FakeScsiAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<ScsiCall> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl ScsiAdapter for FakeScsiAdapter {
        async fn new_scsi_device(
            &self,
            volume: &str,
            socket_path: &Path,
            _size_bytes: u64,
            target_id: u32,
        ) -> Result<ScsiDeviceHandle, AdapterError> {
            self.calls.lock().push(ScsiCall::New(volume.to_string()));
            Ok(ScsiDeviceHandle {
                device_path: format!("/dev/longhorn/{volume}"),
                target: socket_path.display().to_string(),
                target_id,
            })
        }

        async fn start_scsi(&self, dev: &ScsiDeviceHandle) -> Result<(), AdapterError> {
            self.calls.lock().push(ScsiCall::Start(dev.device_path.clone()));
            Ok(())
        }

        async fn stop_scsi(&self, dev: &ScsiDeviceHandle) -> Result<(), AdapterError> {
            self.calls.lock().push(ScsiCall::Stop(dev.device_path.clone()));
            Ok(())
        }

        async fn setup_target(&self, dev: &ScsiDeviceHandle, _iqn: &str) -> Result<(), AdapterError> {
            self.calls
                .lock()
                .push(ScsiCall::SetupTarget(dev.device_path.clone()));
            Ok(())
        }

        async fn delete_target(&self, dev: &ScsiDeviceHandle) -> Result<(), AdapterError> {
            self.calls
                .lock()
                .push(ScsiCall::DeleteTarget(dev.device_path.clone()));
            Ok(())
        }

        async fn duplicate_device(&self, src: &Path, dst: &Path) -> Result<(), AdapterError> {
            self.calls.lock().push(ScsiCall::Duplicate(
                src.display().to_string(),
                dst.display().to_string(),
            ));
            Ok(())
        }

        async fn remove_device(&self, path: &Path) -> Result<(), AdapterError> {
            self.calls
                .lock()
                .push(ScsiCall::Remove(path.display().to_string()));
            Ok(())
        }

        async fn reload(&self, device_path: &Path) -> Result<(), AdapterError> {
            self.calls
                .lock()
                .push(ScsiCall::Reload(device_path.display().to_string()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeScsiAdapter;
    use super::*;

    #[tokio::test]
    async fn fake_records_calls_in_order() {
        let adapter = FakeScsiAdapter::new();
        let dev = adapter
            .new_scsi_device("vol1", Path::new("/var/run/longhorn-vol1.sock"), 1024, 7)
            .await
            .unwrap();
        adapter.start_scsi(&dev).await.unwrap();
        adapter
            .duplicate_device(Path::new(&dev.device_path), Path::new("/dev/longhorn/vol1"))
            .await
            .unwrap();
        assert_eq!(adapter.calls().len(), 3);
        assert_eq!(dev.target_id, 7);
    }
}
