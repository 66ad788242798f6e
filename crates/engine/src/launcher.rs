// SPDX-License-Identifier: MIT

//! Per-volume engine launcher: owns one engine record, drives the
//! create/upgrade/delete state machine, and handles the child controller's
//! frontend-ready/frontend-down callbacks.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use sim_adapters::{ControllerClient, ScsiAdapter, ScsiDeviceHandle};
use sim_core::{Broadcaster, WAIT_COUNT, WAIT_INTERVAL};
use sim_supervisor::{ProcessInfo, ProcessSpec, ProcessState, Supervisor};
use tracing::{info, warn};

use crate::error::EngineError;
use crate::paths::{controller_socket_path, device_node_path, iqn_for};
use crate::record::{EngineEvent, EngineInfo, EngineSpec, EngineState, FrontendKind, FrontendState};

/// Positive buffer folded into the launcher's resource version at upgrade
/// finalize, guaranteeing monotonicity across the outgoing process's own
/// last observed version. See glossary: `BUFFER`.
pub const RESOURCE_VERSION_BUFFER: u64 = 100;

struct EngineRecordState {
    name: String,
    volume: String,
    current_binary: std::path::PathBuf,
    current_engine_name: String,
    pending_binary: Option<std::path::PathBuf>,
    pending_engine_name: Option<String>,
    listen: String,
    frontend: Option<FrontendKind>,
    frontend_state: FrontendState,
    endpoint: String,
    scsi_device: Option<ScsiDeviceHandle>,
    target_id: Option<u32>,
    size_bytes: u64,
    backends: Vec<String>,
    replicas: Vec<String>,
    state: EngineState,
    is_upgrading: bool,
    is_deleting: bool,
    resource_version: u64,
    deleted: bool,
}

impl EngineRecordState {
    fn snapshot(&self) -> EngineInfo {
        EngineInfo {
            name: self.name.clone(),
            volume: self.volume.clone(),
            binary: self.current_binary.clone(),
            current_engine_name: self.current_engine_name.clone(),
            pending_binary: self.pending_binary.clone(),
            pending_engine_name: self.pending_engine_name.clone(),
            listen: self.listen.clone(),
            frontend: self.frontend,
            frontend_state: self.frontend_state,
            endpoint: self.endpoint.clone(),
            target_id: self.target_id,
            state: self.state,
            is_upgrading: self.is_upgrading,
            is_deleting: self.is_deleting,
            resource_version: self.resource_version,
            deleted: self.deleted,
        }
    }
}

pub(crate) struct LauncherConfig {
    pub name: String,
    pub supervisor: Supervisor,
    pub scsi: Arc<dyn ScsiAdapter>,
    pub launcher_addr: String,
    pub broadcaster: Broadcaster<EngineEvent>,
    pub allocate_target_id: Arc<dyn Fn() -> Result<u32, EngineError> + Send + Sync>,
    pub release_target_id: Arc<dyn Fn(u32) + Send + Sync>,
    pub on_gone: Arc<dyn Fn(String) + Send + Sync>,
}

struct Inner {
    name: String,
    supervisor: Supervisor,
    scsi: Arc<dyn ScsiAdapter>,
    launcher_addr: String,
    broadcaster: Broadcaster<EngineEvent>,
    allocate_target_id: Arc<dyn Fn() -> Result<u32, EngineError> + Send + Sync>,
    release_target_id: Arc<dyn Fn(u32) + Send + Sync>,
    on_gone: Arc<dyn Fn(String) + Send + Sync>,
    state: Mutex<Option<EngineRecordState>>,
}

#[derive(Clone)]
pub(crate) struct Launcher {
    inner: Arc<Inner>,
}

impl Launcher {
    pub(crate) fn new(config: LauncherConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: config.name,
                supervisor: config.supervisor,
                scsi: config.scsi,
                launcher_addr: config.launcher_addr,
                broadcaster: config.broadcaster,
                allocate_target_id: config.allocate_target_id,
                release_target_id: config.release_target_id,
                on_gone: config.on_gone,
                state: Mutex::new(None),
            }),
        }
    }

    pub fn snapshot(&self) -> Result<EngineInfo, EngineError> {
        self.inner
            .state
            .lock()
            .as_ref()
            .map(|s| s.snapshot())
            .ok_or_else(|| EngineError::NotFound(self.inner.name.clone()))
    }

    fn publish(&self, info: EngineInfo) {
        self.inner.broadcaster.publish(EngineEvent { engine: info });
    }

    /// `launcher_name` is the launcher's own name, not the (possibly
    /// suffixed) supervisor process name in `spec.name` — `--launcher-id`
    /// always identifies the launcher, even for a pending upgrade engine.
    fn bind_args(bind_ip: &str, launcher_name: &str, spec: &EngineSpec, launcher_addr: &str) -> (Vec<String>, Vec<String>) {
        let mut args = vec![
            "controller".to_string(),
            "--launcher".to_string(),
            launcher_addr.to_string(),
            "--launcher-id".to_string(),
            launcher_name.to_string(),
            spec.volume.clone(),
        ];
        for b in &spec.backends {
            args.push(format!("--backend={b}"));
        }
        for r in &spec.replicas {
            args.push(format!("--replica={r}"));
        }
        (args, vec![format!("--listen={bind_ip}:")])
    }

    pub async fn create(&self, spec: EngineSpec) -> Result<EngineInfo, EngineError> {
        let bind_ip = spec.listen.clone().unwrap_or_else(|| "0.0.0.0".to_string());
        let (args, port_args) = Self::bind_args(&bind_ip, &self.inner.name, &spec, &self.inner.launcher_addr);

        let process = self
            .inner
            .supervisor
            .create(ProcessSpec {
                name: spec.name.clone(),
                binary: spec.binary.clone(),
                args,
                port_count: 1,
                port_args,
            })
            .await?;
        let listen = format!("{bind_ip}:{}", process.port_start);

        let record = EngineRecordState {
            name: spec.name.clone(),
            volume: spec.volume.clone(),
            current_binary: spec.binary.clone(),
            current_engine_name: spec.name.clone(),
            pending_binary: None,
            pending_engine_name: None,
            listen,
            frontend: spec.frontend,
            frontend_state: FrontendState::Down,
            endpoint: String::new(),
            scsi_device: None,
            target_id: None,
            size_bytes: spec.size_bytes,
            backends: spec.backends.clone(),
            replicas: spec.replicas.clone(),
            state: EngineState::Up,
            is_upgrading: false,
            is_deleting: false,
            resource_version: 1,
            deleted: false,
        };
        let info = record.snapshot();
        *self.inner.state.lock() = Some(record);
        self.publish(info.clone());
        info!(engine = %spec.name, listen = %info.listen, "engine created");
        Ok(info)
    }

    pub async fn start_frontend(&self, kind: FrontendKind) -> Result<EngineInfo, EngineError> {
        let listen = {
            let mut guard = self.inner.state.lock();
            let rec = guard.as_mut().ok_or_else(|| EngineError::NotFound(self.inner.name.clone()))?;
            rec.frontend = Some(kind);
            rec.resource_version += 1;
            rec.listen.clone()
        };
        self.publish(self.snapshot()?);
        ControllerClient::new(&listen).start_frontend(kind.as_str()).await?;
        self.snapshot()
    }

    pub async fn shutdown_frontend(&self) -> Result<EngineInfo, EngineError> {
        let listen = {
            let guard = self.inner.state.lock();
            guard
                .as_ref()
                .ok_or_else(|| EngineError::NotFound(self.inner.name.clone()))?
                .listen
                .clone()
        };
        ControllerClient::new(&listen).shutdown_frontend().await?;
        self.snapshot()
    }

    /// Runs the full current/pending coexistence upgrade: a second,
    /// distinctly-named engine process is created alongside the current
    /// one (spec attribute `engine_name (derived: <launcher_name>-e-
    /// <suffix>)`), and only once it is confirmed `Running` is the old
    /// named process asked to go away. Mirrors the original's
    /// `Upgrade`/`prepareUpgrade`/`createEngineProcess`/`finalizeUpgrade`
    /// split.
    pub async fn upgrade(&self, new_binary: std::path::PathBuf) -> Result<EngineInfo, EngineError> {
        let (spec_for_new, old_name, pending_name, bind_ip) = {
            let mut guard = self.inner.state.lock();
            let rec = guard.as_mut().ok_or_else(|| EngineError::NotFound(self.inner.name.clone()))?;
            if rec.current_binary == new_binary {
                return Err(EngineError::InvalidArgument(
                    "upgrade requested to the same binary".into(),
                ));
            }
            rec.resource_version += 1;
            let pending_name = format!("{}-e-{}", rec.name, rec.resource_version);
            rec.is_upgrading = true;
            rec.pending_binary = Some(new_binary.clone());
            rec.pending_engine_name = Some(pending_name.clone());
            rec.state = EngineState::Upgrading;
            let bind_ip = rec
                .listen
                .rsplit_once(':')
                .map(|(ip, _)| ip.to_string())
                .unwrap_or_else(|| rec.listen.clone());
            let spec = EngineSpec {
                name: pending_name.clone(),
                volume: rec.volume.clone(),
                binary: new_binary.clone(),
                frontend: rec.frontend,
                listen: Some(bind_ip.clone()),
                size_bytes: rec.size_bytes,
                backends: rec.backends.clone(),
                replicas: rec.replicas.clone(),
            };
            (spec, rec.current_engine_name.clone(), pending_name, bind_ip)
        };
        self.publish(self.snapshot()?);

        let socket_path = {
            let guard = self.inner.state.lock();
            controller_socket_path(&guard.as_ref().unwrap().volume)
        };
        let _ = tokio::fs::remove_file(&socket_path).await;

        let (args, port_args) = Self::bind_args(&bind_ip, &self.inner.name, &spec_for_new, &self.inner.launcher_addr);
        let create_result = self
            .inner
            .supervisor
            .create(ProcessSpec {
                name: pending_name.clone(),
                binary: new_binary.clone(),
                args,
                port_count: 1,
                port_args,
            })
            .await;

        if let Err(err) = create_result {
            let mut guard = self.inner.state.lock();
            if let Some(rec) = guard.as_mut() {
                rec.is_upgrading = false;
                rec.pending_binary = None;
                rec.pending_engine_name = None;
                rec.state = EngineState::Up;
            }
            return Err(err.into());
        }

        // Steps 4-6 of the upgrade algorithm: wait for the new controller's
        // socket to reappear, reload the SCSI initiator's connection
        // through it, then confirm the new process reached Running. A
        // failure from here on leaves both processes alive; the caller may
        // retry `delete` to recover.
        wait_for_socket(&socket_path).await?;
        if let Some(dev) = {
            let guard = self.inner.state.lock();
            guard.as_ref().unwrap().scsi_device.clone()
        } {
            self.inner.scsi.reload(Path::new(&dev.device_path)).await?;
        }
        let new_process = wait_for_running(&self.inner.supervisor, &pending_name).await?;

        // Finalize: promote pending -> current and fold the buffer into
        // the launcher's resource version before the old process is even
        // asked to go away, matching `finalizeUpgrade`'s ordering.
        let info = {
            let mut guard = self.inner.state.lock();
            let rec = guard.as_mut().unwrap();
            rec.current_binary = new_binary;
            rec.current_engine_name = pending_name.clone();
            rec.pending_binary = None;
            rec.pending_engine_name = None;
            rec.listen = format!("{bind_ip}:{}", new_process.port_start);
            rec.resource_version += RESOURCE_VERSION_BUFFER;
            rec.snapshot()
        };
        self.publish(info.clone());

        if let Err(err) = self.inner.supervisor.delete(&old_name).await {
            warn!(engine = %old_name, %err, "delete of superseded engine process failed");
        }
        for _ in 0..WAIT_COUNT {
            if self.inner.supervisor.get(&old_name).is_err() {
                break;
            }
            tokio::time::sleep(WAIT_INTERVAL).await;
        }

        let info = {
            let mut guard = self.inner.state.lock();
            let rec = guard.as_mut().unwrap();
            rec.is_upgrading = false;
            rec.state = EngineState::Up;
            rec.snapshot()
        };
        self.publish(info.clone());
        info!(engine = %self.inner.name, %old_name, new_uuid = %new_process.uuid, "engine upgraded");
        Ok(info)
    }

    pub async fn delete(&self) -> Result<EngineInfo, EngineError> {
        let (process_name, device) = {
            let mut guard = self.inner.state.lock();
            let rec = guard.as_mut().ok_or_else(|| EngineError::NotFound(self.inner.name.clone()))?;
            rec.is_deleting = true;
            rec.state = EngineState::Deleting;
            rec.deleted = true;
            rec.resource_version += 1;
            (rec.current_engine_name.clone(), rec.scsi_device.clone())
        };
        let info = self.snapshot()?;
        self.publish(info.clone());

        let this = self.clone();
        tokio::spawn(async move {
            this.reap_delete(process_name, device).await;
        });
        Ok(info)
    }

    /// `process_name` is the supervisor process backing the current
    /// engine (may differ from the launcher's own name after an
    /// upgrade); the launcher is still dropped from the registry under
    /// its own name once the process is confirmed gone.
    async fn reap_delete(&self, process_name: String, device: Option<ScsiDeviceHandle>) {
        if let Err(err) = self.inner.supervisor.delete(&process_name).await {
            warn!(engine = %process_name, %err, "delete of underlying process failed");
        }
        for _ in 0..WAIT_COUNT {
            if self.inner.supervisor.get(&process_name).is_err() {
                break;
            }
            tokio::time::sleep(WAIT_INTERVAL).await;
        }
        // Safety net: if the child never fired its frontend-shutdown
        // callback, the SCSI device is still bound here and must be torn
        // down before the launcher is dropped.
        if let Some(dev) = device {
            let _ = self.inner.scsi.stop_scsi(&dev).await;
            let _ = self.inner.scsi.delete_target(&dev).await;
            let _ = self.inner.scsi.remove_device(Path::new(&dev.device_path)).await;
            (self.inner.release_target_id)(dev.target_id);
        }
        {
            let mut guard = self.inner.state.lock();
            if let Some(rec) = guard.as_mut() {
                rec.state = EngineState::Gone;
            }
        }
        (self.inner.on_gone)(self.inner.name.clone());
    }

    pub async fn frontend_start_callback(&self) -> Result<(), EngineError> {
        let (is_upgrading, has_device, volume, frontend, size_bytes) = {
            let guard = self.inner.state.lock();
            let rec = guard.as_ref().ok_or_else(|| EngineError::NotFound(self.inner.name.clone()))?;
            (
                rec.is_upgrading,
                rec.scsi_device.is_some(),
                rec.volume.clone(),
                rec.frontend,
                rec.size_bytes,
            )
        };
        if is_upgrading || has_device {
            return Ok(());
        }
        let target_id = (self.inner.allocate_target_id)()?;
        let socket_path = controller_socket_path(&volume);
        wait_for_socket(&socket_path).await?;
        let dev = self
            .inner
            .scsi
            .new_scsi_device(&volume, &socket_path, size_bytes, target_id)
            .await?;

        let endpoint = match frontend {
            Some(FrontendKind::TgtBlockdev) => {
                self.inner.scsi.start_scsi(&dev).await?;
                let dst = device_node_path(&volume);
                self.inner
                    .scsi
                    .duplicate_device(Path::new(&dev.device_path), &dst)
                    .await?;
                dst.display().to_string()
            }
            Some(FrontendKind::TgtIscsi) => {
                let iqn = iqn_for(&volume);
                self.inner.scsi.setup_target(&dev, &iqn).await?;
                iqn
            }
            None => {
                (self.inner.release_target_id)(target_id);
                return Err(EngineError::InvalidArgument("no frontend kind configured".into()));
            }
        };

        {
            let mut guard = self.inner.state.lock();
            let rec = guard.as_mut().unwrap();
            rec.scsi_device = Some(dev);
            rec.target_id = Some(target_id);
            rec.endpoint = endpoint;
            rec.frontend_state = FrontendState::Up;
            rec.resource_version += 1;
        }
        self.publish(self.snapshot()?);
        Ok(())
    }

    pub async fn frontend_shutdown_callback(&self) -> Result<(), EngineError> {
        let (is_upgrading, dev) = {
            let guard = self.inner.state.lock();
            let rec = guard.as_ref().ok_or_else(|| EngineError::NotFound(self.inner.name.clone()))?;
            (rec.is_upgrading, rec.scsi_device.clone())
        };
        if is_upgrading {
            return Ok(());
        }
        if let Some(dev) = dev {
            let volume = {
                let guard = self.inner.state.lock();
                guard.as_ref().unwrap().volume.clone()
            };
            self.inner.scsi.remove_device(&device_node_path(&volume)).await?;
            self.inner.scsi.stop_scsi(&dev).await?;
            self.inner.scsi.delete_target(&dev).await?;
            (self.inner.release_target_id)(dev.target_id);
        }
        {
            let mut guard = self.inner.state.lock();
            let rec = guard.as_mut().unwrap();
            rec.scsi_device = None;
            rec.endpoint = String::new();
            rec.frontend_state = FrontendState::Down;
            rec.target_id = None;
            rec.resource_version += 1;
        }
        self.publish(self.snapshot()?);
        Ok(())
    }
}

async fn wait_for_socket(path: &Path) -> Result<(), EngineError> {
    for _ in 0..WAIT_COUNT {
        if tokio::fs::metadata(path).await.is_ok() {
            return Ok(());
        }
        tokio::time::sleep(WAIT_INTERVAL).await;
    }
    Err(EngineError::DeadlineExceeded(format!(
        "{} never appeared",
        path.display()
    )))
}

async fn wait_for_running(supervisor: &Supervisor, name: &str) -> Result<ProcessInfo, EngineError> {
    for _ in 0..WAIT_COUNT {
        if let Ok(info) = supervisor.get(name) {
            if info.state == ProcessState::Running {
                return Ok(info);
            }
        }
        tokio::time::sleep(WAIT_INTERVAL).await;
    }
    Err(EngineError::DeadlineExceeded(format!("{name} never reached Running")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_adapters::scsi::fake::FakeScsiAdapter;
    use sim_adapters::ServingStatus;
    use sim_supervisor::test_support::fixture;

    fn launcher(dir: &Path) -> (Launcher, Arc<sim_adapters::health::fake::FakeHealthChecker>) {
        let (supervisor, _exec, health) = fixture(dir.to_path_buf());
        let launcher = Launcher::new(LauncherConfig {
            name: "vol1".to_string(),
            supervisor,
            scsi: Arc::new(FakeScsiAdapter::new()),
            launcher_addr: "127.0.0.1:9500".to_string(),
            broadcaster: Broadcaster::new(),
            allocate_target_id: Arc::new(|| Ok(1)),
            release_target_id: Arc::new(|_| {}),
            on_gone: Arc::new(|_| {}),
        });
        (launcher, health)
    }

    fn spec() -> EngineSpec {
        EngineSpec {
            name: "vol1".to_string(),
            volume: "vol1".to_string(),
            binary: "/engine-binaries/img-a/longhorn".into(),
            frontend: Some(FrontendKind::TgtBlockdev),
            listen: Some("10.0.0.5".to_string()),
            size_bytes: 1 << 30,
            backends: vec![],
            replicas: vec![],
        }
    }

    #[tokio::test]
    async fn create_uses_the_requested_bind_ip_and_supervisor_assigned_port() {
        let dir = tempfile::tempdir().unwrap();
        let (launcher, health) = launcher(dir.path());
        health.set("127.0.0.1", 10000, ServingStatus::Serving);
        let info = launcher.create(spec()).await.unwrap();
        assert_eq!(info.listen, "10.0.0.5:10000");
        assert_eq!(info.state, EngineState::Up);
    }

    #[tokio::test]
    async fn upgrade_to_the_same_binary_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (launcher, health) = launcher(dir.path());
        health.set("127.0.0.1", 10000, ServingStatus::Serving);
        let info = launcher.create(spec()).await.unwrap();
        let err = launcher.upgrade(info.binary.clone()).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    /// spec.md §8 scenario S4: after a successful upgrade, the final
    /// binary is the new one, the old supervisor process is gone, and the
    /// new process carries a distinct `<launcher_name>-e-<suffix>` name
    /// rather than reusing the old one.
    #[tokio::test]
    async fn upgrade_promotes_a_distinctly_named_pending_engine_and_removes_the_old_one() {
        let dir = tempfile::tempdir().unwrap();
        let (launcher, health) = launcher(dir.path());
        health.set("127.0.0.1", 10000, ServingStatus::Serving);
        let mut s = spec();
        s.volume = "sim-launcher-upgrade-spec".to_string();
        let created = launcher.create(s).await.unwrap();
        let old_process_name = created.current_engine_name.clone();
        assert_eq!(old_process_name, "vol1");

        let socket_path = controller_socket_path("sim-launcher-upgrade-spec");
        let _ = std::fs::remove_file(&socket_path);
        health.set("127.0.0.1", 10001, ServingStatus::Serving);
        let appear_path = socket_path.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            let _ = tokio::fs::write(&appear_path, b"").await;
        });

        let new_binary: std::path::PathBuf = "/engine-binaries/img-b/longhorn".into();
        let info = launcher.upgrade(new_binary.clone()).await.unwrap();
        let _ = std::fs::remove_file(&socket_path);

        assert_eq!(info.binary, new_binary);
        assert_ne!(info.current_engine_name, old_process_name);
        assert!(info.current_engine_name.starts_with("vol1-e-"));
        assert!(info.pending_engine_name.is_none());
        assert!(!info.is_upgrading);
        assert_eq!(info.state, EngineState::Up);
        assert!(launcher.inner.supervisor.get(&old_process_name).is_err());
    }

    #[tokio::test]
    async fn upgrade_before_create_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (launcher, _health) = launcher(dir.path());
        let err = launcher.upgrade("/engine-binaries/img-b/longhorn".into()).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn frontend_callbacks_are_no_ops_mid_upgrade() {
        let dir = tempfile::tempdir().unwrap();
        let (launcher, health) = launcher(dir.path());
        health.set("127.0.0.1", 10000, ServingStatus::Serving);
        launcher.create(spec()).await.unwrap();
        {
            let mut guard = launcher.inner.state.lock();
            guard.as_mut().unwrap().is_upgrading = true;
        }
        launcher.frontend_start_callback().await.unwrap();
        launcher.frontend_shutdown_callback().await.unwrap();
    }
}
