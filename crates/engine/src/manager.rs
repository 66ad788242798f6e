// SPDX-License-Identifier: MIT

//! The engine manager: owns the registry of per-volume launchers, the
//! target-id allocator shared across them, and the engine-event
//! broadcaster. Mirrors the process supervisor's lock discipline —
//! `Manager.registry` is taken only long enough to clone a `Launcher`
//! handle out; every subsequent await happens outside that lock.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use sim_adapters::ScsiAdapter;
use sim_core::bitmap::target_id_bitmap;
use sim_core::{Bitmap, Broadcaster, Subscription};
use sim_supervisor::Supervisor;
use tokio::sync::mpsc;

use crate::error::EngineError;
use crate::launcher::{Launcher, LauncherConfig};
use crate::record::{EngineEvent, EngineInfo, EngineSpec, FrontendKind};

struct Inner {
    registry: Mutex<HashMap<String, Launcher>>,
    target_ids: Mutex<Bitmap>,
    broadcaster: Broadcaster<EngineEvent>,
    supervisor: Supervisor,
    scsi: Arc<dyn ScsiAdapter>,
    launcher_addr: String,
}

pub struct EngineManagerConfig {
    pub supervisor: Supervisor,
    pub scsi: Arc<dyn ScsiAdapter>,
    pub launcher_addr: String,
}

#[derive(Clone)]
pub struct EngineManager {
    inner: Arc<Inner>,
}

impl EngineManager {
    pub fn new(config: EngineManagerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: Mutex::new(HashMap::new()),
                target_ids: Mutex::new(target_id_bitmap()),
                broadcaster: Broadcaster::new(),
                supervisor: config.supervisor,
                scsi: config.scsi,
                launcher_addr: config.launcher_addr,
            }),
        }
    }

    pub fn watch(&self) -> Subscription<EngineEvent> {
        self.inner.broadcaster.subscribe()
    }

    pub fn engine_get(&self, name: &str) -> Result<EngineInfo, EngineError> {
        self.launcher(name)?.snapshot()
    }

    pub fn engine_list(&self) -> Vec<EngineInfo> {
        self.inner
            .registry
            .lock()
            .values()
            .filter_map(|l| l.snapshot().ok())
            .collect()
    }

    pub async fn engine_create(&self, spec: EngineSpec) -> Result<EngineInfo, EngineError> {
        let name = spec.name.clone();
        {
            let registry = self.inner.registry.lock();
            if registry.contains_key(&name) {
                return Err(EngineError::AlreadyExists(name));
            }
        }
        let launcher = self.new_launcher(name.clone());
        match launcher.create(spec).await {
            Ok(info) => {
                self.inner.registry.lock().insert(name, launcher);
                Ok(info)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn engine_delete(&self, name: &str) -> Result<EngineInfo, EngineError> {
        self.launcher(name)?.delete().await
    }

    pub async fn engine_upgrade(&self, name: &str, new_binary: std::path::PathBuf) -> Result<EngineInfo, EngineError> {
        self.launcher(name)?.upgrade(new_binary).await
    }

    pub async fn frontend_start(&self, name: &str, kind: FrontendKind) -> Result<EngineInfo, EngineError> {
        self.launcher(name)?.start_frontend(kind).await
    }

    pub async fn frontend_shutdown(&self, name: &str) -> Result<EngineInfo, EngineError> {
        self.launcher(name)?.shutdown_frontend().await
    }

    /// Invoked by the child controller over the launcher-callback listener
    /// once its frontend has actually come up.
    pub async fn frontend_start_callback(&self, name: &str) -> Result<(), EngineError> {
        self.launcher(name)?.frontend_start_callback().await
    }

    pub async fn frontend_shutdown_callback(&self, name: &str) -> Result<(), EngineError> {
        self.launcher(name)?.frontend_shutdown_callback().await
    }

    pub fn engine_log(&self, name: &str) -> Result<mpsc::Receiver<String>, EngineError> {
        let process_name = self.launcher(name)?.snapshot()?.current_engine_name;
        Ok(self.inner.supervisor.log_stream(&process_name)?)
    }

    fn launcher(&self, name: &str) -> Result<Launcher, EngineError> {
        self.inner
            .registry
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(name.to_string()))
    }

    fn new_launcher(&self, name: String) -> Launcher {
        let inner = self.inner.clone();
        let allocate_target_id: Arc<dyn Fn() -> Result<u32, EngineError> + Send + Sync> = {
            let inner = inner.clone();
            Arc::new(move || {
                inner
                    .target_ids
                    .lock()
                    .allocate_range(1)
                    .map(|(start, _)| start)
                    .map_err(EngineError::from)
            })
        };
        let release_target_id: Arc<dyn Fn(u32) + Send + Sync> = {
            let inner = inner.clone();
            Arc::new(move |id: u32| {
                let _ = inner.target_ids.lock().release_range(id, id);
            })
        };
        let on_gone: Arc<dyn Fn(String) + Send + Sync> = {
            let inner = inner.clone();
            Arc::new(move |gone_name: String| {
                inner.registry.lock().remove(&gone_name);
            })
        };

        Launcher::new(LauncherConfig {
            name,
            supervisor: self.inner.supervisor.clone(),
            scsi: self.inner.scsi.clone(),
            launcher_addr: self.inner.launcher_addr.clone(),
            broadcaster: self.inner.broadcaster.clone(),
            allocate_target_id,
            release_target_id,
            on_gone,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_adapters::scsi::fake::FakeScsiAdapter;
    use sim_adapters::ServingStatus;
    use sim_supervisor::test_support::fixture;

    fn manager(dir: &std::path::Path) -> (EngineManager, Arc<sim_adapters::health::fake::FakeHealthChecker>) {
        let (supervisor, _exec, health) = fixture(dir.to_path_buf());
        let manager = EngineManager::new(EngineManagerConfig {
            supervisor,
            scsi: Arc::new(FakeScsiAdapter::new()),
            launcher_addr: "127.0.0.1:9500".to_string(),
        });
        (manager, health)
    }

    fn spec(name: &str) -> EngineSpec {
        EngineSpec {
            name: name.to_string(),
            volume: name.to_string(),
            binary: "/engine-binaries/img-a/longhorn".into(),
            frontend: Some(FrontendKind::TgtBlockdev),
            listen: None,
            size_bytes: 1 << 30,
            backends: vec!["tcp://127.0.0.1:9000".to_string()],
            replicas: vec![],
        }
    }

    #[tokio::test]
    async fn create_registers_and_reports_up() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, health) = manager(dir.path());
        health.set("127.0.0.1", 10000, ServingStatus::Serving);
        let info = manager.engine_create(spec("vol1")).await.unwrap();
        assert_eq!(info.state, crate::record::EngineState::Up);
        assert!(info.listen.starts_with("0.0.0.0:"));
        assert!(!info.deleted);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_engine_names() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, health) = manager(dir.path());
        health.set("127.0.0.1", 10000, ServingStatus::Serving);
        manager.engine_create(spec("vol1")).await.unwrap();
        let err = manager.engine_create(spec("vol1")).await.unwrap_err();
        assert!(matches!(err, EngineError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn get_and_list_reflect_the_registry() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, health) = manager(dir.path());
        health.set("127.0.0.1", 10000, ServingStatus::Serving);
        manager.engine_create(spec("vol1")).await.unwrap();
        assert_eq!(manager.engine_list().len(), 1);
        assert_eq!(manager.engine_get("vol1").unwrap().volume, "vol1");
        assert!(matches!(
            manager.engine_get("ghost").unwrap_err(),
            EngineError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn delete_tears_down_and_removes_from_registry() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, health) = manager(dir.path());
        health.set("127.0.0.1", 10000, ServingStatus::Serving);
        manager.engine_create(spec("vol1")).await.unwrap();
        let info = manager.engine_delete("vol1").await.unwrap();
        assert!(info.deleted);
        for _ in 0..50 {
            if manager.engine_get("vol1").is_err() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("engine was never reaped from the registry");
    }

    #[tokio::test]
    async fn delete_missing_engine_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _health) = manager(dir.path());
        let err = manager.engine_delete("ghost").await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }
}
