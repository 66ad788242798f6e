// SPDX-License-Identifier: MIT

//! The process supervisor: owns every `Process` record, drives the
//! create/replace/delete lifecycle, and emits updates on the broadcaster.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use sim_adapters::{ChildHandle, Executor, HealthChecker, SpawnSpec, TerminateSignal};
use sim_core::id::IdGen;
use sim_core::{Bitmap, Broadcaster, Subscription, WAIT_COUNT, WAIT_INTERVAL};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::error::SupervisorError;
use crate::process::{expand_port_args, ProcessEvent, ProcessInfo, ProcessSpec, ProcessState};
use crate::validation::validate_binary_path;

/// Bound on the new process's readiness wait during `replace` (~30s per
/// the specification, a tighter budget than the general `WAIT_COUNT`
/// used elsewhere).
const REPLACE_READY_POLLS: u32 = 30;

struct Entry {
    info: ProcessInfo,
    /// `None` only when the process failed to spawn at all (state is
    /// already `Error`); there is nothing left to signal or reap.
    child: Option<Box<dyn ChildHandle>>,
    stop_lifecycle: watch::Sender<bool>,
}

struct Inner {
    registry: Mutex<HashMap<String, Entry>>,
    ports: Mutex<Bitmap>,
    executor: Arc<dyn Executor>,
    health: Arc<dyn HealthChecker>,
    id_gen: Arc<dyn IdGen>,
    broadcaster: Broadcaster<ProcessEvent>,
    logs_dir: PathBuf,
    probe_address: String,
}

#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

pub struct SupervisorConfig {
    pub logs_dir: PathBuf,
    pub port_min: u32,
    pub port_max: u32,
    pub probe_address: String,
    pub executor: Arc<dyn Executor>,
    pub health: Arc<dyn HealthChecker>,
    pub id_gen: Arc<dyn IdGen>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: Mutex::new(HashMap::new()),
                ports: Mutex::new(Bitmap::new(config.port_min, config.port_max)),
                executor: config.executor,
                health: config.health,
                id_gen: config.id_gen,
                broadcaster: Broadcaster::new(),
                logs_dir: config.logs_dir,
                probe_address: config.probe_address,
            }),
        }
    }

    pub fn watch(&self) -> Subscription<ProcessEvent> {
        self.inner.broadcaster.subscribe()
    }

    pub fn get(&self, name: &str) -> Result<ProcessInfo, SupervisorError> {
        self.inner
            .registry
            .lock()
            .get(name)
            .map(|e| e.info.clone())
            .ok_or_else(|| SupervisorError::NotFound(name.to_string()))
    }

    pub fn list(&self) -> Vec<ProcessInfo> {
        self.inner.registry.lock().values().map(|e| e.info.clone()).collect()
    }

    pub async fn create(&self, spec: ProcessSpec) -> Result<ProcessInfo, SupervisorError> {
        if spec.name.is_empty() {
            return Err(SupervisorError::InvalidArgument("name must not be empty".into()));
        }
        if spec.binary.as_os_str().is_empty() {
            return Err(SupervisorError::InvalidArgument("binary must not be empty".into()));
        }
        validate_binary_path(&spec.binary).map_err(SupervisorError::InvalidArgument)?;

        {
            let registry = self.inner.registry.lock();
            if registry.contains_key(&spec.name) {
                return Err(SupervisorError::AlreadyExists(spec.name.clone()));
            }
        }

        let (port_start, port_end) = self.inner.ports.lock().allocate_range(spec.port_count as usize)?;
        let uuid = self.inner.id_gen.next();
        let args = expand_port_args(&spec.args, &spec.port_args, port_start);
        let log_path = self.inner.logs_dir.join(format!("{}.log", spec.name));

        let spawn_result = self
            .inner
            .executor
            .spawn(SpawnSpec {
                binary: spec.binary.clone(),
                args: args.clone(),
                env: Vec::new(),
                log_path: Some(log_path),
            })
            .await;

        let (stop_tx, stop_rx) = watch::channel(false);
        let info = ProcessInfo {
            name: spec.name.clone(),
            uuid: uuid.clone(),
            binary: spec.binary.clone(),
            args,
            port_start,
            port_end,
            state: match &spawn_result {
                Ok(_) => ProcessState::Starting,
                Err(_) => ProcessState::Error,
            },
            deleted: false,
        };

        match spawn_result {
            Ok(child) => {
                self.inner.registry.lock().insert(
                    spec.name.clone(),
                    Entry {
                        info: info.clone(),
                        child: Some(child),
                        stop_lifecycle: stop_tx,
                    },
                );
                self.publish(info.clone());
                self.spawn_lifecycle_tasks(spec.name.clone(), uuid, port_start, stop_rx);
                info!(process = %spec.name, %port_start, %port_end, "process created");
            }
            Err(err) => {
                // Ports remain held until an explicit delete; the record is
                // still returned even though the process never started.
                warn!(process = %spec.name, %err, "process spawn failed");
                self.inner.registry.lock().insert(
                    spec.name.clone(),
                    Entry {
                        info: info.clone(),
                        child: None,
                        stop_lifecycle: stop_tx,
                    },
                );
                self.publish(info.clone());
            }
        }
        Ok(info)
    }

    fn spawn_lifecycle_tasks(&self, name: String, uuid: String, port_start: u32, stop_rx: watch::Receiver<bool>) {
        // Readiness probe: Starting -> Running, or Starting -> Error on timeout.
        {
            let this = self.clone();
            let name = name.clone();
            let uuid = uuid.clone();
            let address = self.inner.probe_address.clone();
            let stop_rx = stop_rx.clone();
            tokio::spawn(async move {
                let result = this.inner.health.wait_for_running(&address, port_start, stop_rx).await;
                let next_state = match result {
                    Ok(()) => ProcessState::Running,
                    Err(_) => ProcessState::Error,
                };
                this.transition(&name, &uuid, next_state);
            });
        }
        // Exit watcher: reaps the child and marks it Stopped once it exits,
        // unless the record already reached the terminal Error state.
        {
            let this = self.clone();
            tokio::spawn(async move {
                loop {
                    let exited = {
                        let mut registry = this.inner.registry.lock();
                        match registry.get_mut(&name) {
                            Some(entry) if entry.info.uuid == uuid => match &mut entry.child {
                                Some(child) => match child.try_wait() {
                                    Ok(Some(_)) | Err(_) => true,
                                    Ok(None) => false,
                                },
                                None => true,
                            },
                            _ => return,
                        }
                    };
                    if exited {
                        this.transition(&name, &uuid, ProcessState::Stopped);
                        return;
                    }
                    tokio::time::sleep(WAIT_INTERVAL).await;
                }
            });
        }
    }

    /// Applies a state transition only if it is still valid given the
    /// record's current state, guarding against a stale readiness-probe
    /// task clobbering a state the exit watcher already moved past (or
    /// vice versa). `Running`/`Error` only apply out of `Starting`;
    /// `Stopped` applies from any non-terminal state.
    fn transition(&self, name: &str, uuid: &str, next: ProcessState) {
        let updated = {
            let mut registry = self.inner.registry.lock();
            match registry.get_mut(name) {
                Some(entry) if entry.info.uuid == uuid => {
                    let valid = match next {
                        ProcessState::Running | ProcessState::Error => entry.info.state == ProcessState::Starting,
                        ProcessState::Stopped => !matches!(entry.info.state, ProcessState::Stopped | ProcessState::Error),
                        ProcessState::Starting | ProcessState::Stopping => false,
                    };
                    if valid {
                        entry.info.state = next;
                        Some(entry.info.clone())
                    } else {
                        None
                    }
                }
                _ => None,
            }
        };
        if let Some(info) = updated {
            debug!(process = %name, state = ?info.state, "process state transition");
            self.publish(info);
        }
    }

    pub async fn delete(&self, name: &str) -> Result<ProcessInfo, SupervisorError> {
        let (uuid, info, has_child) = {
            let mut registry = self.inner.registry.lock();
            let entry = registry
                .get_mut(name)
                .ok_or_else(|| SupervisorError::NotFound(name.to_string()))?;
            if let Some(child) = &entry.child {
                let _ = child.signal(TerminateSignal::Sigint);
            }
            entry.info.deleted = true;
            let _ = entry.stop_lifecycle.send(true);
            (entry.info.uuid.clone(), entry.info.clone(), entry.child.is_some())
        };
        self.publish(info.clone());

        if has_child {
            let this = self.clone();
            let name = name.to_string();
            tokio::spawn(async move {
                this.reap(name, uuid).await;
            });
        } else {
            self.unregister(name, &uuid);
        }

        Ok(info)
    }

    async fn reap(&self, name: String, uuid: String) {
        for _ in 0..WAIT_COUNT {
            let stopped = {
                let registry = self.inner.registry.lock();
                match registry.get(&name) {
                    Some(entry) if entry.info.uuid == uuid => entry.info.state == ProcessState::Stopped,
                    Some(_) => return, // replaced concurrently: no-op per contract
                    None => return,
                }
            };
            if stopped {
                break;
            }
            tokio::time::sleep(WAIT_INTERVAL).await;
        }
        self.unregister(&name, &uuid);
    }

    fn unregister(&self, name: &str, uuid: &str) {
        let mut registry = self.inner.registry.lock();
        if let Some(entry) = registry.get(name) {
            if entry.info.uuid == uuid {
                let _ = self.inner.ports.lock().release_range(entry.info.port_start, entry.info.port_end);
                registry.remove(name);
            }
        }
    }

    pub async fn replace(
        &self,
        spec: ProcessSpec,
        terminate_signal: TerminateSignal,
    ) -> Result<ProcessInfo, SupervisorError> {
        if terminate_signal != TerminateSignal::Sighup {
            return Err(SupervisorError::InvalidArgument(
                "replace only accepts SIGHUP".into(),
            ));
        }
        validate_binary_path(&spec.binary).map_err(SupervisorError::InvalidArgument)?;

        let old_uuid = self.get(&spec.name)?.uuid;

        let (port_start, port_end) = self.inner.ports.lock().allocate_range(spec.port_count as usize)?;
        let new_uuid = self.inner.id_gen.next();
        let args = expand_port_args(&spec.args, &spec.port_args, port_start);
        let log_path = self.inner.logs_dir.join(format!("{}.log", spec.name));

        let mut new_child = self
            .inner
            .executor
            .spawn(SpawnSpec {
                binary: spec.binary.clone(),
                args: args.clone(),
                env: Vec::new(),
                log_path: Some(log_path),
            })
            .await?;

        let (ready_timeout_tx, ready_timeout_rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(WAIT_INTERVAL * REPLACE_READY_POLLS).await;
            let _ = ready_timeout_tx.send(true);
        });
        let ready = self
            .inner
            .health
            .wait_for_running(&self.inner.probe_address, port_start, ready_timeout_rx)
            .await;
        if ready.is_err() {
            let _ = new_child.signal(TerminateSignal::Sigkill);
            let _ = self.inner.ports.lock().release_range(port_start, port_end);
            return Err(SupervisorError::Internal(format!(
                "replacement process for {} never reached Running",
                spec.name
            )));
        }

        let new_info = ProcessInfo {
            name: spec.name.clone(),
            uuid: new_uuid.clone(),
            binary: spec.binary.clone(),
            args,
            port_start,
            port_end,
            state: ProcessState::Running,
            deleted: false,
        };

        let (stop_tx, stop_rx) = watch::channel(false);
        let old_entry = {
            let mut registry = self.inner.registry.lock();
            match registry.get(&spec.name) {
                Some(existing) if existing.info.uuid == old_uuid => registry.insert(
                    spec.name.clone(),
                    Entry {
                        info: new_info.clone(),
                        child: Some(new_child),
                        stop_lifecycle: stop_tx,
                    },
                ),
                _ => None,
            }
        };
        let old_entry = match old_entry {
            Some(entry) => entry,
            None => {
                let _ = self.inner.ports.lock().release_range(port_start, port_end);
                return Err(SupervisorError::AlreadyExists(format!(
                    "{} was replaced concurrently",
                    spec.name
                )));
            }
        };

        if let Some(old_child) = &old_entry.child {
            let _ = old_child.signal(TerminateSignal::Sighup);
        }
        let _ = old_entry.stop_lifecycle.send(true);
        let _ = self.inner.ports.lock().release_range(old_entry.info.port_start, old_entry.info.port_end);

        self.publish(new_info.clone());
        self.spawn_lifecycle_tasks(spec.name.clone(), new_uuid, port_start, stop_rx);
        info!(process = %spec.name, %old_uuid, new_uuid = %new_info.uuid, "process replaced");
        Ok(new_info)
    }

    pub fn log_path(&self, name: &str) -> Result<PathBuf, SupervisorError> {
        self.get(name)?;
        Ok(self.inner.logs_dir.join(format!("{name}.log")))
    }

    pub fn log_stream(&self, name: &str) -> Result<mpsc::Receiver<String>, SupervisorError> {
        let path = self.log_path(name)?;
        let (stop_tx, stop_rx) = watch::channel(false);
        let this = self.clone();
        let watched_name = name.to_string();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(WAIT_INTERVAL).await;
                if this.get(&watched_name).is_err() {
                    let _ = stop_tx.send(true);
                    return;
                }
            }
        });
        Ok(sim_logs::tail(path, stop_rx))
    }

    fn publish(&self, process: ProcessInfo) {
        self.inner.broadcaster.publish(ProcessEvent { process });
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use super::*;
    use sim_adapters::executor::fake::FakeExecutor;
    use sim_adapters::health::fake::FakeHealthChecker;
    use sim_core::test_support::sequential_ids;

    pub fn fixture(logs_dir: PathBuf) -> (Supervisor, Arc<FakeExecutor>, Arc<FakeHealthChecker>) {
        let executor = Arc::new(FakeExecutor::new());
        let health = Arc::new(FakeHealthChecker::new());
        let supervisor = Supervisor::new(SupervisorConfig {
            logs_dir,
            port_min: 10000,
            port_max: 10099,
            probe_address: "127.0.0.1".into(),
            executor: executor.clone(),
            health: health.clone(),
            id_gen: Arc::new(sequential_ids("proc")),
        });
        (supervisor, executor, health)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::fixture;
    use super::*;
    use sim_adapters::ServingStatus;

    fn spec(name: &str) -> ProcessSpec {
        ProcessSpec {
            name: name.to_string(),
            binary: "/engine-binaries/img-a/longhorn".into(),
            args: vec!["controller".into()],
            port_count: 2,
            port_args: vec!["--listen=127.0.0.1:".into()],
        }
    }

    #[tokio::test]
    async fn create_rejects_unallowlisted_binary() {
        let dir = tempfile::tempdir().unwrap();
        let (supervisor, _exec, _health) = fixture(dir.path().to_path_buf());
        let mut bad = spec("v1");
        bad.binary = "/tmp/evil".into();
        let err = supervisor.create(bad).await.unwrap_err();
        assert!(matches!(err, SupervisorError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn create_rejects_duplicate_names() {
        let dir = tempfile::tempdir().unwrap();
        let (supervisor, _exec, health) = fixture(dir.path().to_path_buf());
        health.set("127.0.0.1", 10000, ServingStatus::Serving);
        supervisor.create(spec("v1")).await.unwrap();
        let err = supervisor.create(spec("v1")).await.unwrap_err();
        assert!(matches!(err, SupervisorError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn create_transitions_to_running_once_probe_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let (supervisor, _exec, health) = fixture(dir.path().to_path_buf());
        health.set("127.0.0.1", 10000, ServingStatus::Serving);
        let info = supervisor.create(spec("v1")).await.unwrap();
        assert_eq!(info.state, ProcessState::Starting);
        for _ in 0..20 {
            if supervisor.get("v1").unwrap().state == ProcessState::Running {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("process never reached Running");
    }

    #[tokio::test]
    async fn delete_marks_deleted_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let (supervisor, _exec, health) = fixture(dir.path().to_path_buf());
        health.set("127.0.0.1", 10000, ServingStatus::Serving);
        supervisor.create(spec("v1")).await.unwrap();
        let info = supervisor.delete("v1").await.unwrap();
        assert!(info.deleted);
    }

    #[tokio::test]
    async fn delete_missing_process_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (supervisor, _exec, _health) = fixture(dir.path().to_path_buf());
        let err = supervisor.delete("ghost").await.unwrap_err();
        assert!(matches!(err, SupervisorError::NotFound(_)));
    }

    #[tokio::test]
    async fn replace_rejects_non_sighup_signal() {
        let dir = tempfile::tempdir().unwrap();
        let (supervisor, _exec, health) = fixture(dir.path().to_path_buf());
        health.set("127.0.0.1", 10000, ServingStatus::Serving);
        supervisor.create(spec("v1")).await.unwrap();
        let err = supervisor
            .replace(spec("v1"), TerminateSignal::Sigterm)
            .await
            .unwrap_err();
        assert!(matches!(err, SupervisorError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn replace_swaps_to_a_new_uuid_once_new_process_is_running() {
        let dir = tempfile::tempdir().unwrap();
        let (supervisor, _exec, health) = fixture(dir.path().to_path_buf());
        health.set("127.0.0.1", 10000, ServingStatus::Serving);
        let original = supervisor.create(spec("v1")).await.unwrap();
        health.set("127.0.0.1", 10002, ServingStatus::Serving);
        let replaced = supervisor
            .replace(spec("v1"), TerminateSignal::Sighup)
            .await
            .unwrap();
        assert_ne!(replaced.uuid, original.uuid);
        assert_eq!(replaced.state, ProcessState::Running);
    }
}
