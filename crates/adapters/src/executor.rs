// SPDX-License-Identifier: MIT

//! The `Executor` capability: spawns, signals, and reaps child processes.
//!
//! Parameterizing the supervisor on this trait (rather than calling
//! `tokio::process` directly) is what lets tests inject a fake that never
//! touches the OS process table.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::process::Command;

use crate::error::AdapterError;
use crate::pdeathsig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminateSignal {
    Sigint,
    Sighup,
    Sigterm,
    Sigkill,
}

impl TerminateSignal {
    fn as_nix(self) -> Signal {
        match self {
            TerminateSignal::Sigint => Signal::SIGINT,
            TerminateSignal::Sighup => Signal::SIGHUP,
            TerminateSignal::Sigterm => Signal::SIGTERM,
            TerminateSignal::Sigkill => Signal::SIGKILL,
        }
    }

    /// Parses the wire-level signal name accepted by `ProcessReplace`
    /// (only `"SIGHUP"`) and `ProcessDelete` (default `"SIGINT"`).
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "SIGINT" => Some(TerminateSignal::Sigint),
            "SIGHUP" => Some(TerminateSignal::Sighup),
            "SIGTERM" => Some(TerminateSignal::Sigterm),
            "SIGKILL" => Some(TerminateSignal::Sigkill),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpawnSpec {
    pub binary: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// When set, the child's stdout and stderr are both redirected to this
    /// file (opened append-only) instead of being inherited.
    pub log_path: Option<PathBuf>,
}

/// A live child process. Implementations must be safe to signal and wait
/// on from any task.
#[async_trait]
pub trait ChildHandle: Send + Sync {
    fn pid(&self) -> u32;
    fn signal(&self, sig: TerminateSignal) -> Result<(), AdapterError>;
    async fn wait(&mut self) -> Result<i32, AdapterError>;
    fn try_wait(&mut self) -> Result<Option<i32>, AdapterError>;
}

#[async_trait]
pub trait Executor: Send + Sync {
    async fn spawn(&self, spec: SpawnSpec) -> Result<Box<dyn ChildHandle>, AdapterError>;
}

/// Production executor: forks real OS processes via `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExecutor;

#[async_trait]
impl Executor for ProcessExecutor {
    async fn spawn(&self, spec: SpawnSpec) -> Result<Box<dyn ChildHandle>, AdapterError> {
        let mut cmd = Command::new(&spec.binary);
        cmd.args(&spec.args);
        for (k, v) in &spec.env {
            cmd.env(k, v);
        }
        cmd.kill_on_drop(false);
        if let Some(log_path) = &spec.log_path {
            let out = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)
                .map_err(AdapterError::Spawn)?;
            let err = out.try_clone().map_err(AdapterError::Spawn)?;
            cmd.stdout(Stdio::from(out));
            cmd.stderr(Stdio::from(err));
        }
        pdeathsig::set_pre_exec(&mut cmd);
        let child = cmd.spawn().map_err(AdapterError::Spawn)?;
        Ok(Box::new(OsChild { child }))
    }
}

struct OsChild {
    child: tokio::process::Child,
}

#[async_trait]
impl ChildHandle for OsChild {
    fn pid(&self) -> u32 {
        self.child.id().unwrap_or(0)
    }

    fn signal(&self, sig: TerminateSignal) -> Result<(), AdapterError> {
        let pid = self.pid();
        if pid == 0 {
            return Err(AdapterError::Signal("process already reaped".into()));
        }
        signal::kill(Pid::from_raw(pid as i32), sig.as_nix())
            .map_err(|errno| AdapterError::Signal(errno.to_string()))
    }

    async fn wait(&mut self) -> Result<i32, AdapterError> {
        let status = self
            .child
            .wait()
            .await
            .map_err(AdapterError::Spawn)?;
        Ok(status.code().unwrap_or(-1))
    }

    fn try_wait(&mut self) -> Result<Option<i32>, AdapterError> {
        match self.child.try_wait().map_err(AdapterError::Spawn)? {
            Some(status) => Ok(Some(status.code().unwrap_or(-1))),
            None => Ok(None),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum FakeEvent {
        Spawned { binary: String, args: Vec<String> },
        Signaled { pid: u32, sig: TerminateSignal },
    }

    /// Fake executor: never touches the OS. Each spawn returns a handle
    /// whose `wait()` completes only after the test calls `finish()`.
    #[derive(Clone, Default)]
    pub struct FakeExecutor {
        events: Arc<Mutex<Vec<FakeEvent>>>,
        next_pid: Arc<Mutex<u32>>,
        should_fail: Arc<Mutex<bool>>,
    }

    impl FakeExecutor {
        pub fn new() -> Self {
            Self {
                events: Arc::new(Mutex::new(Vec::new())),
                next_pid: Arc::new(Mutex::new(1000)),
                should_fail: Arc::new(Mutex::new(false)),
            }
        }

        pub fn set_should_fail(&self, fail: bool) {
            *self.should_fail.lock() = fail;
        }

        pub fn events(&self) -> Vec<FakeEvent> {
            self.events.lock().clone()
        }
    }

    #[async_trait]
    impl Executor for FakeExecutor {
        async fn spawn(&self, spec: SpawnSpec) -> Result<Box<dyn ChildHandle>, AdapterError> {
            if *self.should_fail.lock() {
                return Err(AdapterError::Spawn(std::io::Error::other("fake spawn failure")));
            }
            let pid = {
                let mut next = self.next_pid.lock();
                let pid = *next;
                *next += 1;
                pid
            };
            self.events.lock().push(FakeEvent::Spawned {
                binary: spec.binary.display().to_string(),
                args: spec.args.clone(),
            });
            Ok(Box::new(FakeChild {
                pid,
                events: self.events.clone(),
                exit_code: Arc::new(Mutex::new(None)),
                waiters: Arc::new(Mutex::new(VecDeque::new())),
            }))
        }
    }

    pub struct FakeChild {
        pid: u32,
        events: Arc<Mutex<Vec<FakeEvent>>>,
        exit_code: Arc<Mutex<Option<i32>>>,
        waiters: Arc<Mutex<VecDeque<tokio::sync::oneshot::Sender<i32>>>>,
    }

    impl FakeChild {
        /// Simulates the process exiting; wakes any pending `wait()`.
        pub fn finish(&self, code: i32) {
            *self.exit_code.lock() = Some(code);
            let mut waiters = self.waiters.lock();
            while let Some(tx) = waiters.pop_front() {
                let _ = tx.send(code);
            }
        }
    }

    #[async_trait]
    impl ChildHandle for FakeChild {
        fn pid(&self) -> u32 {
            self.pid
        }

        fn signal(&self, sig: TerminateSignal) -> Result<(), AdapterError> {
            self.events
                .lock()
                .push(FakeEvent::Signaled { pid: self.pid, sig });
            Ok(())
        }

        async fn wait(&mut self) -> Result<i32, AdapterError> {
            if let Some(code) = *self.exit_code.lock() {
                return Ok(code);
            }
            let (tx, rx) = tokio::sync::oneshot::channel();
            self.waiters.lock().push_back(tx);
            rx.await
                .map_err(|_| AdapterError::Signal("fake child dropped".into()))
        }

        fn try_wait(&mut self) -> Result<Option<i32>, AdapterError> {
            Ok(*self.exit_code.lock())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeExecutor;
    use super::*;

    #[test]
    fn parses_only_documented_signal_names() {
        assert_eq!(TerminateSignal::parse("SIGHUP"), Some(TerminateSignal::Sighup));
        assert_eq!(TerminateSignal::parse("SIGBUS"), None);
    }

    #[tokio::test]
    async fn fake_executor_records_spawn_and_signal() {
        let exec = FakeExecutor::new();
        let spec = SpawnSpec {
            binary: "/engine-binaries/img-a/longhorn".into(),
            args: vec!["controller".into()],
            env: vec![],
            log_path: None,
        };
        let mut child = exec.spawn(spec).await.unwrap();
        child.signal(TerminateSignal::Sighup).unwrap();
        assert_eq!(exec.events().len(), 2);
        assert!(child.try_wait().unwrap().is_none());
    }
}
