// SPDX-License-Identifier: MIT

//! The `simd` daemon: wires the process supervisor and engine manager to
//! a Unix-socket RPC listener. Component 4.J-4.N of the instance-manager
//! specification.

pub mod config;
pub mod env;
pub mod lifecycle;
pub mod listener;
pub mod protocol;
pub mod protocol_wire;
pub mod service;

pub use config::{Config, ConfigError};
pub use lifecycle::{LifecycleError, StartupResult};
pub use protocol::{Request, Response, StatusInfo};
pub use protocol_wire::{DEFAULT_TIMEOUT, MAX_MESSAGE_SIZE, PROTOCOL_VERSION};
pub use service::Service;

use std::sync::Arc;

use sim_adapters::{GrpcHealthChecker, ProcessExecutor, SgRawScsiAdapter};
use sim_core::id::UuidIdGen;
use sim_launcher::{EngineManager, EngineManagerConfig};
use sim_supervisor::{Supervisor, SupervisorConfig};

/// Builds the production supervisor + engine manager pair bound to real
/// OS processes, a TCP health probe, and the `sg_raw`-backed SCSI helper.
pub fn build_service(config: &Config) -> Service {
    let supervisor = Supervisor::new(SupervisorConfig {
        logs_dir: config.logs_dir.clone(),
        port_min: config.port_min,
        port_max: config.port_max,
        probe_address: "127.0.0.1".to_string(),
        executor: Arc::new(ProcessExecutor),
        health: Arc::new(GrpcHealthChecker),
        id_gen: Arc::new(UuidIdGen),
    });
    let engines = EngineManager::new(EngineManagerConfig {
        supervisor: supervisor.clone(),
        scsi: Arc::new(SgRawScsiAdapter),
        launcher_addr: config.socket_path.display().to_string(),
    });
    Service::new(supervisor, engines)
}
