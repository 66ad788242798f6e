// SPDX-License-Identifier: MIT

//! Capability adapters the supervisor and launcher depend on through
//! traits: process execution, health probing, the SCSI/iSCSI helper
//! contract, and the controller's HTTP client. Production binds to real
//! OS/network primitives; `test-support` exposes fakes for the rest of
//! the workspace's tests.

pub mod controller_client;
pub mod error;
pub mod executor;
pub mod health;
mod pdeathsig;
pub mod scsi;

pub use controller_client::{ControllerClient, ControllerClientError};
pub use error::AdapterError;
pub use executor::{ChildHandle, Executor, ProcessExecutor, SpawnSpec, TerminateSignal};
pub use health::{GrpcHealthChecker, HealthChecker, ServingStatus};
pub use scsi::{ScsiAdapter, ScsiDeviceHandle, SgRawScsiAdapter};
