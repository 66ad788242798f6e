// SPDX-License-Identifier: MIT

//! Process records and the process supervisor: component 4.C/4.D of the
//! instance manager. Owns the lifecycle of every supervised binary
//! (controller or replica process), its allocated ports, and its log file.

pub mod error;
pub mod process;
pub mod supervisor;
pub mod validation;

pub use error::SupervisorError;
pub use process::{ProcessEvent, ProcessInfo, ProcessSpec, ProcessState};
pub use supervisor::{Supervisor, SupervisorConfig};
pub use validation::validate_binary_path;

#[cfg(any(test, feature = "test-support"))]
pub use supervisor::test_support;
