// SPDX-License-Identifier: MIT

use sim_core::status::{HasStatusCode, StatusCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("spawn failed: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("signal delivery failed: {0}")]
    Signal(String),
    #[error("health probe failed: {0}")]
    HealthProbe(String),
    #[error("controller request failed: {0}")]
    Controller(String),
    #[error("scsi helper failed: {0}")]
    Scsi(String),
    #[error("operation timed out: {0}")]
    Timeout(String),
}

impl HasStatusCode for AdapterError {
    fn status_code(&self) -> StatusCode {
        match self {
            AdapterError::Timeout(_) => StatusCode::DeadlineExceeded,
            _ => StatusCode::Internal,
        }
    }
}
