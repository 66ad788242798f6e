// SPDX-License-Identifier: MIT

use sim_core::status::{HasStatusCode, StatusCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("process {0} not found")]
    NotFound(String),
    #[error("process {0} already exists")]
    AlreadyExists(String),
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl HasStatusCode for SupervisorError {
    fn status_code(&self) -> StatusCode {
        match self {
            SupervisorError::InvalidArgument(_) => StatusCode::InvalidArgument,
            SupervisorError::NotFound(_) => StatusCode::NotFound,
            SupervisorError::AlreadyExists(_) => StatusCode::AlreadyExists,
            SupervisorError::DeadlineExceeded(_) => StatusCode::DeadlineExceeded,
            SupervisorError::Internal(_) => StatusCode::Internal,
        }
    }
}

impl From<sim_adapters::AdapterError> for SupervisorError {
    fn from(err: sim_adapters::AdapterError) -> Self {
        use sim_adapters::AdapterError::*;
        match err {
            Timeout(msg) => SupervisorError::DeadlineExceeded(msg),
            other => SupervisorError::Internal(other.to_string()),
        }
    }
}

impl From<sim_core::BitmapError> for SupervisorError {
    fn from(err: sim_core::BitmapError) -> Self {
        SupervisorError::Internal(err.to_string())
    }
}
