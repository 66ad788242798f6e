// SPDX-License-Identifier: MIT

use sim_core::status::{HasStatusCode, StatusCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("engine {0} not found")]
    NotFound(String),
    #[error("engine {0} already exists")]
    AlreadyExists(String),
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl HasStatusCode for EngineError {
    fn status_code(&self) -> StatusCode {
        match self {
            EngineError::InvalidArgument(_) => StatusCode::InvalidArgument,
            EngineError::NotFound(_) => StatusCode::NotFound,
            EngineError::AlreadyExists(_) => StatusCode::AlreadyExists,
            EngineError::DeadlineExceeded(_) => StatusCode::DeadlineExceeded,
            EngineError::Internal(_) => StatusCode::Internal,
        }
    }
}

impl From<sim_supervisor::SupervisorError> for EngineError {
    fn from(err: sim_supervisor::SupervisorError) -> Self {
        use sim_supervisor::SupervisorError::*;
        match err {
            InvalidArgument(m) => EngineError::InvalidArgument(m),
            NotFound(m) => EngineError::NotFound(m),
            AlreadyExists(m) => EngineError::AlreadyExists(m),
            DeadlineExceeded(m) => EngineError::DeadlineExceeded(m),
            Internal(m) => EngineError::Internal(m),
        }
    }
}

impl From<sim_adapters::AdapterError> for EngineError {
    fn from(err: sim_adapters::AdapterError) -> Self {
        use sim_adapters::AdapterError::*;
        match err {
            Timeout(msg) => EngineError::DeadlineExceeded(msg),
            other => EngineError::Internal(other.to_string()),
        }
    }
}

impl From<sim_adapters::ControllerClientError> for EngineError {
    fn from(err: sim_adapters::ControllerClientError) -> Self {
        EngineError::Internal(err.to_string())
    }
}

impl From<sim_core::BitmapError> for EngineError {
    fn from(err: sim_core::BitmapError) -> Self {
        EngineError::Internal(err.to_string())
    }
}
