// SPDX-License-Identifier: MIT

use sim_core::status::{HasStatusCode, StatusCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl HasStatusCode for LogError {
    fn status_code(&self) -> StatusCode {
        StatusCode::Internal
    }
}
