// SPDX-License-Identifier: MIT

//! The abstract RPC status codes all domain errors eventually map onto.

use serde::{Deserialize, Serialize};

/// Status codes named in the external RPC contract. Every `thiserror`
/// domain error in this workspace implements [`HasStatusCode`] so the
/// daemon's listener can translate it into a wire-level `Response::Error`
/// without each crate knowing about the wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCode {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    DeadlineExceeded,
    Internal,
    Unimplemented,
}

pub trait HasStatusCode {
    fn status_code(&self) -> StatusCode;
}
