// SPDX-License-Identifier: MIT

//! Log capture and tailing for supervised processes.

pub mod error;
pub mod sink;
pub mod tail;

pub use error::LogError;
pub use sink::{LogSink, ROTATE_AT_BYTES};
pub use tail::tail;
