// SPDX-License-Identifier: MIT

//! Shared primitives used across the instance manager: ids, the port/
//! target-id bitmap allocator, the multi-subscriber broadcaster, and the
//! RPC status-code taxonomy every domain error maps onto.

pub mod bitmap;
pub mod broadcaster;
pub mod id;
pub mod status;

pub use bitmap::{Bitmap, BitmapError};
pub use broadcaster::{Broadcaster, RecvError, Subscription};
pub use status::{HasStatusCode, StatusCode};

/// Polling cadence for any bounded wait (health probe, socket appearance,
/// process-stopped wait, etc). See glossary: `WAIT_INTERVAL`.
pub const WAIT_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);

/// Cap on the number of `WAIT_INTERVAL` polls before a bounded wait
/// surfaces `DeadlineExceeded`. See glossary: `WAIT_COUNT`.
pub const WAIT_COUNT: u32 = 60;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use crate::id::{IdGen, SequentialIdGen};

    pub fn sequential_ids(prefix: &str) -> impl IdGen {
        SequentialIdGen::new(prefix.to_string())
    }
}
