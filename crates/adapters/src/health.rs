// SPDX-License-Identifier: MIT

//! The `HealthChecker` capability: readiness probing against a child's RPC
//! port, modeled after the standard gRPC health-check protocol
//! (`grpc.health.v1.Health/Check`): a single `SERVING`/`NOT_SERVING`
//! response, no payload beyond that.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::watch;

use crate::error::AdapterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServingStatus {
    Serving,
    NotServing,
}

#[async_trait]
pub trait HealthChecker: Send + Sync {
    /// Performs one readiness check against `address:port`.
    async fn check(&self, address: &str, port: u32) -> Result<ServingStatus, AdapterError>;

    /// Polls `check` every `sim_core::WAIT_INTERVAL` up to
    /// `sim_core::WAIT_COUNT` times, returning as soon as `Serving` is
    /// observed. `stop` allows cooperative cancellation (e.g. the caller's
    /// own RPC deadline firing) without waiting out the full budget.
    async fn wait_for_running(
        &self,
        address: &str,
        port: u32,
        mut stop: watch::Receiver<bool>,
    ) -> Result<(), AdapterError> {
        for _ in 0..sim_core::WAIT_COUNT {
            if *stop.borrow() {
                return Err(AdapterError::Timeout("wait_for_running cancelled".into()));
            }
            match self.check(address, port).await {
                Ok(ServingStatus::Serving) => return Ok(()),
                Ok(ServingStatus::NotServing) | Err(_) => {}
            }
            tokio::select! {
                _ = tokio::time::sleep(sim_core::WAIT_INTERVAL) => {}
                _ = stop.changed() => {
                    if *stop.borrow() {
                        return Err(AdapterError::Timeout("wait_for_running cancelled".into()));
                    }
                }
            }
        }
        Err(AdapterError::Timeout(format!(
            "{address}:{port} never reached Serving within {} polls",
            sim_core::WAIT_COUNT
        )))
    }
}

/// Production health checker: a bare TCP connect-and-close probe standing
/// in for the full gRPC health-check handshake — a real deployment speaks
/// the `grpc.health.v1.Health` protocol over this same port; this adapter
/// isolates that wire detail behind the trait so the supervisor never
/// depends on a gRPC client directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct GrpcHealthChecker;

#[async_trait]
impl HealthChecker for GrpcHealthChecker {
    async fn check(&self, address: &str, port: u32) -> Result<ServingStatus, AdapterError> {
        let target = format!("{address}:{port}");
        match tokio::time::timeout(Duration::from_secs(2), TcpStream::connect(&target)).await {
            Ok(Ok(_stream)) => Ok(ServingStatus::Serving),
            Ok(Err(_)) => Ok(ServingStatus::NotServing),
            Err(_) => Ok(ServingStatus::NotServing),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    pub struct FakeHealthChecker {
        status: Arc<Mutex<HashMap<(String, u32), ServingStatus>>>,
    }

    impl FakeHealthChecker {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set(&self, address: &str, port: u32, status: ServingStatus) {
            self.status
                .lock()
                .insert((address.to_string(), port), status);
        }
    }

    #[async_trait]
    impl HealthChecker for FakeHealthChecker {
        async fn check(&self, address: &str, port: u32) -> Result<ServingStatus, AdapterError> {
            Ok(self
                .status
                .lock()
                .get(&(address.to_string(), port))
                .copied()
                .unwrap_or(ServingStatus::NotServing))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeHealthChecker;
    use super::*;

    #[tokio::test]
    async fn wait_for_running_returns_once_serving() {
        let checker = FakeHealthChecker::new();
        checker.set("127.0.0.1", 9000, ServingStatus::Serving);
        let (_tx, rx) = watch::channel(false);
        checker
            .wait_for_running("127.0.0.1", 9000, rx)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn wait_for_running_honors_cancellation() {
        let checker = FakeHealthChecker::new();
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let err = checker
            .wait_for_running("127.0.0.1", 9000, rx)
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Timeout(_)));
    }
}
