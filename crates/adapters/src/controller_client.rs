// SPDX-License-Identifier: MIT

//! Minimal JSON-over-HTTP client against the child controller's REST
//! surface, used only during upgrade and frontend transitions.
//!
//! Grounded directly on the upstream `ControllerClient`: despite the
//! "HTTP-over-socket" wording in some descriptions of this contract, the
//! original implementation issues plain HTTP over TCP against the
//! controller's `listen` address (`http://<listen>/v1/...`), not a Unix
//! domain socket — so this adapter is a thin `reqwest` client, not a
//! unix-socket HTTP client.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerClientError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("controller responded {status}: {body}")]
    BadResponse { status: u16, body: String },
    #[error("decode failed: {0}")]
    Decode(String),
}

#[derive(Debug, Serialize)]
struct StartFrontendInput {
    frontend: String,
}

#[derive(Debug, Serialize)]
struct PortInput {
    #[serde(rename = "Port")]
    port: u32,
}

#[derive(Debug, Deserialize)]
struct Volume {
    id: String,
    #[allow(dead_code)]
    frontend: String,
}

#[derive(Debug, Deserialize)]
struct VolumeCollection {
    data: Vec<Volume>,
}

pub struct ControllerClient {
    base: String,
    http: reqwest::Client,
}

impl ControllerClient {
    /// `controller` is the bare `host:port` the child controller listens
    /// on; the `/v1` API prefix is appended once, matching
    /// `NewControllerClient`'s idempotent suffix check.
    pub fn new(controller: &str) -> Self {
        let controller = if controller.starts_with("http") {
            controller.to_string()
        } else {
            format!("http://{controller}")
        };
        let base = if controller.ends_with("/v1") {
            controller
        } else {
            format!("{controller}/v1")
        };
        Self {
            base,
            http: reqwest::Client::new(),
        }
    }

    pub async fn start_frontend(&self, frontend: &str) -> Result<(), ControllerClientError> {
        let volume = self.get_volume().await?;
        self.post(
            &format!("/volumes/{}?action=startfrontend", volume.id),
            &StartFrontendInput {
                frontend: frontend.to_string(),
            },
        )
        .await
    }

    pub async fn shutdown_frontend(&self) -> Result<(), ControllerClientError> {
        let volume = self.get_volume().await?;
        self.post(
            &format!("/volumes/{}?action=shutdownfrontend", volume.id),
            &serde_json::json!({}),
        )
        .await
    }

    /// Switches the controller's listen port. The server closes the
    /// connection as part of rebinding, which surfaces here as a transport
    /// error; per the upstream contract that specific failure mode during
    /// `updateport` is success, not an error.
    pub async fn update_port(&self, port: u32) -> Result<(), ControllerClientError> {
        match self.post("/settings/updateport", &PortInput { port }).await {
            Ok(()) => Ok(()),
            Err(ControllerClientError::Request(msg)) if looks_like_connection_reset(&msg) => {
                Ok(())
            }
            Err(other) => Err(other),
        }
    }

    pub async fn test_connection(&self) -> Result<(), ControllerClientError> {
        self.get_volumes().await.map(|_| ())
    }

    async fn get_volume(&self) -> Result<Volume, ControllerClientError> {
        let mut volumes = self.get_volumes().await?;
        if volumes.data.is_empty() {
            return Err(ControllerClientError::Decode("no volumes reported".into()));
        }
        Ok(volumes.data.remove(0))
    }

    async fn get_volumes(&self) -> Result<VolumeCollection, ControllerClientError> {
        let resp = self
            .http
            .get(format!("{}/volumes", self.base))
            .send()
            .await
            .map_err(|e| ControllerClientError::Request(e.to_string()))?;
        if resp.status().as_u16() >= 300 {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ControllerClientError::BadResponse { status, body });
        }
        resp.json()
            .await
            .map_err(|e| ControllerClientError::Decode(e.to_string()))
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<(), ControllerClientError> {
        let resp = self
            .http
            .post(format!("{}{}", self.base, path))
            .json(body)
            .send()
            .await
            .map_err(|e| ControllerClientError::Request(e.to_string()))?;
        if resp.status().as_u16() >= 300 {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ControllerClientError::BadResponse { status, body });
        }
        Ok(())
    }
}

fn looks_like_connection_reset(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("connection reset")
        || lower.contains("connection closed")
        || lower.contains("eof")
        || lower.contains("broken pipe")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_v1_suffix_idempotently() {
        let c = ControllerClient::new("127.0.0.1:9501");
        assert_eq!(c.base, "http://127.0.0.1:9501/v1");
        let c2 = ControllerClient::new("http://127.0.0.1:9501/v1");
        assert_eq!(c2.base, "http://127.0.0.1:9501/v1");
    }

    #[test]
    fn connection_reset_during_update_port_is_recognized_as_success_signal() {
        assert!(looks_like_connection_reset("connection reset by peer"));
        assert!(looks_like_connection_reset("unexpected EOF"));
        assert!(!looks_like_connection_reset("404 not found"));
    }
}
