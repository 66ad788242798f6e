// SPDX-License-Identifier: MIT

//! Daemon client: connects to the `simd` socket, sends one request, and
//! reads back one response (or a stream of them for the `*Log`/`*Watch`
//! RPCs), speaking the same length-prefixed JSON framing the daemon
//! itself implements in `sim_daemon::protocol_wire`.

use std::path::{Path, PathBuf};

use sim_daemon::protocol_wire::{read_message, write_message, ProtocolError};
use sim_daemon::{Request, Response};
use thiserror::Error;
use tokio::net::UnixStream;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not connect to simd at {path}: {source}")]
    Connect { path: PathBuf, #[source] source: std::io::Error },
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

pub struct DaemonClient {
    stream: UnixStream,
}

impl DaemonClient {
    pub async fn connect(socket_path: &Path) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(socket_path)
            .await
            .map_err(|source| ClientError::Connect { path: socket_path.to_path_buf(), source })?;
        Ok(Self { stream })
    }

    /// Sends one request and reads back exactly one response frame. Not
    /// valid for the streaming RPCs — use [`DaemonClient::call_stream`].
    pub async fn call(&mut self, request: &Request) -> Result<Response, ClientError> {
        let body = sim_daemon::protocol_wire::encode(request)?;
        write_message(&mut self.stream, &body).await?;
        let body = read_message(&mut self.stream).await?;
        Ok(sim_daemon::protocol_wire::decode(&body)?)
    }

    /// Sends one request and reads responses until `Response::StreamEnd`.
    pub async fn call_stream(&mut self, request: &Request) -> Result<Vec<Response>, ClientError> {
        let body = sim_daemon::protocol_wire::encode(request)?;
        write_message(&mut self.stream, &body).await?;
        let mut out = Vec::new();
        loop {
            let body = read_message(&mut self.stream).await?;
            let response: Response = sim_daemon::protocol_wire::decode(&body)?;
            let done = matches!(response, Response::StreamEnd);
            out.push(response);
            if done {
                break;
            }
        }
        Ok(out)
    }
}
