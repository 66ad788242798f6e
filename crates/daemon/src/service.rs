// SPDX-License-Identifier: MIT

//! Dispatches decoded `Request`s onto the process supervisor and engine
//! manager, returning either a single `Response` or a stream of them for
//! the server-streaming RPCs (`*Log`, `*Watch`).

use sim_adapters::TerminateSignal;
use sim_core::RecvError;
use sim_launcher::{EngineManager, EngineSpec, FrontendKind};
use sim_supervisor::{ProcessSpec, Supervisor};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::protocol::{error_response, Request, Response, StatusInfo};
use crate::protocol_wire::PROTOCOL_VERSION;

#[derive(Clone)]
pub struct Service {
    supervisor: Supervisor,
    engines: EngineManager,
}

/// The outcome of dispatching one request: either a request/response RPC
/// resolves to a single frame, or a streaming RPC hands back a channel of
/// frames the connection loop forwards until the sender is dropped.
pub enum Outcome {
    Single(Response),
    Stream(mpsc::Receiver<Response>),
}

impl Service {
    pub fn new(supervisor: Supervisor, engines: EngineManager) -> Self {
        Self { supervisor, engines }
    }

    pub async fn dispatch(&self, request: Request) -> Outcome {
        match request {
            Request::ProcessCreate { name, binary, args, port_count, port_args } => {
                info!(process = %name, "ProcessCreate");
                let result = self
                    .supervisor
                    .create(ProcessSpec { name, binary: binary.into(), args, port_count, port_args })
                    .await;
                Outcome::Single(single(result.map(Response::Process)))
            }
            Request::ProcessReplace { name, binary, args, port_count, port_args, terminate_signal } => {
                info!(process = %name, "ProcessReplace");
                let signal = match TerminateSignal::parse(&terminate_signal) {
                    Some(s) => s,
                    None => {
                        return Outcome::Single(error_response(sim_supervisor::SupervisorError::InvalidArgument(
                            format!("unsupported terminate signal {terminate_signal}"),
                        )))
                    }
                };
                let result = self
                    .supervisor
                    .replace(ProcessSpec { name, binary: binary.into(), args, port_count, port_args }, signal)
                    .await;
                Outcome::Single(single(result.map(Response::Process)))
            }
            Request::ProcessDelete { name } => {
                info!(process = %name, "ProcessDelete");
                let result = self.supervisor.delete(&name).await;
                Outcome::Single(single(result.map(Response::Process)))
            }
            Request::ProcessGet { name } => {
                debug!(process = %name, "ProcessGet");
                Outcome::Single(single(self.supervisor.get(&name).map(Response::Process)))
            }
            Request::ProcessList => {
                debug!("ProcessList");
                Outcome::Single(Response::ProcessListResult(self.supervisor.list()))
            }
            Request::ProcessLog { name } => match self.supervisor.log_stream(&name) {
                Ok(lines) => Outcome::Stream(forward_lines(lines)),
                Err(err) => Outcome::Single(error_response(err)),
            },
            Request::ProcessWatch => Outcome::Stream(forward_process_events(self.supervisor.watch())),

            Request::EngineCreate { name, volume, binary, frontend, listen, size_bytes, backends, replicas } => {
                info!(engine = %name, "EngineCreate");
                let frontend = match frontend.as_deref().map(FrontendKind::parse) {
                    Some(Some(kind)) => Some(kind),
                    Some(None) => {
                        return Outcome::Single(error_response(sim_launcher::EngineError::InvalidArgument(
                            "unknown frontend kind".into(),
                        )))
                    }
                    None => None,
                };
                let result = self
                    .engines
                    .engine_create(EngineSpec { name, volume, binary: binary.into(), frontend, listen, size_bytes, backends, replicas })
                    .await;
                Outcome::Single(single(result.map(Response::Engine)))
            }
            Request::EngineDelete { name } => {
                info!(engine = %name, "EngineDelete");
                Outcome::Single(single(self.engines.engine_delete(&name).await.map(Response::Engine)))
            }
            Request::EngineGet { name } => {
                debug!(engine = %name, "EngineGet");
                Outcome::Single(single(self.engines.engine_get(&name).map(Response::Engine)))
            }
            Request::EngineList => {
                debug!("EngineList");
                Outcome::Single(Response::EngineListResult(self.engines.engine_list()))
            }
            Request::EngineUpgrade { name, binary } => {
                info!(engine = %name, "EngineUpgrade");
                Outcome::Single(single(self.engines.engine_upgrade(&name, binary.into()).await.map(Response::Engine)))
            }
            Request::EngineLog { name } => match self.engines.engine_log(&name) {
                Ok(lines) => Outcome::Stream(forward_lines(lines)),
                Err(err) => Outcome::Single(error_response(err)),
            },
            Request::EngineWatch => Outcome::Stream(forward_engine_events(self.engines.watch())),
            Request::FrontendStart { name, kind } => {
                info!(engine = %name, "FrontendStart");
                let kind = match FrontendKind::parse(&kind) {
                    Some(kind) => kind,
                    None => {
                        return Outcome::Single(error_response(sim_launcher::EngineError::InvalidArgument(
                            format!("unknown frontend kind {kind}"),
                        )))
                    }
                };
                Outcome::Single(single(self.engines.frontend_start(&name, kind).await.map(Response::Engine)))
            }
            Request::FrontendShutdown { name } => {
                info!(engine = %name, "FrontendShutdown");
                Outcome::Single(single(self.engines.frontend_shutdown(&name).await.map(Response::Engine)))
            }
            Request::FrontendStartCallback { name } => {
                debug!(engine = %name, "FrontendStartCallback");
                Outcome::Single(single(self.engines.frontend_start_callback(&name).await.map(|()| Response::Ack)))
            }
            Request::FrontendShutdownCallback { name } => {
                debug!(engine = %name, "FrontendShutdownCallback");
                Outcome::Single(single(self.engines.frontend_shutdown_callback(&name).await.map(|()| Response::Ack)))
            }
            Request::Status => Outcome::Single(Response::StatusResult(StatusInfo {
                protocol_version: PROTOCOL_VERSION.to_string(),
                process_count: self.supervisor.list().len(),
                engine_count: self.engines.engine_list().len(),
            })),
        }
    }
}

fn single<E: std::fmt::Display + sim_core::status::HasStatusCode>(result: Result<Response, E>) -> Response {
    result.unwrap_or_else(error_response)
}

fn forward_lines(mut lines: mpsc::Receiver<String>) -> mpsc::Receiver<Response> {
    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(async move {
        while let Some(line) = lines.recv().await {
            if tx.send(Response::LogLine(line)).await.is_err() {
                return;
            }
        }
        let _ = tx.send(Response::StreamEnd).await;
    });
    rx
}

fn forward_process_events(mut sub: sim_core::Subscription<sim_supervisor::ProcessEvent>) -> mpsc::Receiver<Response> {
    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(async move {
        loop {
            match sub.recv().await {
                Ok(event) => {
                    if tx.send(Response::ProcessEventMsg(event)).await.is_err() {
                        return;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        let _ = tx.send(Response::StreamEnd).await;
    });
    rx
}

fn forward_engine_events(mut sub: sim_core::Subscription<sim_launcher::EngineEvent>) -> mpsc::Receiver<Response> {
    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(async move {
        loop {
            match sub.recv().await {
                Ok(event) => {
                    if tx.send(Response::EngineEventMsg(event)).await.is_err() {
                        return;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        let _ = tx.send(Response::StreamEnd).await;
    });
    rx
}
