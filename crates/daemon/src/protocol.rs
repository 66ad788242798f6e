// SPDX-License-Identifier: MIT

//! Request/response DTOs for the daemon's RPC surface (spec §6). The wire
//! framing itself lives in `protocol_wire`; this module only defines the
//! JSON shapes carried inside each frame.

use serde::{Deserialize, Serialize};
use sim_core::status::{HasStatusCode, StatusCode};
use sim_launcher::{EngineEvent, EngineInfo};
use sim_supervisor::{ProcessEvent, ProcessInfo};

/// One request frame. Tagged by `type` so a hand-inspecting client (or a
/// future second language binding) can read the wire format without a
/// schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    ProcessCreate {
        name: String,
        binary: String,
        args: Vec<String>,
        port_count: u32,
        port_args: Vec<String>,
    },
    ProcessReplace {
        name: String,
        binary: String,
        args: Vec<String>,
        port_count: u32,
        port_args: Vec<String>,
        terminate_signal: String,
    },
    ProcessDelete {
        name: String,
    },
    ProcessGet {
        name: String,
    },
    ProcessList,
    ProcessLog {
        name: String,
    },
    ProcessWatch,

    EngineCreate {
        name: String,
        volume: String,
        binary: String,
        frontend: Option<String>,
        listen: Option<String>,
        size_bytes: u64,
        backends: Vec<String>,
        replicas: Vec<String>,
    },
    EngineDelete {
        name: String,
    },
    EngineGet {
        name: String,
    },
    EngineList,
    EngineUpgrade {
        name: String,
        binary: String,
    },
    EngineLog {
        name: String,
    },
    EngineWatch,
    FrontendStart {
        name: String,
        kind: String,
    },
    FrontendShutdown {
        name: String,
    },
    FrontendStartCallback {
        name: String,
    },
    FrontendShutdownCallback {
        name: String,
    },

    Status,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub protocol_version: String,
    pub process_count: usize,
    pub engine_count: usize,
}

/// One response frame. Streaming RPCs (`ProcessLog`, `ProcessWatch`,
/// `EngineLog`, `EngineWatch`) send a sequence of these terminated by
/// `StreamEnd` rather than a single frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Process(ProcessInfo),
    ProcessListResult(Vec<ProcessInfo>),
    ProcessEventMsg(ProcessEvent),
    Engine(EngineInfo),
    EngineListResult(Vec<EngineInfo>),
    EngineEventMsg(EngineEvent),
    Ack,
    LogLine(String),
    StatusResult(StatusInfo),
    StreamEnd,
    Error { message: String, code: StatusCode },
}

pub fn error_response<E: std::fmt::Display + HasStatusCode>(err: E) -> Response {
    Response::Error {
        message: err.to_string(),
        code: err.status_code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_through_json_by_its_tag() {
        let req = Request::ProcessGet { name: "e-v1".into() };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"type\":\"ProcessGet\""));
        let back: Request = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, Request::ProcessGet { name } if name == "e-v1"));
    }

    #[test]
    fn error_response_carries_the_mapped_status_code() {
        let err = sim_supervisor::SupervisorError::NotFound("e-v1".into());
        match error_response(err) {
            Response::Error { code, .. } => assert_eq!(code, StatusCode::NotFound),
            other => panic!("expected Error, got {other:?}"),
        }
    }
}
