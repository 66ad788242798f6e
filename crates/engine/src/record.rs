// SPDX-License-Identifier: MIT

//! Engine record: one volume's controller process plus its frontend
//! (block device or iSCSI target) state, as tracked by a single launcher.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrontendKind {
    TgtBlockdev,
    TgtIscsi,
}

impl FrontendKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tgt-blockdev" => Some(FrontendKind::TgtBlockdev),
            "tgt-iscsi" => Some(FrontendKind::TgtIscsi),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FrontendKind::TgtBlockdev => "tgt-blockdev",
            FrontendKind::TgtIscsi => "tgt-iscsi",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    Fresh,
    Up,
    Upgrading,
    Deleting,
    Gone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrontendState {
    Down,
    Up,
}

/// Requested engine. `listen` is the bind IP only (default `0.0.0.0`); the
/// port is always assigned by the process supervisor, whether or not the
/// caller named a specific IP — see DESIGN.md.
#[derive(Debug, Clone)]
pub struct EngineSpec {
    pub name: String,
    pub volume: String,
    pub binary: PathBuf,
    pub frontend: Option<FrontendKind>,
    pub listen: Option<String>,
    pub size_bytes: u64,
    pub backends: Vec<String>,
    pub replicas: Vec<String>,
}

/// Public, serializable snapshot of a launcher's engine record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineInfo {
    pub name: String,
    pub volume: String,
    pub binary: PathBuf,
    /// Supervisor process name backing the current engine, derived as
    /// `<launcher_name>-e-<suffix>` for every engine created by an
    /// upgrade, or equal to `name` for the original engine a launcher
    /// was created with.
    pub current_engine_name: String,
    pub pending_binary: Option<PathBuf>,
    /// Supervisor process name of the in-flight upgrade target, set for
    /// the duration of `Upgrading` only.
    pub pending_engine_name: Option<String>,
    pub listen: String,
    pub frontend: Option<FrontendKind>,
    pub frontend_state: FrontendState,
    pub endpoint: String,
    pub target_id: Option<u32>,
    pub state: EngineState,
    pub is_upgrading: bool,
    pub is_deleting: bool,
    pub resource_version: u64,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineEvent {
    pub engine: EngineInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontend_kind_round_trips_through_its_wire_name() {
        assert_eq!(FrontendKind::parse("tgt-blockdev"), Some(FrontendKind::TgtBlockdev));
        assert_eq!(FrontendKind::parse("tgt-iscsi"), Some(FrontendKind::TgtIscsi));
        assert_eq!(FrontendKind::parse("bogus"), None);
        assert_eq!(FrontendKind::TgtBlockdev.as_str(), "tgt-blockdev");
        assert_eq!(FrontendKind::TgtIscsi.as_str(), "tgt-iscsi");
    }
}
