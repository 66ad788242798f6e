// SPDX-License-Identifier: MIT

//! Process record: state and metadata for one supervised child.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessState {
    Starting,
    Running,
    Stopping,
    Stopped,
    Error,
}

/// A requested process. `port_args` entries are prefixes: for the i-th
/// entry, the process gets an additional arg built as
/// `format!("{prefix}{}", port_start + i)`, then split on `,` so a single
/// template can expand into several argv entries (e.g. `"--listen=,"` and
/// `"--listen=,--other="`-style multi-flag templates).
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub name: String,
    pub binary: PathBuf,
    pub args: Vec<String>,
    pub port_count: u32,
    pub port_args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub name: String,
    pub uuid: String,
    pub binary: PathBuf,
    pub args: Vec<String>,
    pub port_start: u32,
    pub port_end: u32,
    pub state: ProcessState,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessEvent {
    pub process: ProcessInfo,
}

/// Expands `port_args` templates against the process's allocated port
/// range, appending the result to `base_args`. Grounded on
/// `allocateProcessPorts`'s port-arg templating.
pub fn expand_port_args(base_args: &[String], port_args: &[String], port_start: u32) -> Vec<String> {
    let mut args = base_args.to_vec();
    for (i, template) in port_args.iter().enumerate() {
        let port = port_start + i as u32;
        let expanded = format!("{template}{port}");
        args.extend(expanded.split(',').map(|s| s.to_string()));
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_single_port_arg_template() {
        let args = expand_port_args(&["controller".into()], &["--listen=127.0.0.1:".into()], 10000);
        assert_eq!(args, vec!["controller", "--listen=127.0.0.1:10000"]);
    }

    #[test]
    fn expands_multiple_templates_with_incrementing_ports() {
        let args = expand_port_args(
            &[],
            &["--a=".into(), "--b=".into()],
            10000,
        );
        assert_eq!(args, vec!["--a=10000", "--b=10001"]);
    }

    #[test]
    fn splits_expanded_template_on_comma() {
        let args = expand_port_args(&[], &["--listen=,--also=".into()], 5000);
        assert_eq!(args, vec!["--listen=", "--also=5000"]);
    }
}
