// SPDX-License-Identifier: MIT

//! Human vs `--json` rendering, simplified from the donor CLI's
//! `output.rs`/`table.rs` down to this domain's two record shapes:
//! process and engine snapshots.

use clap::ValueEnum;
use sim_launcher::EngineInfo;
use sim_supervisor::ProcessInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

pub fn print_process(info: &ProcessInfo, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(info) {
                println!("{json}");
            }
        }
        OutputFormat::Text => println!(
            "{:<20} {:<36} {:<10} {}-{}",
            info.name, info.uuid, state_label(&info.state), info.port_start, info.port_end
        ),
    }
}

pub fn print_process_list(infos: &[ProcessInfo], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(infos) {
                println!("{json}");
            }
        }
        OutputFormat::Text => {
            println!("{:<20} {:<36} {:<10} {}", "NAME", "UUID", "STATE", "PORTS");
            for info in infos {
                print_process(info, OutputFormat::Text);
            }
        }
    }
}

pub fn print_engine(info: &EngineInfo, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(info) {
                println!("{json}");
            }
        }
        OutputFormat::Text => println!(
            "{:<20} {:<12} {:<36} {:<10} {}",
            info.name,
            info.volume,
            info.endpoint,
            engine_state_label(&info.state),
            info.frontend.map(|f| f.as_str()).unwrap_or("-")
        ),
    }
}

pub fn print_engine_list(infos: &[EngineInfo], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(infos) {
                println!("{json}");
            }
        }
        OutputFormat::Text => {
            println!("{:<20} {:<12} {:<36} {:<10} {}", "NAME", "VOLUME", "ENDPOINT", "STATE", "FRONTEND");
            for info in infos {
                print_engine(info, OutputFormat::Text);
            }
        }
    }
}

pub fn print_log_line(line: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "line": line })),
        OutputFormat::Text => println!("{line}"),
    }
}

fn state_label(state: &sim_supervisor::ProcessState) -> &'static str {
    use sim_supervisor::ProcessState::*;
    match state {
        Starting => "starting",
        Running => "running",
        Stopping => "stopping",
        Stopped => "stopped",
        Error => "error",
    }
}

fn engine_state_label(state: &sim_launcher::EngineState) -> &'static str {
    use sim_launcher::EngineState::*;
    match state {
        Fresh => "fresh",
        Up => "up",
        Upgrading => "upgrading",
        Deleting => "deleting",
        Gone => "gone",
    }
}
