// SPDX-License-Identifier: MIT

//! `sim`: the operator CLI for the instance-manager daemon. Connects to
//! `simd` over its Unix socket and issues one RPC per invocation, in the
//! spirit of the donor CLI's `main.rs`/`client.rs` but scoped to this
//! daemon's process/engine surface.

mod client;
mod env;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use client::DaemonClient;
use output::OutputFormat;
use sim_daemon::Request;
use sim_daemon::Response;

#[derive(Parser)]
#[command(name = "sim", about = "Control the storage instance-manager daemon")]
struct Cli {
    /// Path to the simd socket. Defaults to the same resolution simd itself uses.
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    /// Output format for commands that print a record.
    #[arg(short = 'o', long = "output", global = true, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process supervisor operations.
    Process {
        #[command(subcommand)]
        command: ProcessCommands,
    },
    /// Engine launcher operations.
    Engine {
        #[command(subcommand)]
        command: EngineCommands,
    },
    /// Frontend (block device / iSCSI) operations for an existing engine.
    Frontend {
        #[command(subcommand)]
        command: FrontendCommands,
    },
    /// Prints daemon protocol version and record counts.
    Status,
}

#[derive(Subcommand)]
enum ProcessCommands {
    Create {
        name: String,
        binary: String,
        #[arg(long = "arg")]
        args: Vec<String>,
        #[arg(long, default_value_t = 0)]
        port_count: u32,
        #[arg(long = "port-arg")]
        port_args: Vec<String>,
    },
    Replace {
        name: String,
        binary: String,
        #[arg(long = "arg")]
        args: Vec<String>,
        #[arg(long, default_value_t = 0)]
        port_count: u32,
        #[arg(long = "port-arg")]
        port_args: Vec<String>,
        #[arg(long, default_value = "SIGTERM")]
        terminate_signal: String,
    },
    Delete {
        name: String,
    },
    Get {
        name: String,
    },
    List,
    Log {
        name: String,
    },
    Watch,
}

#[derive(Subcommand)]
enum EngineCommands {
    Create {
        name: String,
        volume: String,
        binary: String,
        #[arg(long)]
        frontend: Option<String>,
        #[arg(long)]
        listen: Option<String>,
        #[arg(long, default_value_t = 0)]
        size_bytes: u64,
        #[arg(long = "backend")]
        backends: Vec<String>,
        #[arg(long = "replica")]
        replicas: Vec<String>,
    },
    Delete {
        name: String,
    },
    Get {
        name: String,
    },
    List,
    Upgrade {
        name: String,
        binary: String,
    },
    Log {
        name: String,
    },
    Watch,
}

#[derive(Subcommand)]
enum FrontendCommands {
    Start { name: String, kind: String },
    Shutdown { name: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("sim: {err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let socket_path = match cli.socket {
        Some(path) => path,
        None => env::default_socket_path().map_err(anyhow::Error::msg)?,
    };
    let mut client = DaemonClient::connect(&socket_path).await?;
    let format = cli.output;

    match cli.command {
        Commands::Process { command } => run_process(&mut client, command, format).await,
        Commands::Engine { command } => run_engine(&mut client, command, format).await,
        Commands::Frontend { command } => run_frontend(&mut client, command, format).await,
        Commands::Status => {
            let response = client.call(&Request::Status).await?;
            match response {
                Response::StatusResult(info) => {
                    println!("{}", serde_json::to_string_pretty(&info)?);
                    Ok(())
                }
                Response::Error { message, code } => Err(anyhow::anyhow!("{code:?}: {message}")),
                _ => Err(anyhow::anyhow!("unexpected response")),
            }
        }
    }
}

async fn run_process(client: &mut DaemonClient, command: ProcessCommands, format: OutputFormat) -> anyhow::Result<()> {
    let request = match command {
        ProcessCommands::Create { name, binary, args, port_count, port_args } => {
            Request::ProcessCreate { name, binary, args, port_count, port_args }
        }
        ProcessCommands::Replace { name, binary, args, port_count, port_args, terminate_signal } => {
            Request::ProcessReplace { name, binary, args, port_count, port_args, terminate_signal }
        }
        ProcessCommands::Delete { name } => Request::ProcessDelete { name },
        ProcessCommands::Get { name } => Request::ProcessGet { name },
        ProcessCommands::List => Request::ProcessList,
        ProcessCommands::Log { name } => return stream(client, Request::ProcessLog { name }, format).await,
        ProcessCommands::Watch => return stream(client, Request::ProcessWatch, format).await,
    };
    let response = client.call(&request).await?;
    render_process_response(response, format)
}

async fn run_engine(client: &mut DaemonClient, command: EngineCommands, format: OutputFormat) -> anyhow::Result<()> {
    let request = match command {
        EngineCommands::Create { name, volume, binary, frontend, listen, size_bytes, backends, replicas } => {
            Request::EngineCreate { name, volume, binary, frontend, listen, size_bytes, backends, replicas }
        }
        EngineCommands::Delete { name } => Request::EngineDelete { name },
        EngineCommands::Get { name } => Request::EngineGet { name },
        EngineCommands::List => Request::EngineList,
        EngineCommands::Upgrade { name, binary } => Request::EngineUpgrade { name, binary },
        EngineCommands::Log { name } => return stream(client, Request::EngineLog { name }, format).await,
        EngineCommands::Watch => return stream(client, Request::EngineWatch, format).await,
    };
    let response = client.call(&request).await?;
    render_engine_response(response, format)
}

async fn run_frontend(client: &mut DaemonClient, command: FrontendCommands, format: OutputFormat) -> anyhow::Result<()> {
    let request = match command {
        FrontendCommands::Start { name, kind } => Request::FrontendStart { name, kind },
        FrontendCommands::Shutdown { name } => Request::FrontendShutdown { name },
    };
    let response = client.call(&request).await?;
    render_engine_response(response, format)
}

async fn stream(client: &mut DaemonClient, request: Request, format: OutputFormat) -> anyhow::Result<()> {
    let responses = client.call_stream(&request).await?;
    for response in responses {
        match response {
            Response::LogLine(line) => output::print_log_line(&line, format),
            Response::ProcessEventMsg(event) => output::print_process(&event.process, format),
            Response::EngineEventMsg(event) => output::print_engine(&event.engine, format),
            Response::StreamEnd => {}
            Response::Error { message, code } => return Err(anyhow::anyhow!("{code:?}: {message}")),
            _ => return Err(anyhow::anyhow!("unexpected response")),
        }
    }
    Ok(())
}

fn render_process_response(response: Response, format: OutputFormat) -> anyhow::Result<()> {
    match response {
        Response::Process(info) => {
            output::print_process(&info, format);
            Ok(())
        }
        Response::ProcessListResult(infos) => {
            output::print_process_list(&infos, format);
            Ok(())
        }
        Response::Error { message, code } => Err(anyhow::anyhow!("{code:?}: {message}")),
        _ => Err(anyhow::anyhow!("unexpected response")),
    }
}

fn render_engine_response(response: Response, format: OutputFormat) -> anyhow::Result<()> {
    match response {
        Response::Engine(info) => {
            output::print_engine(&info, format);
            Ok(())
        }
        Response::EngineListResult(infos) => {
            output::print_engine_list(&infos, format);
            Ok(())
        }
        Response::Ack => {
            println!("ok");
            Ok(())
        }
        Response::Error { message, code } => Err(anyhow::anyhow!("{code:?}: {message}")),
        _ => Err(anyhow::anyhow!("unexpected response")),
    }
}
