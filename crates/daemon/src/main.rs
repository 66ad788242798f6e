// SPDX-License-Identifier: MIT

//! `simd`: the instance-manager daemon binary. Flag handling and config
//! resolution happen before anything fallible; the lock is acquired
//! before the socket is bound; a `READY` line on stdout signals to a
//! supervising process (or an integration test) that the RPC surface is
//! live.

use std::path::PathBuf;

use sim_daemon::{build_service, lifecycle, Config};
use tracing_subscriber::EnvFilter;

fn parse_flag<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    let listen = parse_flag(&args, "--listen").map(PathBuf::from);
    let port_range = parse_flag(&args, "--port-range").map(str::to_string);
    let logs_dir = parse_flag(&args, "--logs-dir").map(PathBuf::from);

    setup_logging();

    let config = match Config::load(listen, port_range.as_deref(), logs_dir) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("simd: config error: {err}");
            std::process::exit(1);
        }
    };

    let started = match lifecycle::startup(&config) {
        Ok(started) => started,
        Err(sim_daemon::LifecycleError::LockFailed(path)) => {
            eprintln!("simd: another instance is already running (lock held at {})", path.display());
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("simd: startup failed: {err}");
            std::process::exit(1);
        }
    };

    let service = build_service(&config);
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let socket_path = config.socket_path.clone();
    let listener_task = tokio::spawn(async move { sim_daemon::listener::serve(&socket_path, service, shutdown_rx).await });

    println!("READY");
    tracing::info!(socket = %config.socket_path.display(), "simd ready");

    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(s) => s,
        Err(err) => {
            eprintln!("simd: failed to install SIGTERM handler: {err}");
            std::process::exit(1);
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received SIGINT");
        }
        _ = sigterm.recv() => {
            tracing::info!("received SIGTERM");
        }
    }

    let _ = shutdown_tx.send(true);
    match listener_task.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            eprintln!("simd: listener error during shutdown: {err}");
            lifecycle::shutdown(&config, started);
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("simd: listener task panicked: {err}");
            lifecycle::shutdown(&config, started);
            std::process::exit(2);
        }
    }

    lifecycle::shutdown(&config, started);
}
