// SPDX-License-Identifier: MIT

//! The Unix-socket accept loop (spec §4.K): one task per connection, each
//! reading one framed request, dispatching it, and writing back one frame
//! (or a stream of frames terminated by `Response::StreamEnd`).

use std::path::Path;

use tokio::net::{UnixListener, UnixStream};
use tracing::{info, warn};

use crate::protocol::{Request, Response};
use crate::protocol_wire::{read_request, write_response, ProtocolError};
use crate::service::{Outcome, Service};

pub async fn serve(socket_path: &Path, service: Service, mut shutdown: tokio::sync::watch::Receiver<bool>) -> std::io::Result<()> {
    if socket_path.exists() {
        let _ = std::fs::remove_file(socket_path);
    }
    let listener = UnixListener::bind(socket_path)?;
    info!(socket = %socket_path.display(), "listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _addr) = accepted?;
                let service = service.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(stream, service).await {
                        warn!(%err, "connection ended with an error");
                    }
                });
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("listener stopping");
                    return Ok(());
                }
            }
        }
    }
}

async fn handle_connection(mut stream: UnixStream, service: Service) -> Result<(), ProtocolError> {
    loop {
        let request: Request = match read_request(&mut stream).await {
            Ok(req) => req,
            Err(ProtocolError::ConnectionClosed) => return Ok(()),
            Err(err) => return Err(err),
        };

        match service.dispatch(request).await {
            Outcome::Single(response) => {
                write_response(&mut stream, &response).await?;
            }
            Outcome::Stream(mut rx) => {
                while let Some(response) = rx.recv().await {
                    let is_end = matches!(response, Response::StreamEnd);
                    write_response(&mut stream, &response).await?;
                    if is_end {
                        break;
                    }
                }
            }
        }
    }
}
