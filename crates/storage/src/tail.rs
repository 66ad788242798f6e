// SPDX-License-Identifier: MIT

//! Tails a log file for `ProcessLog`/`EngineLog`: replays existing content
//! as a burst, then follows appended lines until the caller drops the
//! receiver or `stop` fires.

use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::mpsc;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Spawns a background task following `path` and returns the receiving
/// end. The task exits (dropping the sender, which ends the stream) once
/// `stop` fires or the channel's receiver is dropped.
pub fn tail(path: PathBuf, mut stop: tokio::sync::watch::Receiver<bool>) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(256);
    tokio::spawn(async move {
        let file = match tokio::fs::File::open(&path).await {
            Ok(f) => f,
            Err(_) => return,
        };
        let mut reader = BufReader::new(file);
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    tokio::select! {
                        _ = tokio::time::sleep(POLL_INTERVAL) => {}
                        _ = stop.changed() => {
                            if *stop.borrow() {
                                return;
                            }
                        }
                    }
                    // EOF: reopen position via seek to current to pick up growth.
                    let pos = match reader.stream_position().await {
                        Ok(p) => p,
                        Err(_) => return,
                    };
                    if reader.seek(std::io::SeekFrom::Start(pos)).await.is_err() {
                        return;
                    }
                }
                Ok(_) => {
                    let text = line.trim_end_matches('\n').to_string();
                    if tx.send(text).await.is_err() {
                        return;
                    }
                }
                Err(_) => return,
            }
            if *stop.borrow() {
                return;
            }
        }
    });
    rx
}
