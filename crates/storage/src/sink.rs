// SPDX-License-Identifier: MIT

//! Per-process log capture: `<logs-dir>/<process-name>.log`, rotated by
//! size. The rotation policy (10 MiB, one `.1` backup) resolves the open
//! point the specification leaves as an implementation choice.

use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::error::LogError;

/// Rotate once the active file exceeds this size.
pub const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;

/// A single supervised process's log file, opened append-only and rotated
/// in place. `LogSink` owns no subprocess state; the supervisor feeds it
/// lines captured from the child's stdout/stderr pipes.
pub struct LogSink {
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl LogSink {
    pub async fn open(logs_dir: &Path, process_name: &str) -> Result<Self, LogError> {
        tokio::fs::create_dir_all(logs_dir)
            .await
            .map_err(|source| LogError::Io {
                path: logs_dir.display().to_string(),
                source,
            })?;
        let path = logs_dir.join(format!("{process_name}.log"));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| LogError::Io {
                path: path.display().to_string(),
                source,
            })?;
        let written = file
            .metadata()
            .await
            .map_err(|source| LogError::Io {
                path: path.display().to_string(),
                source,
            })?
            .len();
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            written,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write_line(&mut self, line: &[u8]) -> Result<(), LogError> {
        self.writer
            .write_all(line)
            .await
            .map_err(|source| self.io_err(source))?;
        if !line.ends_with(b"\n") {
            self.writer
                .write_all(b"\n")
                .await
                .map_err(|source| self.io_err(source))?;
        }
        self.writer.flush().await.map_err(|source| self.io_err(source))?;
        self.written += line.len() as u64 + 1;
        if self.written >= ROTATE_AT_BYTES {
            self.rotate().await?;
        }
        Ok(())
    }

    async fn rotate(&mut self) -> Result<(), LogError> {
        self.writer.flush().await.map_err(|source| self.io_err(source))?;
        let backup = self.backup_path();
        tokio::fs::rename(&self.path, &backup)
            .await
            .map_err(|source| self.io_err(source))?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .truncate(false)
            .open(&self.path)
            .await
            .map_err(|source| self.io_err(source))?;
        self.writer = BufWriter::new(file);
        self.written = 0;
        Ok(())
    }

    fn backup_path(&self) -> PathBuf {
        let mut backup = self.path.clone();
        backup.set_extension("log.1");
        backup
    }

    fn io_err(&self, source: std::io::Error) -> LogError {
        LogError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}
