// SPDX-License-Identifier: MIT

//! Binary path allowlist validation.
//!
//! Grounded on `isValidBinary`/`ensureValidProcessPath`/`decodeProcessPath`:
//! the binary's parent directory must be one of two trusted prefixes and
//! its basename must be exactly `longhorn`. Anything else is rejected
//! before a process is ever spawned.

use std::path::Path;

const ALLOWED_PREFIXES: &[&str] = &[
    "/engine-binaries/",
    "/host/var/lib/longhorn/engine-binaries/",
];

const REQUIRED_BASENAME: &str = "longhorn";

/// Validates `binary` against the allowlist. Returns the offending reason
/// as `Err` text (callers wrap it in `SupervisorError::InvalidArgument`).
pub fn validate_binary_path(binary: &Path) -> Result<(), String> {
    let basename = binary
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| format!("binary path {binary:?} has no file name"))?;
    if basename != REQUIRED_BASENAME {
        return Err(format!(
            "binary basename must be \"{REQUIRED_BASENAME}\", got \"{basename}\""
        ));
    }
    let path_str = binary
        .to_str()
        .ok_or_else(|| format!("binary path {binary:?} is not valid UTF-8"))?;
    if !ALLOWED_PREFIXES.iter().any(|prefix| path_str.starts_with(prefix)) {
        return Err(format!(
            "binary path {path_str} is not under an allowlisted engine-binaries directory"
        ));
    }
    Ok(())
}
