use std::fs::OpenOptions;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{Result, StevedoreError};


const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// Compute a [`SystemTime`] from nanoseconds since UNIX_EPOCH.
///
/// Returns `None` when the value is not representable on this platform.
pub fn nanos_to_system_time(nanos: u128) -> Option<SystemTime> {
    let seconds = u64::try_from(nanos / NANOS_PER_SECOND).ok()?;
    let nanos_remainder = (nanos % NANOS_PER_SECOND) as u32;
    UNIX_EPOCH.checked_add(Duration::new(seconds, nanos_remainder))
}

/// Convert SystemTime to nanoseconds since UNIX_EPOCH; times before the
/// epoch clamp to zero.
pub fn system_time_to_nanos(time: SystemTime) -> u128 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos()
}

/// Sets the modification time of a regular file.
///
/// Used after copying a product so that an unchanged mirror compares equal
/// by mtime and never needs rehashing.
///
/// # Errors
///
/// Returns an error if:
/// - The path points to a symbolic link or a directory
/// - The file cannot be opened for writing
/// - The timestamp cannot be set (e.g., permission denied)
pub fn set_file_mtime(path: &Path, mtime: SystemTime) -> Result<()> {
    let metadata = std::fs::symlink_metadata(path).map_err(|source| StevedoreError::io(path, source))?;

    if metadata.is_symlink() {
        return Err(StevedoreError::InvalidFileType {
            path: path.to_path_buf(),
            message: "Cannot set timestamp on symbolic links".to_string(),
        });
    }

    if metadata.is_dir() {
        return Err(StevedoreError::InvalidFileType {
            path: path.to_path_buf(),
            message: "Cannot set timestamp on directories".to_string(),
        });
    }

    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|source| StevedoreError::io(path, source))?;

    file.set_modified(mtime)
        .map_err(|source| StevedoreError::io(path, source))?;

    Ok(())
}
