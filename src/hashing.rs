use std::fs::{self, File, Metadata};
use std::path::Path;

use blake3::Hasher;
use memmap2::Mmap;

use crate::error::{Result, StevedoreError};
use crate::timestamp::system_time_to_nanos;

/// Size and modification time of a file, read in one `stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub size: u64,
    pub mtime_nanos: u128,
}

/// Computes the BLAKE3 hash of a file using memory mapping and parallel
/// processing.
///
/// Symbolic links are followed, so a linked product hashes as its target.
/// Directories are rejected.
///
/// # Returns
///
/// A hex-encoded string of the file's BLAKE3 hash.
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be read
/// - The path (or the target of a link) is a directory
/// - Memory mapping fails
pub fn hash_file(path: &Path) -> Result<String> {
    let metadata = file_metadata(path)?;

    if metadata.len() == 0 {
        return Ok(Hasher::new().finalize().to_hex().to_string());
    }

    let file = File::open(path).map_err(|source| StevedoreError::io(path, source))?;

    // SAFETY: the mapping is read-only and dropped before returning. A
    // concurrent writer can at worst produce a hash that no longer matches
    // the file, which the next fingerprint detects.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|source| StevedoreError::io(path, source))?;

    let mut hasher = Hasher::new();
    hasher.update_rayon(&mmap);

    Ok(hasher.finalize().to_hex().to_string())
}

/// Reads the size and modification time of a file, following links.
///
/// # Errors
///
/// Returns an error if the file cannot be accessed or is a directory.
pub fn file_stamp(path: &Path) -> Result<FileStamp> {
    let metadata = file_metadata(path)?;
    let mtime = metadata
        .modified()
        .map_err(|source| StevedoreError::io(path, source))?;

    Ok(FileStamp {
        size: metadata.len(),
        mtime_nanos: system_time_to_nanos(mtime),
    })
}

fn file_metadata(path: &Path) -> Result<Metadata> {
    let metadata = fs::metadata(path).map_err(|source| StevedoreError::io(path, source))?;

    if metadata.is_dir() {
        return Err(StevedoreError::InvalidFileType {
            path: path.to_path_buf(),
            message: "Directories are not supported".to_string(),
        });
    }

    Ok(metadata)
}
