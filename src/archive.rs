//! The archive capability used by the `pack` and `unpack` jobs.
//!
//! Stevedore does not ship archive codecs. Embedders plug one in by
//! implementing [`Archiver`]; this module only decides which format a path
//! calls for.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Result, StevedoreError};
use crate::product::Product;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
}

impl ArchiveFormat {
    /// Picks the format from the file name suffix.
    ///
    /// `.zip` and `.jar` are zip archives, `.tar` is a plain tarball,
    /// `.tar.gz` and `.tgz` are gzipped tarballs. Matching ignores case.
    pub fn detect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        if name.ends_with(".zip") || name.ends_with(".jar") {
            Ok(ArchiveFormat::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Ok(ArchiveFormat::TarGz)
        } else if name.ends_with(".tar") {
            Ok(ArchiveFormat::Tar)
        } else {
            Err(StevedoreError::UnknownArchiveFormat(
                path.display().to_string(),
            ))
        }
    }

    /// Canonical file extension, without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::TarGz => "tar.gz",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ArchiveFormat {
    type Err = StevedoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "zip" | "jar" => Ok(ArchiveFormat::Zip),
            "tar" => Ok(ArchiveFormat::Tar),
            "tar.gz" | "tgz" => Ok(ArchiveFormat::TarGz),
            _ => Err(StevedoreError::UnknownArchiveFormat(s.to_string())),
        }
    }
}

/// Packs products into archives and unpacks them again.
pub trait Archiver: Send + Sync {
    /// Writes `products` into the archive `dst`, each stored under its
    /// `dst`. `level` is a codec-specific compression level.
    fn pack(
        &self,
        products: &[Product],
        dst: &Path,
        format: ArchiveFormat,
        level: Option<u32>,
    ) -> Result<()>;

    /// Extracts the archive `src` into `dst_dir`, which already exists.
    fn unpack(&self, src: &Path, dst_dir: &Path, format: ArchiveFormat) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect() {
        let cases = [
            ("dist/app.zip", ArchiveFormat::Zip),
            ("lib/app.JAR", ArchiveFormat::Zip),
            ("out.tar", ArchiveFormat::Tar),
            ("out.tar.gz", ArchiveFormat::TarGz),
            ("out.tgz", ArchiveFormat::TarGz),
        ];
        for (path, expected) in cases {
            assert_eq!(ArchiveFormat::detect(path).unwrap(), expected, "{path}");
        }
    }

    #[test]
    fn test_detect_unknown() {
        for path in ["notes.txt", "archive", "gz", "dir/.tar/file"] {
            assert!(matches!(
                ArchiveFormat::detect(path),
                Err(StevedoreError::UnknownArchiveFormat(_))
            ));
        }
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("tgz".parse::<ArchiveFormat>().unwrap(), ArchiveFormat::TarGz);
        assert_eq!("ZIP".parse::<ArchiveFormat>().unwrap(), ArchiveFormat::Zip);
        assert!("rar".parse::<ArchiveFormat>().is_err());
        assert_eq!(ArchiveFormat::TarGz.to_string(), "tar.gz");
    }
}
