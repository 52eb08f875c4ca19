//! Fingerprint, expand and sync commands.

use std::path::{Path, PathBuf};

use crate::digest::{ProductDigest, fingerprint_all};
use crate::error::{Result, StevedoreError};
use crate::expand::{ExpandOptions, Expander, Expr};
use crate::logging::Logger;
use crate::product::Product;
use crate::sync::{SyncReport, smart_copy};

/// Fingerprints each file. Directories are rejected.
pub fn fingerprint_files(paths: &[PathBuf], log: Logger) -> Result<Vec<ProductDigest>> {
    log.verbose(1, format!("Fingerprinting {} files", paths.len()));
    let products: Vec<Product> = paths.iter().map(Product::new).collect();
    fingerprint_all(&products)
}

/// Expands `path`, optionally through a filter spec.
pub fn expand_path(path: &Path, filter: Option<&str>, log: Logger) -> Result<Vec<Product>> {
    let expr = match filter {
        Some(spec) => Expr::filtered(path, spec),
        None => Expr::path(path),
    };
    let products = Expander::new(None, ExpandOptions::default(), log).expand(&expr)?;
    log.verbose(1, format!("Expanded {} into {} products", path.display(), products.len()));
    Ok(products)
}

/// Mirrors the expansion of `src` into `dst_dir`.
pub fn sync_path(src: &Path, dst_dir: &Path, filter: Option<&str>, log: Logger) -> Result<SyncReport> {
    if !src.exists() {
        return Err(StevedoreError::FileNotFound(src.to_path_buf()));
    }

    let products = expand_path(src, filter, log)?;
    let (_, report) = smart_copy(&products, dst_dir)?;

    log.info(format!(
        "Synced {} products to {}: {} added, {} updated, {} removed",
        products.len(),
        dst_dir.display(),
        report.added.len(),
        report.updated.len(),
        report.removed.len()
    ));
    Ok(report)
}
