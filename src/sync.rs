//! Copying products into directories.
//!
//! [`smart_copy`] treats the destination directory as a mirror of a product
//! list keyed by `dst`: stale files are removed, new files are copied and
//! existing files are only rewritten when their content actually differs.
//! Copies keep the source modification time, so a mirror that is already up
//! to date is recognized without hashing anything.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::error::{Result, StevedoreError};
use crate::expand::expand_dir;
use crate::hashing::{file_stamp, hash_file};
use crate::paths::absolutize;
use crate::product::Product;
use crate::timestamp::nanos_to_system_time;

/// What [`smart_copy`] did, by destination path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub removed: Vec<String>,
    pub added: Vec<String>,
    pub updated: Vec<String>,
}

impl SyncReport {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty() && self.updated.is_empty()
    }

    pub fn len(&self) -> usize {
        self.removed.len() + self.added.len() + self.updated.len()
    }
}

/// Copies every product to `dst_dir/<dst>`.
///
/// Returns the copies, which keep their `dst` and metadata.
pub fn copy(products: &[Product], dst_dir: &Path) -> Result<Vec<Product>> {
    let dst_dir = absolutize(dst_dir, None);
    products
        .iter()
        .map(|product| {
            let target = target_path(&dst_dir, product.dst())?;
            copy_file(product.src(), &target)?;
            Ok(relocate(product, target))
        })
        .collect()
}

/// Mirrors `products` into `dst_dir`.
///
/// Files below `dst_dir` without a matching `dst` are deleted and emptied
/// directories pruned. A file that already exists is overwritten only when
/// its modification time differs from the source AND its content hash
/// differs. When two products share a `dst`, the later one wins.
///
/// Returns the mirrored products in source order, deduplicated by `dst`.
pub fn smart_copy(products: &[Product], dst_dir: &Path) -> Result<(Vec<Product>, SyncReport)> {
    let dst_dir = absolutize(dst_dir, None);
    fs::create_dir_all(&dst_dir).map_err(|source| StevedoreError::io(&dst_dir, source))?;

    let mut sources: Vec<&Product> = Vec::with_capacity(products.len());
    let mut index: BTreeMap<&str, usize> = BTreeMap::new();
    for product in products {
        match index.get(product.dst()) {
            Some(&at) => sources[at] = product,
            None => {
                index.insert(product.dst(), sources.len());
                sources.push(product);
            }
        }
    }

    let mut report = SyncReport::default();

    let existing = expand_dir(&dst_dir)?;
    for stale in existing.iter().filter(|p| !index.contains_key(p.dst())) {
        fs::remove_file(stale.src()).map_err(|source| StevedoreError::io(stale.src(), source))?;
        report.removed.push(stale.dst().to_string());
    }
    if !report.removed.is_empty() {
        remove_empty_dirs(&dst_dir)?;
    }

    let outcomes: Vec<Result<(Product, Action)>> = sources
        .par_iter()
        .map(|product| {
            let target = target_path(&dst_dir, product.dst())?;
            let action = if !target.exists() {
                Action::Add
            } else if needs_update(product.src(), &target)? {
                Action::Update
            } else {
                Action::Keep
            };
            if action != Action::Keep {
                copy_file(product.src(), &target)?;
            }
            Ok((relocate(product, target), action))
        })
        .collect();

    let mut mirrored = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        let (product, action) = outcome?;
        match action {
            Action::Add => report.added.push(product.dst().to_string()),
            Action::Update => report.updated.push(product.dst().to_string()),
            Action::Keep => {}
        }
        mirrored.push(product);
    }

    Ok((mirrored, report))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Add,
    Update,
    Keep,
}

fn needs_update(src: &Path, target: &Path) -> Result<bool> {
    if file_stamp(src)?.mtime_nanos == file_stamp(target)?.mtime_nanos {
        return Ok(false);
    }
    Ok(hash_file(src)? != hash_file(target)?)
}

/// Resolves `dst` below `dst_dir`, refusing paths that climb out of it.
fn target_path(dst_dir: &Path, dst: &str) -> Result<PathBuf> {
    let target = absolutize(dst, Some(dst_dir));
    if dst.is_empty() || target == dst_dir || !target.starts_with(dst_dir) {
        return Err(StevedoreError::ConfigError(format!(
            "Destination '{dst}' does not resolve to a file inside '{}'",
            dst_dir.display()
        )));
    }
    Ok(target)
}

fn relocate(product: &Product, target: PathBuf) -> Product {
    product.map(|_, _, _| (Some(target), None, None))
}

/// Copies `src` over `target`, creating parent directories and carrying
/// the source modification time over.
fn copy_file(src: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|source| StevedoreError::io(parent, source))?;
    }
    fs::copy(src, target).map_err(|source| StevedoreError::io(src, source))?;

    let stamp = file_stamp(src)?;
    if let Some(mtime) = nanos_to_system_time(stamp.mtime_nanos) {
        crate::timestamp::set_file_mtime(target, mtime)?;
    }
    Ok(())
}

/// Removes empty directories below `root`, deepest first. `root` stays.
fn remove_empty_dirs(root: &Path) -> Result<()> {
    for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
        let entry = entry.map_err(|err| {
            let path = err
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.to_path_buf());
            StevedoreError::io(path, err.into())
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        let is_empty = fs::read_dir(path)
            .map_err(|source| StevedoreError::io(path, source))?
            .next()
            .is_none();
        if is_empty {
            fs::remove_dir(path).map_err(|source| StevedoreError::io(path, source))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use assert_fs::TempDir;
    use assert_fs::prelude::*;
    use filetime::{FileTime, set_file_mtime};
    use predicates::prelude::*;

    use super::*;
    use crate::expand::{ExpandOptions, Expr, expand};
    use crate::value::{Value, meta};

    fn source_tree(temp: &TempDir) -> Vec<Product> {
        temp.child("src/a.txt").write_str("alpha").unwrap();
        temp.child("src/lib/b.txt").write_str("beta").unwrap();
        temp.child("src/lib/deep/c.txt").write_str("gamma").unwrap();
        expand(
            &Expr::path(temp.child("src").path()),
            None,
            &ExpandOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_copy_keeps_dst_and_meta() {
        let temp = TempDir::new().unwrap();
        temp.child("one.txt").write_str("1").unwrap();
        let product = Product::create(
            temp.child("one.txt").path(),
            Some("nested/one.txt"),
            meta([("tag", Value::from("x"))]),
        );

        let copies = copy(&[product], temp.child("out").path()).unwrap();
        assert_eq!(copies.len(), 1);
        assert_eq!(copies[0].dst(), "nested/one.txt");
        assert_eq!(copies[0].get("tag"), Some(&Value::from("x")));
        temp.child("out/nested/one.txt").assert("1");
    }

    #[test]
    fn test_copy_refuses_escaping_dst() {
        let temp = TempDir::new().unwrap();
        temp.child("one.txt").write_str("1").unwrap();
        let product = Product::with_dst(temp.child("one.txt").path(), "../escape.txt");

        let err = copy(&[product], temp.child("out").path()).unwrap_err();
        assert!(matches!(err, StevedoreError::ConfigError(_)));
        temp.child("escape.txt").assert(predicate::path::missing());
    }

    #[test]
    fn test_smart_copy_into_empty_dir() {
        let temp = TempDir::new().unwrap();
        let products = source_tree(&temp);

        let (mirrored, report) = smart_copy(&products, temp.child("dst").path()).unwrap();
        assert_eq!(report.added, vec!["a.txt", "lib/b.txt", "lib/deep/c.txt"]);
        assert!(report.removed.is_empty() && report.updated.is_empty());
        assert_eq!(mirrored.len(), 3);
        temp.child("dst/lib/deep/c.txt").assert("gamma");
    }

    #[test]
    fn test_smart_copy_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let products = source_tree(&temp);
        let dst = temp.child("dst");

        smart_copy(&products, dst.path()).unwrap();
        let (_, report) = smart_copy(&products, dst.path()).unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn test_smart_copy_removes_stale_and_prunes_dirs() {
        let temp = TempDir::new().unwrap();
        let products = source_tree(&temp);
        let dst = temp.child("dst");
        smart_copy(&products, dst.path()).unwrap();

        dst.child("old/deeper/stale.txt").write_str("stale").unwrap();
        let kept: Vec<Product> = products
            .into_iter()
            .filter(|p| p.dst() != "lib/deep/c.txt")
            .collect();

        let (_, report) = smart_copy(&kept, dst.path()).unwrap();
        let mut removed = report.removed.clone();
        removed.sort();
        assert_eq!(removed, vec!["lib/deep/c.txt", "old/deeper/stale.txt"]);
        dst.child("old").assert(predicate::path::missing());
        dst.child("lib/deep").assert(predicate::path::missing());
        dst.child("lib/b.txt").assert(predicate::path::exists());
    }

    #[test]
    fn test_smart_copy_updates_changed_content() {
        let temp = TempDir::new().unwrap();
        let products = source_tree(&temp);
        let dst = temp.child("dst");
        smart_copy(&products, dst.path()).unwrap();

        temp.child("src/a.txt").write_str("alpha, revised").unwrap();
        let later = SystemTime::now() + Duration::from_secs(10);
        set_file_mtime(
            temp.child("src/a.txt").path(),
            FileTime::from_system_time(later),
        )
        .unwrap();

        let (_, report) = smart_copy(&products, dst.path()).unwrap();
        assert_eq!(report.updated, vec!["a.txt"]);
        dst.child("a.txt").assert("alpha, revised");
    }

    #[test]
    fn test_smart_copy_skips_touched_but_identical() {
        let temp = TempDir::new().unwrap();
        let products = source_tree(&temp);
        let dst = temp.child("dst");
        smart_copy(&products, dst.path()).unwrap();

        let later = SystemTime::now() + Duration::from_secs(10);
        set_file_mtime(
            temp.child("src/lib/b.txt").path(),
            FileTime::from_system_time(later),
        )
        .unwrap();

        let (_, report) = smart_copy(&products, dst.path()).unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn test_smart_copy_last_duplicate_wins() {
        let temp = TempDir::new().unwrap();
        temp.child("first.txt").write_str("first").unwrap();
        temp.child("second.txt").write_str("second").unwrap();
        let products = vec![
            Product::with_dst(temp.child("first.txt").path(), "out.txt"),
            Product::with_dst(temp.child("second.txt").path(), "out.txt"),
        ];

        let (mirrored, report) = smart_copy(&products, temp.child("dst").path()).unwrap();
        assert_eq!(mirrored.len(), 1);
        assert_eq!(report.added, vec!["out.txt"]);
        temp.child("dst/out.txt").assert("second");
    }
}
