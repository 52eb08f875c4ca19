//! File fingerprints and fingerprint-set diffs.
//!
//! A [`ProductDigest`] captures `(mtime, size, content hash)` of one product
//! at one instant. [`diff`] compares two digest sets keyed by product
//! identity and splits them into missing, added and updated products. Job
//! change detection and the smart-copy mirror are both built on it.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;

use crate::error::{Result, StevedoreError};
use crate::hashing::{file_stamp, hash_file};
use crate::product::Product;

/// Fingerprint of one product. Equal only if all four fields are equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDigest {
    product: Product,
    mtime_nanos: u128,
    size: u64,
    hash: String,
}

impl ProductDigest {
    pub(crate) fn from_parts(product: Product, mtime_nanos: u128, size: u64, hash: String) -> Self {
        Self {
            product,
            mtime_nanos,
            size,
            hash,
        }
    }

    pub fn product(&self) -> &Product {
        &self.product
    }

    /// Modification time in nanoseconds since UNIX_EPOCH.
    pub fn mtime_nanos(&self) -> u128 {
        self.mtime_nanos
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Hex-encoded BLAKE3 hash of the content.
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

/// Fingerprints a single product.
///
/// # Errors
///
/// [`StevedoreError::FileNotFound`] if `src` does not exist, or an I/O error
/// while reading it.
pub fn fingerprint(product: &Product) -> Result<ProductDigest> {
    let src = product.src();
    if !src.exists() {
        return Err(StevedoreError::FileNotFound(src.to_path_buf()));
    }

    let stamp = file_stamp(src)?;
    let hash = hash_file(src)?;
    Ok(ProductDigest::from_parts(
        product.clone(),
        stamp.mtime_nanos,
        stamp.size,
        hash,
    ))
}

/// Fingerprints every product in parallel. The result keeps input order.
pub fn fingerprint_all(products: &[Product]) -> Result<Vec<ProductDigest>> {
    products.par_iter().map(fingerprint).collect()
}

/// Products partitioned by how their fingerprint changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    /// In the old set only, in old-set order.
    pub missing: Vec<Product>,
    /// In the new set only, in new-set order.
    pub added: Vec<Product>,
    /// In both sets with differing fingerprints, in new-set order.
    pub updated: Vec<Product>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.added.is_empty() && self.updated.is_empty()
    }

    /// Total number of changed products.
    pub fn len(&self) -> usize {
        self.missing.len() + self.added.len() + self.updated.len()
    }
}

/// Compares two digest sets keyed by product identity.
///
/// An absent set is treated as empty. When a set holds the same product
/// twice, its last digest wins.
pub fn diff(old: Option<&[ProductDigest]>, new: Option<&[ProductDigest]>) -> Diff {
    let old = old.unwrap_or_default();
    let new = new.unwrap_or_default();

    let old_map = index(old);
    let new_map = index(new);

    let mut result = Diff::default();
    let mut seen = HashSet::new();
    for digest in old {
        let product = digest.product();
        if !new_map.contains_key(product) && seen.insert(product) {
            result.missing.push(product.clone());
        }
    }

    let mut seen = HashSet::new();
    for digest in new {
        let product = digest.product();
        if !seen.insert(product) {
            continue;
        }
        match old_map.get(product) {
            None => result.added.push(product.clone()),
            Some(previous) if *previous != new_map[product] => {
                result.updated.push(product.clone())
            }
            Some(_) => {}
        }
    }

    result
}

/// Whether the two digest sets differ at all.
pub fn differ(old: Option<&[ProductDigest]>, new: Option<&[ProductDigest]>) -> bool {
    !diff(old, new).is_empty()
}

fn index(digests: &[ProductDigest]) -> HashMap<&Product, &ProductDigest> {
    digests.iter().map(|d| (d.product(), d)).collect()
}
