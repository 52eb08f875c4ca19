//! Per-job persisted state.
//!
//! A [`Manifest`] remembers what a job saw on its last successful run: the
//! bound value and fingerprint of every argument slot, the job's output
//! products with their fingerprints, and a free-form metadata map the job
//! may use for its own bookkeeping. It lives at `<job_dir>/.manifest` and is
//! written as a versioned rkyv archive (see [`records`]).

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::digest::{Diff, ProductDigest, diff, fingerprint, fingerprint_all};
use crate::error::{Result, StevedoreError};
use crate::job::ArgKind;
use crate::logging::Logger;
use crate::product::Product;
use crate::value::{Meta, Value};

pub mod records;

#[cfg(test)]
mod tests;

pub use records::{MANIFEST_VERSION, ManifestRecord};

/// Manifest file name, relative to the job directory.
pub const MANIFEST_FILE: &str = ".manifest";

const MANIFEST_TMP_FILE: &str = ".manifest.tmp";

/// The value bound to an argument slot, tagged by slot kind.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotValue {
    Product(Product),
    Products(Vec<Product>),
    IncrementalProducts(Vec<Product>),
    Option(Value),
}

impl SlotValue {
    pub fn kind(&self) -> ArgKind {
        match self {
            SlotValue::Product(_) => ArgKind::Product,
            SlotValue::Products(_) => ArgKind::Products,
            SlotValue::IncrementalProducts(_) => ArgKind::IncrementalProducts,
            SlotValue::Option(_) => ArgKind::Option,
        }
    }

    /// The bound products; empty for options.
    pub fn products(&self) -> &[Product] {
        match self {
            SlotValue::Product(product) => std::slice::from_ref(product),
            SlotValue::Products(products) | SlotValue::IncrementalProducts(products) => products,
            SlotValue::Option(_) => &[],
        }
    }
}

/// A slot value together with its fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotState {
    value: SlotValue,
    digests: Vec<ProductDigest>,
}

impl SlotState {
    pub fn value(&self) -> &SlotValue {
        &self.value
    }

    pub fn digests(&self) -> &[ProductDigest] {
        &self.digests
    }
}

#[derive(Debug, Clone, PartialEq)]
struct StoredResult {
    products: Vec<Product>,
    digests: Vec<ProductDigest>,
}

/// What [`Manifest::update`] hands to its callback: the previous and the
/// new state of one slot.
#[derive(Debug, Clone, Copy)]
pub struct SlotChange<'a> {
    name: &'a str,
    old: Option<&'a SlotState>,
    new: &'a SlotState,
}

impl<'a> SlotChange<'a> {
    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn kind(&self) -> ArgKind {
        self.new.value.kind()
    }

    /// The state stored by the previous run, if the slot existed then.
    pub fn old(&self) -> Option<&'a SlotState> {
        self.old
    }

    /// The state just computed for this run.
    pub fn current(&self) -> &'a SlotState {
        self.new
    }

    /// Fingerprint delta between the previous and the new products.
    pub fn delta(&self) -> Diff {
        diff(
            self.old.map(SlotState::digests),
            Some(self.new.digests()),
        )
    }

    /// Whether the slot differs from the previous run.
    ///
    /// Options compare by structural value equality. Product slots compare
    /// as sets of fingerprints, so reordering alone is not a change.
    pub fn is_changed(&self) -> bool {
        let Some(old) = self.old else {
            return true;
        };
        if old.value.kind() != self.new.value.kind() {
            return true;
        }
        match (&old.value, &self.new.value) {
            (SlotValue::Option(old), SlotValue::Option(new)) => old != new,
            _ => !self.delta().is_empty(),
        }
    }
}

/// Persisted state of one job directory.
#[derive(Debug, Clone)]
pub struct Manifest {
    job_dir: PathBuf,
    slots: BTreeMap<String, SlotState>,
    result: Option<StoredResult>,
    meta: Meta,
}

impl Manifest {
    /// An empty manifest for `job_dir`; nothing is read from disk.
    pub fn new(job_dir: impl Into<PathBuf>) -> Self {
        Self {
            job_dir: job_dir.into(),
            slots: BTreeMap::new(),
            result: None,
            meta: Meta::new(),
        }
    }

    /// Creates a manifest for `job_dir` and loads any stored state.
    pub fn open(job_dir: impl Into<PathBuf>, log: Logger) -> Result<Self> {
        let mut manifest = Self::new(job_dir);
        manifest.load(log)?;
        Ok(manifest)
    }

    /// Reads the stored state of `job_dir` without recovery: unlike
    /// [`Manifest::load`], an undecodable file is reported and left alone.
    ///
    /// `None` means there is no prior state.
    pub fn read(job_dir: impl Into<PathBuf>) -> Result<Option<Self>> {
        let mut manifest = Self::new(job_dir);
        let Some(record) = read_record(&manifest.path())? else {
            return Ok(None);
        };
        let (slots, result, meta) = record.into_parts();
        manifest.slots = slots;
        manifest.result = result;
        manifest.meta = meta;
        Ok(Some(manifest))
    }

    pub fn job_dir(&self) -> &Path {
        &self.job_dir
    }

    /// Full path of the manifest file.
    pub fn path(&self) -> PathBuf {
        self.job_dir.join(MANIFEST_FILE)
    }

    pub fn exists(&self) -> bool {
        self.path().exists()
    }

    /// Replaces the in-memory state with the stored one.
    ///
    /// A missing or empty file leaves the manifest empty. A file that cannot
    /// be decoded is removed with a warning and also leaves it empty, which
    /// forces the owning job to rebuild.
    ///
    /// Returns whether prior state was found.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The manifest exists but cannot be read due to I/O issues
    /// - The manifest version is newer than [`MANIFEST_VERSION`]
    pub fn load(&mut self, log: Logger) -> Result<bool> {
        let path = self.path();
        let record = match read_record(&path) {
            Ok(record) => record,
            Err(StevedoreError::DeserializationError(err)) => {
                log.warn(format!(
                    "Unreadable manifest at '{}' ({err}), resetting job state",
                    path.display()
                ));
                if let Err(remove_err) = fs::remove_file(&path) {
                    log.warn(format!("Could not remove old manifest: {remove_err}"));
                }
                None
            }
            Err(other) => return Err(other),
        };

        let Some(record) = record else {
            self.slots.clear();
            self.result = None;
            self.meta.clear();
            return Ok(false);
        };

        let (slots, result, meta) = record.into_parts();
        self.slots = slots;
        self.result = result;
        self.meta = meta;
        Ok(true)
    }

    pub fn slot(&self, name: &str) -> Option<&SlotState> {
        self.slots.get(name)
    }

    pub fn slots(&self) -> impl Iterator<Item = (&str, &SlotState)> {
        self.slots.iter().map(|(name, slot)| (name.as_str(), slot))
    }

    /// Drops slots for which `keep` is false and returns how many were
    /// dropped.
    pub fn retain_slots(&mut self, mut keep: impl FnMut(&str) -> bool) -> usize {
        let before = self.slots.len();
        self.slots.retain(|name, _| keep(name));
        before - self.slots.len()
    }

    /// Fingerprints `value`, reports the change to `on_change` and stores the
    /// new state under `name`.
    ///
    /// The callback runs for every update, changed or not; the caller decides
    /// what a difference means. Single products get one digest, product lists
    /// one per product, options none.
    pub fn update<R>(
        &mut self,
        name: &str,
        value: SlotValue,
        on_change: impl FnOnce(&SlotChange<'_>) -> R,
    ) -> Result<R> {
        let digests = match &value {
            SlotValue::Product(product) => vec![fingerprint(product)?],
            SlotValue::Products(products) | SlotValue::IncrementalProducts(products) => {
                fingerprint_all(products)?
            }
            SlotValue::Option(_) => Vec::new(),
        };
        let new = SlotState { value, digests };

        let outcome = on_change(&SlotChange {
            name,
            old: self.slots.get(name),
            new: &new,
        });
        self.slots.insert(name.to_string(), new);
        Ok(outcome)
    }

    /// Fingerprints and stores the job output.
    pub fn set_result(&mut self, products: Vec<Product>) -> Result<()> {
        let digests = fingerprint_all(&products)?;
        self.result = Some(StoredResult { products, digests });
        Ok(())
    }

    /// Output of the last successful build, if any.
    pub fn result(&self) -> Option<&[Product]> {
        self.result.as_ref().map(|result| result.products.as_slice())
    }

    pub fn result_digests(&self) -> Option<&[ProductDigest]> {
        self.result.as_ref().map(|result| result.digests.as_slice())
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    /// Writes the manifest atomically.
    ///
    /// The record goes to a temporary file first, which is synced and then
    /// renamed over `.manifest`, so a reader never sees a partial write.
    /// Creates the job directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The job directory cannot be created
    /// - A stored path is not valid UTF-8
    /// - The record cannot be serialized or written
    pub fn persist(&self) -> Result<()> {
        fs::create_dir_all(&self.job_dir)
            .map_err(|source| StevedoreError::CreateManifestDirError(self.job_dir.clone(), source))?;

        let record = ManifestRecord::from_manifest(self)?;
        let bytes = rkyv::to_bytes::<rkyv::rancor::BoxedError>(&record)
            .map_err(|e| StevedoreError::SerializationError(Box::new(e)))?;

        let temp_path = self.job_dir.join(MANIFEST_TMP_FILE);
        let mut temp_file =
            File::create(&temp_path).map_err(|source| StevedoreError::io(&temp_path, source))?;
        temp_file
            .write_all(&bytes)
            .map_err(|source| StevedoreError::io(&temp_path, source))?;
        temp_file
            .sync_all()
            .map_err(|source| StevedoreError::io(&temp_path, source))?;

        let path = self.path();
        fs::rename(&temp_path, &path).map_err(|source| StevedoreError::io(&path, source))?;
        Ok(())
    }

    /// Deletes the manifest file. Succeeds when there is nothing to delete.
    pub fn discard(&self) -> Result<()> {
        discard(&self.job_dir)
    }
}

/// Deletes the manifest of `job_dir`, if any.
pub fn discard(job_dir: &Path) -> Result<()> {
    let path = job_dir.join(MANIFEST_FILE);
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(StevedoreError::io(path, source)),
    }
}

/// Reads the stored record without any recovery.
///
/// `None` means there is no prior state.
pub fn read_record(path: &Path) -> Result<Option<ManifestRecord>> {
    if !path.exists() {
        return Ok(None);
    }

    let file = File::open(path).map_err(|source| StevedoreError::io(path, source))?;
    let len = file
        .metadata()
        .map_err(|source| StevedoreError::io(path, source))?
        .len();
    if len == 0 {
        return Ok(None);
    }

    // SAFETY: the manifest is only written through rename-on-complete, and
    // the mapping does not outlive this function.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|source| StevedoreError::io(path, source))?;

    let record = rkyv::from_bytes::<ManifestRecord, rkyv::rancor::BoxedError>(&mmap[..])
        .map_err(StevedoreError::DeserializationError)?;

    if record.version > MANIFEST_VERSION {
        return Err(StevedoreError::ConfigError(format!(
            "Manifest version {} is newer than supported version {}. Please update stevedore.",
            record.version, MANIFEST_VERSION
        )));
    }

    Ok(Some(record))
}
