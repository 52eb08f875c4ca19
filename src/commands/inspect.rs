//! Inspect and discard commands.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::job::ArgKind;
use crate::logging::Logger;
use crate::manifest::{self, Manifest, SlotValue};
use crate::product::Product;

/// One argument slot as stored in a manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotSummary {
    pub name: String,
    pub kind: ArgKind,
    /// Bound products, or the option value rendered as text.
    pub value: String,
    pub fingerprints: usize,
}

/// Stored state of one job directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Inspection {
    pub job_dir: PathBuf,
    /// `false` when the job directory has no manifest.
    pub found: bool,
    pub slots: Vec<SlotSummary>,
    pub result: Option<Vec<Product>>,
    pub meta_keys: Vec<String>,
}

/// Reads the manifest of `job_dir` without modifying anything.
pub fn inspect(job_dir: &Path, log: Logger) -> Result<Inspection> {
    log.verbose(1, format!("Inspecting {}", job_dir.display()));

    let Some(manifest) = Manifest::read(job_dir)? else {
        return Ok(Inspection {
            job_dir: job_dir.to_path_buf(),
            found: false,
            slots: Vec::new(),
            result: None,
            meta_keys: Vec::new(),
        });
    };

    let slots = manifest
        .slots()
        .map(|(name, slot)| SlotSummary {
            name: name.to_string(),
            kind: slot.value().kind(),
            value: match slot.value() {
                SlotValue::Option(value) => value.to_string(),
                other => format!("{} products", other.products().len()),
            },
            fingerprints: slot.digests().len(),
        })
        .collect();

    Ok(Inspection {
        job_dir: job_dir.to_path_buf(),
        found: true,
        slots,
        result: manifest.result().map(<[Product]>::to_vec),
        meta_keys: manifest.meta().keys().cloned().collect(),
    })
}

impl fmt::Display for Inspection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Job directory: {}", self.job_dir.display())?;
        if !self.found {
            return writeln!(f, "  no manifest (never built, or discarded)");
        }

        writeln!(f, "Slots:")?;
        for slot in &self.slots {
            writeln!(
                f,
                "  {} ({}): {} [{} fingerprints]",
                slot.name, slot.kind, slot.value, slot.fingerprints
            )?;
        }

        match &self.result {
            Some(products) => {
                writeln!(f, "Result: {} products", products.len())?;
                for product in products {
                    writeln!(f, "  {} -> {}", product.src().display(), product.dst())?;
                }
            }
            None => writeln!(f, "Result: none")?,
        }

        if !self.meta_keys.is_empty() {
            writeln!(f, "Meta: {}", self.meta_keys.join(", "))?;
        }
        Ok(())
    }
}

/// Deletes the manifest of `job_dir`, forcing its job to rebuild.
pub fn discard(job_dir: &Path, log: Logger) -> Result<()> {
    log.verbose(1, format!("Discarding manifest in {}", job_dir.display()));
    manifest::discard(job_dir)?;
    log.verbose(1, "Manifest discarded");
    Ok(())
}
