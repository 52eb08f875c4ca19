//! Cacheable units of build work.
//!
//! A [`Job`] declares typed argument slots in a [`Schema`]. Every run binds
//! the caller's [`Args`] to those slots, expands and fingerprints them, and
//! compares the result with the job's [`Manifest`]. The build step only runs
//! when something changed; otherwise the stored output is returned.
//!
//! ```text
//! setup -> bind slots -> fingerprint -> changed? --yes--> clean -> build -> persist
//!                                          |
//!                                          +--no--> stored result
//! ```
//!
//! Any error after binding starts discards the manifest, so the next run
//! rebuilds from scratch instead of trusting partial state.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::digest::Diff;
use crate::error::{Result, StevedoreError};
use crate::expand::{ExpandOptions, Expander, Expr};
use crate::logging::Logger;
use crate::manifest::{MANIFEST_FILE, Manifest, SlotState, SlotValue};
use crate::product::Product;
use crate::task::ContextTask;
use crate::value::{Meta, Value};

mod registry;
mod schema;


pub use registry::{JobDirs, JobFactory, JobRegistry, call_name};
pub use schema::{Arg, ArgKind, ArgSpec, Args, Schema, Setup};

/// A cacheable unit of work.
pub trait Job: Send {
    /// Argument slots, in binding order. A job without slots is stateless
    /// and rebuilds on every run.
    fn schema(&self) -> Schema;

    /// Maps the caller's arguments onto slots.
    ///
    /// The default passes them through for strict binding. Jobs that take
    /// positional-style input or fill in defaults return
    /// [`Setup::Custom`].
    fn setup(&mut self, args: Args, job_dir: &Path) -> Result<Setup> {
        let _ = job_dir;
        Ok(Setup::Synthetic(args))
    }

    /// Produces the job output. Runs only when the job changed.
    ///
    /// Outputs must be written below [`JobContext::job_dir`].
    fn build(&mut self, ctx: &mut JobContext<'_>) -> Result<Expr>;

    /// Forces the build step on every run, regardless of fingerprints.
    fn force_rebuild(&self) -> bool {
        false
    }
}

/// What a job run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub products: Vec<Product>,
    /// Whether the build step ran.
    pub rebuilt: bool,
}

/// Environment shared by job runs: the task they run for, expansion
/// options and the logger.
#[derive(Clone, Default)]
pub struct RunEnv<'a> {
    context: Option<ContextTask<'a>>,
    options: ExpandOptions,
    log: Logger,
}

impl<'a> RunEnv<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(mut self, context: ContextTask<'a>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_options(mut self, options: ExpandOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_log(mut self, log: Logger) -> Self {
        self.log = log;
        self
    }

    pub fn context(&self) -> Option<ContextTask<'a>> {
        self.context
    }

    pub fn options(&self) -> &ExpandOptions {
        &self.options
    }

    pub fn log(&self) -> Logger {
        self.log
    }

    fn expander(&self) -> Expander<'a> {
        Expander::new(self.context, self.options.clone(), self.log)
    }
}

/// Runs `job` under the call name `name` in `job_dir`.
///
/// # Errors
///
/// Argument binding errors, fingerprinting errors and build errors are all
/// returned unchanged, after the manifest is removed. A manifest that cannot
/// be loaded (I/O failure, newer format version) is reported before any of
/// that and left in place.
pub fn run(
    job: &mut dyn Job,
    name: &str,
    job_dir: &Path,
    args: Args,
    env: &RunEnv<'_>,
) -> Result<JobOutcome> {
    let schema = job.schema();
    let mut manifest = Manifest::new(job_dir);
    if schema.is_stateful() {
        manifest.load(env.log)?;
    }

    let outcome = run_with_manifest(job, name, &schema, &mut manifest, args, env);
    if outcome.is_err()
        && let Err(err) = manifest.discard()
    {
        env.log.warn(format!("[{name}] could not discard manifest: {err}"));
    }
    outcome
}

fn run_with_manifest(
    job: &mut dyn Job,
    name: &str,
    schema: &Schema,
    manifest: &mut Manifest,
    args: Args,
    env: &RunEnv<'_>,
) -> Result<JobOutcome> {
    let log = env.log;
    let job_dir = manifest.job_dir().to_path_buf();
    let expander = env.expander();

    let mut changed = !schema.is_stateful();
    let mut deltas: BTreeMap<String, Diff> = BTreeMap::new();

    let setup = job.setup(args, &job_dir)?;
    for (spec, arg) in schema.bind(name, setup)? {
        let value = resolve(name, spec, arg, &expander)?;
        manifest.update(spec.name(), value, |change| {
            if change.kind().is_incremental() {
                deltas.insert(change.name().to_string(), change.delta());
            } else if change.is_changed() {
                log.verbose(1, format!("  [{name}] '{}' changed", change.name()));
                changed = true;
            }
        })?;
    }

    let stale = manifest.retain_slots(|slot| schema.get(slot).is_some());
    if stale > 0 {
        log.verbose(1, format!("  [{name}] argument schema changed"));
        changed = true;
    }
    if manifest.result().is_none() || job.force_rebuild() {
        changed = true;
    }

    if !changed {
        log.info(format!("  * [{name}] uptodate"));
        return Ok(JobOutcome {
            products: manifest.result().unwrap_or_default().to_vec(),
            rebuilt: false,
        });
    }

    if !schema.is_incremental() {
        clean(&job_dir)?;
    }

    log.info(format!("  * [{name}] building"));
    let expr = {
        let mut ctx = JobContext {
            name,
            job_dir: &job_dir,
            schema,
            manifest: &mut *manifest,
            deltas: &deltas,
            expander: &expander,
            log,
        };
        job.build(&mut ctx)?
    };

    let products = expander.expand(&expr)?;
    manifest.set_result(products.clone())?;
    manifest.persist()?;

    Ok(JobOutcome {
        products,
        rebuilt: true,
    })
}

/// Expands an argument according to its slot kind.
fn resolve(job: &str, spec: &ArgSpec, arg: Arg, expander: &Expander<'_>) -> Result<SlotValue> {
    let kind_error = || StevedoreError::ArgumentKind {
        job: job.to_string(),
        slot: spec.name().to_string(),
        expected: spec.kind().expects(),
    };

    match (spec.kind(), arg) {
        (ArgKind::Option, Arg::Value(value)) => Ok(SlotValue::Option(value)),
        (ArgKind::Option, Arg::Expr(_)) => Err(kind_error()),
        (_, Arg::Value(_)) => Err(kind_error()),
        (ArgKind::Product, Arg::Expr(expr)) => {
            let mut products = expander.expand(&expr)?;
            if products.len() != 1 {
                return Err(StevedoreError::ArgumentCount {
                    job: job.to_string(),
                    slot: spec.name().to_string(),
                    count: products.len(),
                });
            }
            Ok(SlotValue::Product(products.remove(0)))
        }
        (ArgKind::Products, Arg::Expr(expr)) => Ok(SlotValue::Products(expander.expand(&expr)?)),
        (ArgKind::IncrementalProducts, Arg::Expr(expr)) => {
            Ok(SlotValue::IncrementalProducts(expander.expand(&expr)?))
        }
    }
}

/// Removes everything in `job_dir` except the manifest.
fn clean(job_dir: &Path) -> Result<()> {
    let entries = match fs::read_dir(job_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(source) => return Err(StevedoreError::io(job_dir, source)),
    };

    for entry in entries {
        let entry = entry.map_err(|source| StevedoreError::io(job_dir, source))?;
        if entry.file_name() == MANIFEST_FILE {
            continue;
        }
        let path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|source| StevedoreError::io(&path, source))?;
        let removed = if file_type.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.map_err(|source| StevedoreError::io(&path, source))?;
    }
    Ok(())
}

/// What a job's build step sees: its bound slots, deltas of incremental
/// slots, its working directory and its persisted metadata.
pub struct JobContext<'r> {
    name: &'r str,
    job_dir: &'r Path,
    schema: &'r Schema,
    manifest: &'r mut Manifest,
    deltas: &'r BTreeMap<String, Diff>,
    expander: &'r Expander<'r>,
    log: Logger,
}

impl<'r> JobContext<'r> {
    /// Call name of the running job.
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn job_dir(&self) -> &Path {
        self.job_dir
    }

    /// `path` resolved inside the job directory.
    pub fn job_path(&self, path: impl AsRef<Path>) -> PathBuf {
        self.job_dir.join(path)
    }

    pub fn log(&self) -> Logger {
        self.log
    }

    /// The product bound to a single-product slot.
    pub fn product(&self, slot: &str) -> Result<&Product> {
        match self.slot(slot)? {
            SlotValue::Product(product) => Ok(product),
            _ => Err(self.kind_error(slot, ArgKind::Product)),
        }
    }

    /// The products bound to a product-list slot, incremental or not.
    pub fn products(&self, slot: &str) -> Result<&[Product]> {
        match self.slot(slot)? {
            SlotValue::Products(products) | SlotValue::IncrementalProducts(products) => {
                Ok(products)
            }
            _ => Err(self.kind_error(slot, ArgKind::Products)),
        }
    }

    /// The value bound to an option slot.
    pub fn option(&self, slot: &str) -> Result<&Value> {
        match self.slot(slot)? {
            SlotValue::Option(value) => Ok(value),
            _ => Err(self.kind_error(slot, ArgKind::Option)),
        }
    }

    /// Changes of an incremental slot since the last run. On a first run
    /// every product is reported as added.
    pub fn delta(&self, slot: &str) -> Option<&Diff> {
        self.deltas.get(slot)
    }

    /// Job-owned metadata, persisted with the manifest.
    pub fn meta(&self) -> &Meta {
        self.manifest.meta()
    }

    pub fn meta_mut(&mut self) -> &mut Meta {
        self.manifest.meta_mut()
    }

    /// Expands `expr` in the same context as the job arguments.
    pub fn expand(&self, expr: &Expr) -> Result<Vec<Product>> {
        self.expander.expand(expr)
    }

    /// A build failure attributed to this job.
    pub fn fail(&self, message: impl std::fmt::Display) -> StevedoreError {
        StevedoreError::build(self.name, message)
    }

    fn slot(&self, slot: &str) -> Result<&SlotValue> {
        self.schema
            .get(slot)
            .and_then(|_| self.manifest.slot(slot))
            .map(SlotState::value)
            .ok_or_else(|| StevedoreError::UnknownArguments {
                job: self.name.to_string(),
                names: vec![slot.to_string()],
            })
    }

    fn kind_error(&self, slot: &str, kind: ArgKind) -> StevedoreError {
        StevedoreError::ArgumentKind {
            job: self.name.to_string(),
            slot: slot.to_string(),
            expected: kind.expects(),
        }
    }
}
