use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::archive::{ArchiveFormat, Archiver};
use crate::error::{Result, StevedoreError};
use crate::expand::Expr;
use crate::job::{Args, Job, JobContext, Schema, Setup};
use crate::product::Product;
use crate::value::{Meta, Value};

use super::{required_string, string_option};

fn require(job: &str, args: &Args, names: &[&str]) -> Result<()> {
    let missing: Vec<String> = names
        .iter()
        .filter(|name| !args.contains(name))
        .map(|name| name.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(StevedoreError::MissingArguments {
            job: job.to_string(),
            names: missing,
        })
    }
}

/// Packs `files` into one archive.
///
/// Options:
/// - `dst`: archive path as seen by consumers; the file itself is written to
///   `<job_dir>/<basename of dst>`.
/// - `format`: `zip`, `tar` or `tar.gz`; detected from `dst` when unset.
/// - `level`: compression level handed to the codec.
/// - `meta`: a map attached to the resulting product.
pub struct PackJob {
    archiver: Arc<dyn Archiver>,
}

impl PackJob {
    pub fn new(archiver: Arc<dyn Archiver>) -> Self {
        Self { archiver }
    }
}

impl Job for PackJob {
    fn schema(&self) -> Schema {
        Schema::new()
            .products("files")
            .option("dst")
            .option("format")
            .option("level")
            .option("meta")
    }

    fn setup(&mut self, args: Args, _job_dir: &Path) -> Result<Setup> {
        require("pack", &args, &["files", "dst"])?;
        Ok(Setup::Custom(args))
    }

    fn build(&mut self, ctx: &mut JobContext<'_>) -> Result<Expr> {
        let dst = required_string(ctx, "dst")?;
        let files = ctx.products("files")?;
        if files.is_empty() {
            ctx.log().warn(format!("[{}] No files to pack", ctx.name()));
            return Ok(Expr::Empty);
        }

        let format = match string_option(ctx, "format")? {
            Some(name) => name.parse::<ArchiveFormat>()?,
            None => ArchiveFormat::detect(&dst)?,
        };
        let level = match ctx.option("level")? {
            Value::Null => None,
            Value::Int(level) => Some(
                u32::try_from(*level)
                    .map_err(|_| ctx.fail(format!("invalid compression level {level}")))?,
            ),
            other => return Err(ctx.fail(format!("option 'level' must be an integer, got {other}"))),
        };
        let meta: Meta = match ctx.option("meta")? {
            Value::Null => Meta::new(),
            Value::Map(map) => map.clone(),
            other => return Err(ctx.fail(format!("option 'meta' must be a map, got {other}"))),
        };

        let name = Path::new(&dst)
            .file_name()
            .ok_or_else(|| ctx.fail(format!("'{dst}' has no file name")))?;
        let out = ctx.job_path(name);

        ctx.log().info(format!(
            "  [{}] packing {} files into {}",
            ctx.name(),
            files.len(),
            name.to_string_lossy()
        ));
        self.archiver.pack(files, &out, format, level)?;

        Ok(Product::create(out, Some(dst), meta).into())
    }
}

/// Unpacks every archive of `archives` into `<job_dir>/out`.
///
/// Formats are detected per archive unless the `format` option names one.
/// The output is every file below `out`.
pub struct UnpackJob {
    archiver: Arc<dyn Archiver>,
}

impl UnpackJob {
    pub fn new(archiver: Arc<dyn Archiver>) -> Self {
        Self { archiver }
    }
}

impl Job for UnpackJob {
    fn schema(&self) -> Schema {
        Schema::new().products("archives").option("format")
    }

    fn setup(&mut self, args: Args, _job_dir: &Path) -> Result<Setup> {
        require("unpack", &args, &["archives"])?;
        Ok(Setup::Custom(args))
    }

    fn build(&mut self, ctx: &mut JobContext<'_>) -> Result<Expr> {
        let forced = string_option(ctx, "format")?
            .map(|name| name.parse::<ArchiveFormat>())
            .transpose()?;

        let out = ctx.job_path("out");
        fs::create_dir_all(&out).map_err(|source| StevedoreError::io(&out, source))?;

        for archive in ctx.products("archives")? {
            let format = match forced {
                Some(format) => format,
                None => ArchiveFormat::detect(archive.src())?,
            };
            ctx.log()
                .verbose(1, format!("  [{}] unpacking {}", ctx.name(), archive.dst()));
            self.archiver.unpack(archive.src(), &out, format)?;
        }

        Ok(Expr::path(out))
    }
}
