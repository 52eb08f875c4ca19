use std::path::{Path, PathBuf};

use crate::error::{Result, StevedoreError};
use crate::expand::Expr;
use crate::job::{Args, Job, JobContext, Schema, Setup};
use crate::sync::smart_copy;
use crate::value::Value;

use super::required_string;

const DEFAULT_DIR: &str = "files";

/// Mirrors `files` into the directory `dst` with [`smart_copy`].
///
/// `dst` defaults to `files/` inside the job directory, which keeps the
/// manifest out of the mirror. The job runs on every call and keeps its
/// directory between runs, so an unchanged mirror costs one stat per file.
#[derive(Debug, Default)]
pub struct SyncJob;

impl Job for SyncJob {
    fn schema(&self) -> Schema {
        // Incremental so the runner leaves the mirror in place.
        Schema::new().incremental("files").option("dst")
    }

    fn setup(&mut self, mut args: Args, job_dir: &Path) -> Result<Setup> {
        if !args.contains("files") {
            return Err(StevedoreError::MissingArguments {
                job: "sync".to_string(),
                names: vec!["files".to_string()],
            });
        }
        if !args.contains("dst") {
            let path = job_dir.join(DEFAULT_DIR);
            let dir = path
                .to_str()
                .ok_or_else(|| StevedoreError::InvalidUtf8Path(path.clone()))?;
            args.insert("dst", Value::from(dir));
        }
        Ok(Setup::Custom(args))
    }

    fn build(&mut self, ctx: &mut JobContext<'_>) -> Result<Expr> {
        let dst = PathBuf::from(required_string(ctx, "dst")?);
        let dst = if dst.is_relative() { ctx.job_path(dst) } else { dst };
        let files = ctx.products("files")?;

        ctx.log()
            .verbose(1, format!("  [{}] syncing {} files to {}", ctx.name(), files.len(), dst.display()));
        let (mirrored, report) = smart_copy(files, &dst)?;
        ctx.log().verbose(
            1,
            format!(
                "  [{}] {} added, {} updated, {} removed",
                ctx.name(),
                report.added.len(),
                report.updated.len(),
                report.removed.len()
            ),
        );

        Ok(mirrored.into())
    }

    fn force_rebuild(&self) -> bool {
        true
    }
}
