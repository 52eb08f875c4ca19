use std::fs;
use std::path::Path;

use crate::error::{Result, StevedoreError};
use crate::expand::Expr;
use crate::job::{Job, JobContext, Schema};
use crate::product::Product;
use crate::value::Value;

use super::required_string;

/// Writes the `content` option into `<job_dir>/<filename>`.
///
/// String content is written as is; any other value is written in its
/// display form.
#[derive(Debug, Default)]
pub struct TextJob;

impl Job for TextJob {
    fn schema(&self) -> Schema {
        Schema::new().option("content").option("filename")
    }

    fn build(&mut self, ctx: &mut JobContext<'_>) -> Result<Expr> {
        let filename = required_string(ctx, "filename")?;
        if Path::new(&filename).is_absolute() || filename.split('/').any(|part| part == "..") {
            return Err(ctx.fail(format!("filename '{filename}' must stay inside the job directory")));
        }

        let content = match ctx.option("content")? {
            Value::Str(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };

        let out = ctx.job_path(&filename);
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent).map_err(|source| StevedoreError::io(parent, source))?;
        }
        fs::write(&out, content).map_err(|source| StevedoreError::io(&out, source))?;
        ctx.log().verbose(2, format!("  [{}] wrote {}", ctx.name(), out.display()));

        Ok(Product::with_dst(out, filename).into())
    }
}
