//! Built-in jobs.

use std::sync::Arc;

use crate::archive::Archiver;
use crate::error::Result;
use crate::job::{JobContext, JobRegistry};
use crate::value::Value;

mod archive;
mod sync;
mod text;


pub use archive::{PackJob, UnpackJob};
pub use sync::SyncJob;
pub use text::TextJob;

/// A registry holding the built-in jobs.
///
/// `text` and `sync` are always present. `pack` and `unpack` need an archive
/// codec and are only registered when `archiver` is given.
pub fn builtin_registry(archiver: Option<Arc<dyn Archiver>>) -> JobRegistry {
    let mut registry = JobRegistry::new();
    registry
        .register_default::<TextJob>()
        .register_default::<SyncJob>();

    if let Some(archiver) = archiver {
        let for_pack = Arc::clone(&archiver);
        registry
            .register("pack", move || Box::new(PackJob::new(Arc::clone(&for_pack))))
            .register("unpack", move || Box::new(UnpackJob::new(Arc::clone(&archiver))));
    }
    registry
}

/// Reads an optional string option; null means unset.
fn string_option(ctx: &JobContext<'_>, slot: &str) -> Result<Option<String>> {
    match ctx.option(slot)? {
        Value::Null => Ok(None),
        Value::Str(s) => Ok(Some(s.clone())),
        other => Err(ctx.fail(format!("option '{slot}' must be a string, got {other}"))),
    }
}

fn required_string(ctx: &JobContext<'_>, slot: &str) -> Result<String> {
    string_option(ctx, slot)?.ok_or_else(|| ctx.fail(format!("option '{slot}' is required")))
}
