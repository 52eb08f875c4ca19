//! Implementation of stevedore subcommands.
//!
//! `mod.rs` is a thin dispatcher: it resolves paths against the base
//! directory, calls the command and prints its result to stdout. Progress
//! and warnings go to stderr through the [`Logger`].

use std::path::{Path, PathBuf};

use crate::cli::{Cli, Commands};
use crate::error::{Result, StevedoreError};
use crate::logging::Logger;
use crate::paths::absolutize;

pub(crate) mod files;
pub(crate) mod inspect;

pub use files::{expand_path, fingerprint_files, sync_path};
pub use inspect::{Inspection, SlotSummary, discard, inspect};


/// Execute commands based on the parsed CLI arguments.
pub fn execute(cli: &Cli) -> Result<()> {
    execute_with_dir(cli, None)
}

/// Execute commands with an explicit working directory.
pub fn execute_with_dir(cli: &Cli, working_dir: Option<&Path>) -> Result<()> {
    let opts = cli.global_opts();
    let log = Logger::new(opts.verbose(), opts.quiet());

    let current_dir = match working_dir {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir().map_err(|source| StevedoreError::IoError {
            path: PathBuf::from("."),
            source,
        })?,
    };
    let base_dir = opts.resolve_base_dir(&current_dir);
    let resolve = |path: &PathBuf| absolutize(path, Some(&base_dir));

    match cli.command() {
        Commands::Inspect { job_dir } => {
            print!("{}", inspect(&resolve(job_dir), log)?);
        }
        Commands::Discard { job_dir } => discard(&resolve(job_dir), log)?,
        Commands::Fingerprint { paths } => {
            let paths: Vec<PathBuf> = paths.iter().map(resolve).collect();
            for digest in fingerprint_files(&paths, log)? {
                println!(
                    "{}  {:>10}  {}  {}",
                    digest.hash(),
                    digest.size(),
                    digest.mtime_nanos(),
                    digest.product().src().display()
                );
            }
        }
        Commands::Expand { path, filter } => {
            for product in expand_path(&resolve(path), filter.as_deref(), log)? {
                println!("{} -> {}", product.src().display(), product.dst());
            }
        }
        Commands::Sync {
            src,
            dst_dir,
            filter,
        } => {
            let report = sync_path(&resolve(src), &resolve(dst_dir), filter.as_deref(), log)?;
            for dst in &report.removed {
                println!("- {dst}");
            }
            for dst in &report.added {
                println!("+ {dst}");
            }
            for dst in &report.updated {
                println!("~ {dst}");
            }
        }
    }
    Ok(())
}
