//! # stevedore
//!
//! An incremental build job engine: it tracks file-level build products,
//! memoizes expensive build steps across runs with content digests, and only
//! reruns a step when one of its inputs actually changed.
//!
//! ## Overview
//!
//! A [`product::Product`] pairs a real file (`src`) with a virtual,
//! slash-separated destination (`dst`) and a metadata bag. Inputs are given
//! as [`expand::Expr`] expressions (paths, directories, filtered lists, task
//! outputs) and expanded into flat product lists. A [`job::Job`] declares
//! typed argument slots; every run fingerprints the expanded arguments,
//! compares them with the job's [`manifest::Manifest`], and only calls the
//! build step when something differs.
//!
//! ## Architecture
//!
//! - [`product`], [`value`]: the product model and metadata values
//! - [`glob`], [`filter`], [`expand`]: expression expansion and filter specs
//! - [`task`]: the boundary to an external task scheduler
//! - [`digest`]: per-file fingerprints and fingerprint set diffs
//! - [`manifest`]: persisted per-job state (rkyv, atomic writes)
//! - [`job`]: the job lifecycle, registry and working directories
//! - [`sync`], [`archive`], [`jobs`]: smart copy, the archive capability and
//!   the built-in jobs
//! - [`cli`], [`commands`]: the maintenance binary
//! - [`error`], [`logging`]: ambient error and log types
//!
//! Internal modules (not part of the public API):
//! - `hashing`: BLAKE3 file hashing over memory maps
//! - `timestamp`: conversions between `SystemTime` and stored nanoseconds
//! - `paths`: path normalization without touching the file system
//!
//! ## Library Usage
//!
//! ```no_run
//! use stevedore::expand::Expr;
//! use stevedore::job::{Args, JobDirs, RunEnv};
//! use stevedore::jobs::builtin_registry;
//!
//! let registry = builtin_registry(None);
//! let mut dirs = JobDirs::new("build/tasks/generate");
//! let outcome = registry.run(
//!     "text",
//!     &mut dirs,
//!     Args::new()
//!         .value("content", "version=1.0")
//!         .value("filename", "version.properties"),
//!     &RunEnv::new(),
//! )?;
//!
//! // Outputs feed other jobs as plain expressions.
//! let mirror = registry.run(
//!     "sync",
//!     &mut dirs,
//!     Args::new()
//!         .expr("files", Expr::from(outcome.products))
//!         .value("dst", "dist"),
//!     &RunEnv::new(),
//! )?;
//! assert!(mirror.rebuilt);
//! # Ok::<(), stevedore::error::StevedoreError>(())
//! ```
//!
//! ## Error Handling
//!
//! The crate uses a combination of:
//! - `thiserror` for strongly-typed errors
//! - `miette` for rich diagnostic output in CLI
//!
//! Any error raised while a job runs removes that job's manifest, so the
//! next run rebuilds instead of trusting partial state.

pub mod archive;
pub mod cli;
pub mod commands;
pub mod digest;
pub mod error;
pub mod expand;
pub mod filter;
pub mod glob;
pub mod job;
pub mod jobs;
pub mod logging;
pub mod manifest;
pub mod product;
pub mod sync;
pub mod task;
pub mod value;

// Internal modules
mod hashing;
mod paths;
mod timestamp;
