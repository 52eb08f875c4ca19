//! Command-line interface definitions for stevedore.
//!
//! The binary is a thin maintenance surface over the library: it inspects and
//! discards job manifests, fingerprints files, and runs expansion and smart
//! copy from the shell. The main entry point is the [`Cli`] struct.
//!
//! # Example
//!
//! ```no_run
//! use stevedore::cli::{Cli, Commands};
//!
//! let cli = Cli::parse_args();
//! match cli.command() {
//!     Commands::Inspect { job_dir } => println!("inspecting {}", job_dir.display()),
//!     _ => {}
//! }
//! ```

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::error::{Result, StevedoreError};
use crate::paths::absolutize;


/// Main command-line interface for stevedore.
#[derive(Parser)]
#[command(
    name = "stevedore",
    bin_name = "stevedore",
    author,
    version,
    about = "Inspect and maintain incremental build job state",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    global_opts: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command.
///
/// Relative paths given to commands resolve against the base directory.
#[derive(Parser)]
pub struct GlobalOpts {
    /// Directory relative paths resolve against (defaults to the current
    /// directory)
    #[arg(long, global = true, env = "STEVEDORE_BASE_DIR")]
    base_dir: Option<PathBuf>,

    /// Enable verbose output (use multiple times for more verbosity)
    #[arg(short, long, global = true, action = clap::ArgAction::Count, env = "STEVEDORE_VERBOSE")]
    verbose: u8,

    /// Silence all output except for errors and command results
    #[arg(
        short,
        long,
        global = true,
        conflicts_with = "verbose",
        env = "STEVEDORE_QUIET"
    )]
    quiet: bool,
}

impl GlobalOpts {
    pub fn builder() -> GlobalOptsBuilder {
        GlobalOptsBuilder::default()
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    /// The absolute base directory, resolving a relative one against
    /// `working_dir`.
    pub fn resolve_base_dir(&self, working_dir: &Path) -> PathBuf {
        match self.base_dir() {
            Some(dir) => absolutize(dir, Some(working_dir)),
            None => absolutize(working_dir, None),
        }
    }

    pub fn verbose(&self) -> u8 {
        self.verbose
    }

    pub fn quiet(&self) -> bool {
        self.quiet
    }
}

/// Builds [`GlobalOpts`] without parsing a command line.
#[derive(Default)]
pub struct GlobalOptsBuilder {
    base_dir: Option<PathBuf>,
    verbose: u8,
    quiet: bool,
}

impl GlobalOptsBuilder {
    pub fn base_dir(mut self, dir: Option<impl Into<PathBuf>>) -> Self {
        self.base_dir = dir.map(Into::into);
        self
    }

    pub fn verbose(mut self, level: u8) -> Self {
        self.verbose = level;
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn build(self) -> GlobalOpts {
        GlobalOpts {
            base_dir: self.base_dir,
            verbose: self.verbose,
            quiet: self.quiet,
        }
    }
}

impl Cli {
    pub fn global_opts(&self) -> &GlobalOpts {
        &self.global_opts
    }

    pub fn command(&self) -> &Commands {
        &self.command
    }

    /// Create a builder for programmatic construction
    pub fn builder() -> CliBuilder {
        CliBuilder::default()
    }

    /// Parses the process arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Builder for [`Cli`]
#[derive(Debug, Default)]
pub struct CliBuilder {
    base_dir: Option<PathBuf>,
    verbose: u8,
    quiet: bool,
    command: Option<Commands>,
}

impl CliBuilder {
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn verbose(mut self, level: u8) -> Self {
        self.verbose = level;
        self
    }

    pub fn quiet(mut self, enabled: bool) -> Self {
        self.quiet = enabled;
        self
    }

    pub fn command(mut self, command: Commands) -> Self {
        self.command = Some(command);
        self
    }

    pub fn build(self) -> Result<Cli> {
        let command = self
            .command
            .ok_or_else(|| StevedoreError::ConfigError("Command is required".to_string()))?;

        Ok(Cli {
            global_opts: GlobalOpts::builder()
                .base_dir(self.base_dir)
                .verbose(self.verbose)
                .quiet(self.quiet)
                .build(),
            command,
        })
    }
}

/// Available stevedore subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Show the stored state of a job directory
    ///
    /// Prints every argument slot with its kind and fingerprint count, the
    /// stored result products and the job metadata keys. The manifest is
    /// only read; an unreadable manifest is reported, not removed.
    Inspect {
        /// Job working directory (the one holding `.manifest`)
        job_dir: PathBuf,
    },

    /// Delete the manifest of a job directory
    ///
    /// The next run of that job rebuilds from scratch. Deleting a manifest
    /// that does not exist succeeds.
    Discard {
        /// Job working directory
        job_dir: PathBuf,
    },

    /// Print the fingerprint of files
    ///
    /// One line per file: content hash, size in bytes, modification time in
    /// nanoseconds since the epoch, and the path.
    Fingerprint {
        /// Files to fingerprint
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Expand a path into products
    ///
    /// A file expands to itself, a directory to every file below it with
    /// destinations relative to the directory. Prints `src -> dst` lines.
    Expand {
        /// File or directory to expand
        path: PathBuf,

        /// Filter spec `[[new_base:]old_base:]glob` applied to destinations
        #[arg(long)]
        filter: Option<String>,
    },

    /// Mirror a path into a directory
    ///
    /// Removes files that are not part of the source, copies new ones and
    /// rewrites existing ones only when their content changed.
    Sync {
        /// File or directory to mirror
        src: PathBuf,

        /// Directory to mirror into
        dst_dir: PathBuf,

        /// Filter spec applied to the source products
        #[arg(long)]
        filter: Option<String>,
    },
}
