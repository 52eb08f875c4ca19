//! Error types for stevedore.
//!
//! Every fallible operation in the crate returns [`StevedoreError`]. Variants
//! are grouped the same way failures are treated at runtime:
//!
//! - build-definition mistakes (bad filters, wrong job arguments, unknown
//!   jobs) are fatal and never retried
//! - filesystem failures carry the offending path
//! - dependency-visibility failures name both tasks involved
//! - build-step failures propagate after the job manifest is discarded
//!
//! # Example
//!
//! ```no_run
//! use stevedore::error::{Result, StevedoreError};
//!
//! fn require_option(name: &str, present: bool) -> Result<()> {
//!     if !present {
//!         return Err(StevedoreError::MissingArguments {
//!             job: "text".to_string(),
//!             names: vec![name.to_string()],
//!         });
//!     }
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Error types that can occur in stevedore operations
#[derive(Error, Debug, Diagnostic)]
pub enum StevedoreError {
    /// A product filter string could not be parsed.
    ///
    /// Filter strings have the form `[[new_base:]old_base:]glob`; the glob
    /// part must be non-empty.
    #[error("Invalid product filter '{filter}': {message}")]
    #[diagnostic(
        code(stevedore::expand::invalid_filter),
        help("Use 'glob', 'old_base:glob' or 'new_base:old_base:glob', e.g. 'out:src:**/*.json'.")
    )]
    InvalidFilter {
        /// The filter string as written
        filter: String,
        /// Why parsing failed
        message: String,
    },

    /// A glob pattern could not be translated into a matcher.
    #[error("Invalid glob pattern '{glob}'")]
    #[diagnostic(code(stevedore::expand::invalid_glob))]
    InvalidGlob {
        /// The glob as written
        glob: String,
        /// The underlying regex compilation error
        #[source]
        source: regex::Error,
    },

    /// A task bucket was referenced from outside its prerequisite closure.
    ///
    /// Expansion may only read the bucket of the context task itself or of
    /// one of its direct or transitive prerequisites.
    #[error("Target task [{target}] is not in context task [{context}] prerequisites")]
    #[diagnostic(
        code(stevedore::expand::dependency),
        help("Declare the target task as a prerequisite of the context task.")
    )]
    Dependency {
        /// The task whose bucket was requested
        target: String,
        /// The task expansion was running in (`<none>` without a context)
        context: String,
    },

    /// A task reference named a task the scheduler does not know.
    #[error("Unknown task '{0}'")]
    #[diagnostic(code(stevedore::expand::unknown_task))]
    UnknownTask(
        /// The task name that was referenced
        String,
    ),

    /// Arguments were passed that the job does not declare.
    #[error("Unknown arguments for job '{job}': {}", names.join(", "))]
    #[diagnostic(
        code(stevedore::job::unknown_arguments),
        help("Check the argument names against the job schema.")
    )]
    UnknownArguments {
        /// Job call name
        job: String,
        /// Offending argument names, in the order they were passed
        names: Vec<String>,
    },

    /// Declared job arguments were not supplied.
    #[error("Missing arguments for job '{job}': {}", names.join(", "))]
    #[diagnostic(code(stevedore::job::missing_arguments))]
    MissingArguments {
        /// Job call name
        job: String,
        /// Missing argument names, in declaration order
        names: Vec<String>,
    },

    /// A single-product slot expanded to zero or several products.
    #[error("Expected only one product for '{slot}' of job '{job}', got {count}")]
    #[diagnostic(code(stevedore::job::argument_count))]
    ArgumentCount {
        /// Job call name
        job: String,
        /// Slot name
        slot: String,
        /// Number of products the expression expanded to
        count: usize,
    },

    /// A slot received the wrong kind of argument (expression vs. option).
    #[error("Argument '{slot}' of job '{job}' expects {expected}")]
    #[diagnostic(code(stevedore::job::argument_kind))]
    ArgumentKind {
        /// Job call name
        job: String,
        /// Slot name
        slot: String,
        /// Human readable description of what the slot accepts
        expected: &'static str,
    },

    /// No job is registered under the requested call name.
    #[error("Unknown job '{0}'")]
    #[diagnostic(
        code(stevedore::job::unknown),
        help("Register the job type with JobRegistry before running it.")
    )]
    UnknownJob(
        /// The call name that was looked up
        String,
    ),

    /// The job's build step failed.
    #[error("Job '{job}' failed: {message}")]
    #[diagnostic(code(stevedore::job::build))]
    Build {
        /// Job call name
        job: String,
        /// Description of the failure
        message: String,
    },

    /// A product could not be fingerprinted because its source is gone.
    #[error("File does not exist: '{0}'")]
    #[diagnostic(
        code(stevedore::digest::file_not_found),
        help("Products must point at existing files when they are fingerprinted.")
    )]
    FileNotFound(
        /// The missing source path
        PathBuf,
    ),

    /// File system I/O error.
    #[error("I/O error accessing '{path}'")]
    #[diagnostic(code(stevedore::io_error))]
    IoError {
        /// The path that caused the I/O error
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A directory was fingerprinted, or a link was given an mtime.
    #[error("Invalid file type for '{path}': {message}")]
    #[diagnostic(
        code(stevedore::file::invalid_type),
        help("Products must point at files; links are followed to their target.")
    )]
    InvalidFileType {
        /// The path of the invalid file
        path: PathBuf,
        /// Description of the file type issue
        message: String,
    },

    /// A path cannot be stored because it is not valid UTF-8.
    #[error("Invalid UTF-8 in path: {0}")]
    #[diagnostic(code(stevedore::path::invalid_utf8))]
    InvalidUtf8Path(
        /// The path containing invalid UTF-8
        PathBuf,
    ),

    /// Failed to create the directory that holds a manifest.
    #[error("Failed to create manifest directory '{0}'")]
    #[diagnostic(
        code(stevedore::manifest::create_dir_error),
        help("Ensure you have write permissions for the job directory.")
    )]
    CreateManifestDirError(
        /// The directory path that couldn't be created
        PathBuf,
        /// The underlying I/O error
        #[source]
        std::io::Error,
    ),

    /// Failed to serialize a manifest record.
    #[error("Failed to serialize manifest")]
    #[diagnostic(
        code(stevedore::manifest::serialization_error),
        help("Run 'stevedore discard <job-dir>' to reset the job state.")
    )]
    SerializationError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Failed to deserialize a manifest record.
    #[error("Failed to deserialize manifest: {0}")]
    #[diagnostic(
        code(stevedore::manifest::deserialization_error),
        help("The manifest may be corrupted. Run 'stevedore discard <job-dir>' to reset it.")
    )]
    DeserializationError(#[source] rkyv::rancor::BoxedError),

    /// The archive format could not be determined from a file name.
    #[error("Unknown archive format for '{0}'")]
    #[diagnostic(
        code(stevedore::archive::unknown_format),
        help("Use a .zip, .jar, .tar, .tar.gz or .tgz name, or pass the format explicitly.")
    )]
    UnknownArchiveFormat(
        /// The archive name that was inspected
        String,
    ),

    /// Configuration or version mismatch.
    #[error("Configuration error: {0}")]
    #[diagnostic(code(stevedore::config::error))]
    ConfigError(
        /// Description of the configuration error
        String,
    ),
}

impl StevedoreError {
    /// Shorthand for build-step failures raised by job implementations.
    pub fn build(job: impl Into<String>, message: impl std::fmt::Display) -> Self {
        StevedoreError::Build {
            job: job.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StevedoreError::IoError {
            path: path.into(),
            source,
        }
    }
}

/// Type alias for Results in this crate
pub type Result<T> = std::result::Result<T, StevedoreError>;
