//! # stevedore CLI
//!
//! Maintenance commands for stevedore job state.
//!
//! ## Commands
//!
//! - **inspect**: Show the stored slots and result of a job directory
//! - **discard**: Delete a job manifest, forcing a rebuild
//! - **fingerprint**: Print hash, size and mtime of files
//! - **expand**: Expand a path (optionally filtered) into products
//! - **sync**: Mirror a path into a directory with smart copy
//!
//! ## Environment Variables
//!
//! - `STEVEDORE_BASE_DIR`: Directory relative paths resolve against
//! - `STEVEDORE_VERBOSE`: Enable verbose output
//! - `STEVEDORE_QUIET`: Silence all output except errors and results

use std::io::IsTerminal;

use stevedore::cli::Cli;

fn main() -> miette::Result<()> {
    miette::set_panic_hook();

    if std::io::stderr().is_terminal() {
        miette::set_hook(Box::new(|_| {
            Box::new(
                miette::GraphicalReportHandler::new()
                    .with_theme(miette::GraphicalTheme::unicode_nocolor())
                    .with_context_lines(3),
            )
        }))?;
    } else {
        // Plain output for CI logs and pipes.
        miette::set_hook(Box::new(|_| {
            Box::new(
                miette::GraphicalReportHandler::new()
                    .with_theme(miette::GraphicalTheme::none())
                    .with_context_lines(0),
            )
        }))?;
    }

    let cli = Cli::parse_args();
    stevedore::commands::execute(&cli).map_err(Into::into)
}
