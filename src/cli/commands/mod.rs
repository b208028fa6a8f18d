//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod catalog;
pub mod completions;
pub mod play;
pub mod version;

use tokio_util::sync::CancellationToken;

use crate::cli::args::{CatalogSubcommand, Cli, Commands};
use crate::error::ScamDrillError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// `cancel` is triggered by the first SIGINT/SIGTERM; long-running commands
/// wind down when it fires.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli, cancel: CancellationToken) -> Result<(), ScamDrillError> {
    match cli.command {
        Commands::Play(args) => play::run(&args, cancel).await,
        Commands::Catalog(cmd) => match cmd.subcommand {
            CatalogSubcommand::List(args) => catalog::list(&args),
            CatalogSubcommand::Validate(args) => catalog::validate(&args),
        },
        Commands::Completions(args) => {
            completions::run(&args);
            Ok(())
        }
        Commands::Version(args) => {
            version::run(&args);
            Ok(())
        }
    }
}
