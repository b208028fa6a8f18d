//! CLI argument definitions
//!
//! All Clap derive structs for `scamdrill` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

// ============================================================================
// Root CLI
// ============================================================================

/// Scam and phishing recognition drills.
#[derive(Parser, Debug)]
#[command(name = "scamdrill", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "SCAMDRILL_COLOR")]
    pub color: ColorChoice,
}

// ============================================================================
// Top-Level Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Play an interactive session in the terminal.
    Play(PlayArgs),

    /// Inspect and validate content catalogs.
    Catalog(CatalogCommand),

    /// Generate shell completion scripts.
    Completions(CompletionsArgs),

    /// Display version information.
    Version(VersionArgs),
}

// ============================================================================
// Play Command
// ============================================================================

/// Arguments for `play`.
#[derive(Args, Debug)]
pub struct PlayArgs {
    /// Catalog file to play with instead of the built-in content.
    #[arg(long, env = "SCAMDRILL_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Rules file overriding the default balance.
    #[arg(long, env = "SCAMDRILL_RULES")]
    pub rules: Option<PathBuf>,

    /// Player display name.
    #[arg(long, default_value = "player", env = "SCAMDRILL_PLAYER")]
    pub player: String,

    /// Player identifier (defaults to the display name).
    #[arg(long)]
    pub player_id: Option<String>,

    /// Shop items the player owns (repeatable).
    #[arg(long = "item", value_name = "ID")]
    pub items: Vec<String>,

    /// Seed for reproducible content picks.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write JSONL game events to this file (`-` for stderr).
    #[arg(long, env = "SCAMDRILL_EVENTS_FILE")]
    pub events_file: Option<PathBuf>,

    /// Expose Prometheus metrics on this port.
    #[arg(long, env = "SCAMDRILL_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

// ============================================================================
// Catalog Command
// ============================================================================

/// Catalog commands.
#[derive(Args, Debug)]
pub struct CatalogCommand {
    /// Catalog subcommand.
    #[command(subcommand)]
    pub subcommand: CatalogSubcommand,
}

/// Catalog subcommands.
#[derive(Subcommand, Debug)]
pub enum CatalogSubcommand {
    /// List the content of a catalog.
    List(CatalogListArgs),

    /// Validate catalog files without playing.
    Validate(CatalogValidateArgs),
}

/// Arguments for `catalog list`.
#[derive(Args, Debug)]
pub struct CatalogListArgs {
    /// Catalog file to list (defaults to the built-in catalog).
    #[arg(long, env = "SCAMDRILL_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Which list to show.
    #[arg(long, default_value = "scenarios")]
    pub kind: ContentKind,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `catalog validate`.
#[derive(Args, Debug)]
pub struct CatalogValidateArgs {
    /// Catalog files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Treat warnings as errors.
    #[arg(long)]
    pub strict: bool,
}

// ============================================================================
// Utility Commands
// ============================================================================

/// Arguments for completion script generation.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell for completion script.
    pub shell: Shell,
}

/// Arguments for version display.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for listing and validation commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

/// Catalog list selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ContentKind {
    /// Decision scenarios.
    #[default]
    Scenarios,
    /// Reflex mini-game commands.
    Reflex,
}

/// Shell type for completion generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    /// Bash shell.
    Bash,
    /// Zsh shell.
    Zsh,
    /// Fish shell.
    Fish,
    /// `PowerShell`.
    #[value(name = "powershell")]
    PowerShell,
    /// Elvish shell.
    Elvish,
}

// ============================================================================
// Tests
// ============================================================================
