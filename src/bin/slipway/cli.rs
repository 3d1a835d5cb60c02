//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// Slipway - a build-matrix runner for Python distribution packages
#[derive(Parser)]
#[command(name = "slipway")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a Slipway package in an existing directory
    Init(InitArgs),

    /// Build the package across the runtime axis
    Build(BuildArgs),

    /// List the runtime axis and build status
    Runtimes,

    /// Print the provisioned environment for a built runtime
    Env(EnvArgs),

    /// Remove build artifacts
    Clean(CleanArgs),

    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Package name (defaults to directory name)
    #[arg(long)]
    pub name: Option<String>,

    /// Directory to initialize (defaults to current directory)
    pub path: Option<PathBuf>,
}

#[derive(Args)]
pub struct BuildArgs {
    /// Build a single axis entry (id, tag, or major.minor)
    #[arg(long)]
    pub runtime: Option<String>,

    /// Keep building remaining runtimes after a failure
    #[arg(long)]
    pub keep_going: bool,

    /// Number of runtimes to build in parallel
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Output format for progress events
    #[arg(long, value_enum, default_value_t = MessageFormat::Human)]
    pub message_format: MessageFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MessageFormat {
    /// Progress bar and status lines on stderr
    Human,

    /// One JSON event per line on stdout
    Json,
}

#[derive(Args)]
pub struct EnvArgs {
    /// Axis entry to provision (defaults to the designated latest)
    #[arg(long)]
    pub runtime: Option<String>,

    /// Rendering of the environment descriptor
    #[arg(long, value_enum, default_value_t = EnvFormat::Sh)]
    pub format: EnvFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EnvFormat {
    /// Eval-able shell exports
    Sh,

    /// The raw descriptor as JSON
    Json,
}

#[derive(Args)]
pub struct CleanArgs {
    /// Also remove the dist/ directory
    #[arg(long)]
    pub dist: bool,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
