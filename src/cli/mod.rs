pub mod build;
pub mod compile;
pub mod schema;
pub mod usage;
pub mod verify;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "appforge")]
#[command(
    author,
    version,
    about = "Plan, scaffold and generate native Apple-platform apps with Claude Code"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose/debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file (defaults to ./appforge.yaml when present)
    #[arg(short, long, global = true, env = "APPFORGE_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a new app from a description
    Build(BuildArgs),

    /// Recompile project.yml from project_config.json
    Compile(CompileArgs),

    /// Recompute the completion report of a generated project
    Verify(ProjectArgs),

    /// Show accumulated cost and token usage
    Usage(UsageArgs),

    /// Print JSON Schema for config validation
    Schema,
}

#[derive(Parser, Clone)]
pub struct BuildArgs {
    /// What to build
    #[arg(required = true, num_args = 1..)]
    pub prompt: Vec<String>,

    /// Reference image to attach (repeatable)
    #[arg(long = "image")]
    pub images: Vec<PathBuf>,

    /// Override output directory
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Override the generate/verify pass cap
    #[arg(long)]
    pub max_passes: Option<u32>,

    /// Override the oracle model
    #[arg(long)]
    pub model: Option<String>,

    /// Plan only and print the compiled target graph
    #[arg(long)]
    pub dry_run: bool,

    /// Print the result record as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Clone)]
pub struct ProjectArgs {
    /// Generated project directory
    #[arg(short, long, default_value = ".")]
    pub project: PathBuf,
}

#[derive(Parser, Clone)]
pub struct CompileArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Also regenerate the Xcode project
    #[arg(long)]
    pub generate: bool,
}

#[derive(Parser, Clone)]
pub struct UsageArgs {
    /// Ledger file to read instead of the configured one
    #[arg(long)]
    pub ledger: Option<PathBuf>,

    /// Print the raw ledger JSON
    #[arg(long)]
    pub json: bool,
}
