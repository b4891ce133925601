use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod backend;
mod cli;
mod compiler;
mod config;
mod error;
mod guidance;
mod oracle;
mod output;
mod pipeline;
mod plan;
mod toolchain;
mod usage;
mod verify;
mod workspace;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing - only show logs with --verbose
    let filter = if cli.verbose {
        EnvFilter::new("appforge=debug")
    } else {
        EnvFilter::new("appforge=warn")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Build(args) => cli::build::execute(args, config).await,
        Commands::Compile(args) => cli::compile::execute(args, config).await,
        Commands::Verify(args) => cli::verify::execute(args),
        Commands::Usage(args) => cli::usage::execute(args, config),
        Commands::Schema => cli::schema::execute(),
    }
}
