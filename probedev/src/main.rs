mod application;
mod presentation {
    pub mod cli;
}

use clap::Parser;
use probe_core::error::Result;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = presentation::cli::Cli::parse();
    application::run(cli)
}
