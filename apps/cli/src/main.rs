//! DocGate CLI: crawl documentation and keep only what matters for an issue.
//!
//! Discovers a site's pages via sitemap or DOM crawl, drops obvious
//! non-documentation, and asks an AI provider to rank the rest.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
