//! nimescreen CLI: literature screening for NIME proceedings.
//!
//! Downloads a year's papers, maps them to metadata IDs, filters them by
//! instrument keywords, and ranks the survivors for manual review.

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
