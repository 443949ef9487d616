mod analysis;
mod cli;
mod config;
mod error;
mod extractor;
mod output;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting pipelens - Jenkins Pipeline Migration Analysis");
    cli.execute().await?;

    Ok(())
}
