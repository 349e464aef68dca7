mod cache;
mod cli;
mod commands;
mod common;
mod context;
mod enrich;
mod extract;
mod fetch;
mod harvest;
mod pool;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use commands::{run_abstracts, run_citations, run_pipeline};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Citations(args) => {
            run_citations(args)?;
        }
        Commands::Abstracts(args) => {
            run_abstracts(args)?;
        }
        Commands::Run(args) => {
            run_pipeline(args)?;
        }
    }

    Ok(())
}
