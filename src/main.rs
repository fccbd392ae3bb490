//! Main entry point for the metagenomics_taxindex application.
//!
//! Subcommands cover the database side of a metagenomic classification
//! pipeline:
//! 1. `classify`: run the k-mer classifier and rank the reported taxa.
//! 2. `rank`: rank the taxa of an existing classifier report.
//! 3. `extract`: pull the reads of high-scoring taxa into per-taxon files.
//! 4. `index`: map every accession of the database to its lineage.

use anyhow::Result;
use clap::Parser;
use log::debug;

use metagenomics_taxindex::cli::{run_cli, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
    debug!("Parsed arguments: {:?}", cli);

    run_cli(cli)
}
