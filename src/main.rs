//! # nmrjson CLI
//!
//! Command-line front end for the extraction pipeline.
//!
//! ```bash
//! # List the experiments of a dataset
//! nmrjson inventory /data/sample
//!
//! # Build the canonical document from a selection file
//! nmrjson convert /data/sample --selection picks.json -o sample.json
//! ```

use anyhow::Result;
use clap::Parser;

mod cli;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli::init_logging(cli.verbosity());
    cli::dispatch(cli)
}
