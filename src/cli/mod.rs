use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod convert;
mod inventory;

/// nmrjson - Bruker NMR Data to Canonical JSON Converter
#[derive(Parser)]
#[command(name = "nmrjson")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the classified experiments of a dataset directory
    Inventory {
        /// Dataset root directory
        #[arg(value_name = "ROOT")]
        root: PathBuf,

        /// Classifier rule table (TOML); builtin rules when omitted
        #[arg(long, value_name = "FILE")]
        rules: Option<PathBuf>,

        /// Emit the inventory as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Build the canonical JSON document for a dataset
    Convert {
        /// Dataset root directory
        #[arg(value_name = "ROOT")]
        root: PathBuf,

        /// Output JSON path (defaults to <root name>_nmr.json)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Selection file mapping directory ids to roles and procnos;
        /// every classified experiment with peaks is selected when omitted
        #[arg(long, value_name = "FILE")]
        selection: Option<PathBuf>,

        /// Opaque molecule reference (molfile path or SMILES), passed through
        #[arg(long, value_name = "REF")]
        molecule: Option<String>,

        /// Classifier rule table (TOML); builtin rules when omitted
        #[arg(long, value_name = "FILE")]
        rules: Option<PathBuf>,
    },
}

impl Cli {
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }
}

pub fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Inventory { root, rules, json } => inventory::run(root, rules, json),
        Commands::Convert {
            root,
            output,
            selection,
            molecule,
            rules,
        } => convert::run(root, output, selection, molecule, rules),
    }
}

/// Load the rule table named on the command line, or the builtin one.
fn load_rules(path: Option<&PathBuf>) -> Result<nmrjson::classify::RuleTable> {
    use anyhow::Context;
    match path {
        Some(path) => nmrjson::classify::RuleTable::from_file(path)
            .with_context(|| format!("Failed to load rule table {}", path.display())),
        None => Ok(nmrjson::classify::RuleTable::builtin()),
    }
}
