use anyhow::{Context, Result};
use std::path::PathBuf;

use nmrjson::reader::Inventory;

/// List the classified experiments of a dataset directory
pub fn run(root: PathBuf, rules: Option<PathBuf>, json: bool) -> Result<()> {
    if !root.is_dir() {
        anyhow::bail!("Dataset root is not a directory: {}", root.display());
    }

    let rules = super::load_rules(rules.as_ref())?;
    let inventory = Inventory::read(&root, &rules)
        .with_context(|| format!("Failed to read dataset {}", root.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&inventory.summaries())?);
        return Ok(());
    }

    println!("Dataset: {}", inventory.root.display());
    println!();
    println!(
        "{:<6} {:<14} {:>4} {:<12} {:<28} {:<6} {}",
        "expt", "type", "dim", "nuclei", "pulse program", "peaks", "procnos"
    );
    for summary in inventory.summaries() {
        println!(
            "{:<6} {:<14} {:>4} {:<12} {:<28} {:<6} {}",
            summary.id,
            summary.label,
            summary.dimensions,
            summary.nuclei.join(","),
            summary.pulse_program,
            if summary.has_peaks { "yes" } else { "no" },
            summary.procnos.join(",")
        );
        if summary.skipped_peak_rows > 0 || summary.skipped_integral_rows > 0 {
            println!(
                "       ({} malformed peak rows, {} malformed integral rows skipped)",
                summary.skipped_peak_rows, summary.skipped_integral_rows
            );
        }
    }

    let selectable = inventory.selectable().count();
    println!();
    println!(
        "{} experiment(s), {} selectable (peak list present)",
        inventory.experiments.len(),
        selectable
    );

    Ok(())
}
