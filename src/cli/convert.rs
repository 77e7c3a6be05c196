use anyhow::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;

use nmrjson::convert::{build_document, UserSelection};
use nmrjson::reader::Inventory;

/// Build and write the canonical JSON document for a dataset
pub fn run(
    root: PathBuf,
    output: Option<PathBuf>,
    selection: Option<PathBuf>,
    molecule: Option<String>,
    rules: Option<PathBuf>,
) -> Result<()> {
    if !root.is_dir() {
        anyhow::bail!("Dataset root is not a directory: {}", root.display());
    }

    let rules = super::load_rules(rules.as_ref())?;
    let inventory = Inventory::read(&root, &rules)
        .with_context(|| format!("Failed to read dataset {}", root.display()))?;

    let selection = match selection {
        Some(path) => {
            let json = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read selection file {}", path.display()))?;
            UserSelection::from_json_str(&json)
                .with_context(|| format!("Invalid selection file {}", path.display()))?
        }
        None => {
            info!("no selection file given, auto-selecting classified experiments with peaks");
            UserSelection::auto_select(&inventory)
        }
    };

    if selection.0.is_empty() {
        anyhow::bail!("Nothing to convert: no experiment with a peak list was selected");
    }

    let document = build_document(&inventory, &selection, molecule.as_deref())
        .context("Selection cannot produce a sound document")?;

    let output = output.unwrap_or_else(|| {
        let stem = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "dataset".to_string());
        PathBuf::from(format!("{stem}_nmr.json"))
    });

    fs::write(&output, document.to_json_pretty()?)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Wrote {} role(s) to {}",
        document.experiments.len(),
        output.display()
    );
    for (label, sources) in &document.manifest.roles {
        println!("  {:<14} from experiment(s) {}", label, sources.join(", "));
    }

    Ok(())
}
