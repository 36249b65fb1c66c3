//! `parlor import`

use std::path::Path;

use miette::{Result, miette};
use owo_colors::OwoColorize;
use parlor_cards::{CardImporter, ImportReport};

pub fn run(path: &Path, out: Option<&Path>) -> Result<()> {
    let importer = match out {
        Some(dir) => CardImporter::new().with_output_dir(dir),
        None => CardImporter::new(),
    };
    let report = importer.import_path(path)?;
    print_report(&report);

    if report.is_clean() {
        Ok(())
    } else {
        Err(miette!("{} card(s) could not be imported", report.failed.len()))
    }
}

fn print_report(report: &ImportReport) {
    for imported in &report.imported {
        println!(
            "{} {} -> {}",
            "✓".green(),
            imported.card.char_name.bright_cyan(),
            imported.json_path.display()
        );
    }
    for (path, card) in &report.loaded {
        println!(
            "{} {} ({})",
            "·".dimmed(),
            card.char_name.bright_cyan(),
            path.display()
        );
    }
    for (path, error) in &report.failed {
        println!("{} {}: {}", "✗".red(), path.display(), error);
    }
    if !report.skipped.is_empty() {
        println!(
            "{}",
            format!("Skipped {} unsupported file(s)", report.skipped.len()).dimmed()
        );
    }
}
