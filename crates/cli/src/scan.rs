//! Dry-run listing of pending conflict copies.

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};

use deconflicter_core::engine::DefaultEngine;

use super::style;

/// List every conflict copy with the original and snapshot a pass would use.
pub fn run_scan(engine: &DefaultEngine) -> Result<()> {
    let artifacts: Vec<_> = engine.scanner().find_conflicts().collect();

    if artifacts.is_empty() {
        println!("No conflicts found under {}.", engine.root().display());
        return Ok(());
    }

    println!();
    println!("{}", style::header("Pending Conflicts"));
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Conflict", "Original", "Backup", "Status"]);

    let mut ready = 0usize;
    for artifact in &artifacts {
        let original = artifact.original_relative_path();
        let has_original = engine.root().join(&original).is_file();
        let backup = engine
            .resolver()
            .find_backup(&artifact.base_name, &artifact.extension);

        let backup_cell = match &backup {
            Some(path) => {
                let shown = path.strip_prefix(engine.resolver().store()).unwrap_or(path);
                Cell::new(shown.display())
            }
            None => Cell::new("—"),
        };

        let status_cell = match (has_original, backup.is_some()) {
            (true, true) => {
                ready += 1;
                Cell::new("✓ ready").fg(Color::Green)
            }
            (false, _) => Cell::new("✗ original missing").fg(Color::Red),
            (true, false) => Cell::new("⧗ no backup").fg(Color::Yellow),
        };

        table.add_row(vec![
            Cell::new(&artifact.relative_path),
            Cell::new(&original),
            backup_cell,
            status_cell,
        ]);
    }

    println!("{}", table);
    println!();
    println!(
        "  {}",
        style::dim(&format!(
            "{} of {} conflict(s) can be merged on the next pass",
            ready,
            artifacts.len()
        ))
    );
    println!();

    Ok(())
}
