//! Quiescence gate report.

use anyhow::Result;

use deconflicter_core::engine::DefaultEngine;
use deconflicter_core::quiescence::syncthing::IDLE_STATE;

use super::style;

/// Evaluate every gate and print its state. Writes nothing to the run log.
pub async fn run_check(engine: &DefaultEngine) -> Result<()> {
    println!();
    println!("{}", style::header("deconflicter Check"));
    println!("{}", "═".repeat(18));
    println!();

    let config = engine.config();
    println!(
        "  {}",
        style::dim(&format!("Root              {}", engine.root().display()))
    );
    println!(
        "  {}",
        style::dim(&format!("Backup Store      {}", config.versions_path().display()))
    );
    println!();

    let report = engine.inspect().await;

    // 1. Editor
    match &report.editor {
        Some((name, true)) => {
            println!("  {}", style::error(&format!("Editor            {} is running", name)))
        }
        Some((name, false)) => {
            println!("  {}", style::success(&format!("Editor            {} not running", name)))
        }
        None => println!("  {}", style::disabled("Editor            Check disabled")),
    }

    // 2. Syncthing
    match &report.sync_state {
        Some(Ok(state)) if state == IDLE_STATE => {
            println!("  {}", style::success("Syncthing         idle"))
        }
        Some(Ok(state)) => {
            println!("  {}", style::error(&format!("Syncthing         {}", state)))
        }
        Some(Err(e)) => {
            println!("  {}", style::error(&format!("Syncthing         {}", e)))
        }
        None => println!("  {}", style::disabled("Syncthing         Check disabled")),
    }

    // 3. Idle window
    let window = config.quiescence.idle_window_secs;
    match &report.recent_change {
        Some(path) => println!(
            "  {}",
            style::warn(&format!(
                "Idle Window       {} changed in the last {}s",
                path.display(),
                window
            ))
        ),
        None => println!(
            "  {}",
            style::success(&format!("Idle Window       No changes in the last {}s", window))
        ),
    }

    println!();
    if report.is_quiet() {
        println!(
            "  {} A pass would proceed now.",
            console::style("✓").green().bold()
        );
    } else {
        println!(
            "  {} A pass would be skipped now.",
            console::style("!").yellow().bold()
        );
    }
    println!();

    Ok(())
}
