//! deconflicter command-line tool.
//!
//! `deconflicter` (or `deconflicter run`) performs one unattended pass and
//! prints nothing to stdout; the run log is the only record. Diagnostics for
//! `run` default to `error` level so a routine skip stays silent. The remaining subcommands
//! are for operators: listing pending conflicts, inspecting the quiescence
//! gate, and generating / validating configuration files.

mod check;
mod scan;
mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use deconflicter_core::engine::DefaultEngine;
use deconflicter_core::DeconflictConfig;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Resolve Syncthing sync-conflict copies by union-merging them into the
/// live file.
#[derive(Parser, Debug)]
#[command(
    name = "deconflicter",
    version,
    about = "Resolve Syncthing sync-conflict copies in a synced folder"
)]
struct Cli {
    /// Path to the TOML configuration file (optional; defaults apply).
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Working-tree root; overrides the config file and DECONFLICTER_ROOT.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Diagnostic log level (trace, debug, info, warn, error). Defaults to
    /// RUST_LOG, else `error` for `run` and `warn` for the other commands.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Write diagnostics to this file instead of stderr.
    #[arg(long, global = true)]
    trace_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one resolution pass (the default).
    Run,

    /// List conflict copies and their merge inputs without changing anything.
    Scan,

    /// Show the state of every quiescence gate.
    Check,

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "deconflicter.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file and the environment it references.
    Validate,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default = default_level(cli.command.as_ref());
    let _guard = match init_tracing(
        cli.log_level.as_deref(),
        default,
        cli.trace_file.as_deref(),
    ) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Some(Commands::Init { output }) => cmd_init(output),
        Some(Commands::Validate) => cmd_validate(&cli),
        Some(Commands::Scan) => {
            // Listing needs no Syncthing credentials.
            let config = resolve_config(&cli)?;
            let engine = DefaultEngine::from_config(config)?;
            scan::run_scan(&engine)
        }
        Some(Commands::Check) => {
            let config = load_config(&cli)?;
            let engine = DefaultEngine::from_config(config)?;
            check::run_check(&engine).await
        }
        None | Some(Commands::Run) => {
            // Missing Syncthing credentials surface in the run log instead.
            let config = resolve_config(&cli)?;
            config
                .validate_for_run()
                .context("invalid configuration")?;
            let engine = DefaultEngine::from_config(config)?;
            let report = engine.run().await;
            tracing::debug!(?report, "pass finished");
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Filter used when neither `--log-level` nor `RUST_LOG` is set.
fn default_level(command: Option<&Commands>) -> &'static str {
    match command {
        None | Some(Commands::Run) => "error",
        Some(_) => "warn",
    }
}

/// Install the diagnostic subscriber. The returned guard must outlive the
/// program's last log statement so buffered file output is flushed.
fn init_tracing(
    level: Option<&str>,
    default: &str,
    trace_file: Option<&Path>,
) -> Result<Option<WorkerGuard>> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new(default)),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
    };

    let Some(path) = trace_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .init();
        return Ok(None);
    };

    let file_name = path
        .file_name()
        .with_context(|| format!("trace file path has no file name: {}", path.display()))?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create trace directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .init();
    Ok(Some(guard))
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

/// Load the config file (if any), overlay the environment and the `--root`
/// flag. No validation.
fn resolve_config(cli: &Cli) -> Result<DeconflictConfig> {
    let mut config = match &cli.config {
        Some(path) => DeconflictConfig::load_from_file(expand_tilde(path))
            .context("failed to load configuration file")?,
        None => DeconflictConfig::default(),
    };
    config
        .apply_env()
        .context("failed to apply environment overrides")?;
    if let Some(root) = &cli.root {
        config.paths.root = root.clone();
    }
    Ok(config)
}

/// [`resolve_config`] followed by validation.
fn load_config(cli: &Cli) -> Result<DeconflictConfig> {
    let config = resolve_config(cli)?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, DeconflictConfig::default_template())
        .context("failed to write config file")?;

    println!("Default configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Set paths.root to the synced folder");
    println!("  2. Export SYNCTHING_API_KEY and SYNCTHING_FOLDER_ID (or set syncthing.enabled = false)");
    println!(
        "  3. Validate with: deconflicter validate --config {}",
        output.display()
    );
    println!(
        "  4. Schedule: deconflicter run --config {}",
        output.display()
    );

    Ok(())
}

fn cmd_validate(cli: &Cli) -> Result<()> {
    match &cli.config {
        Some(path) => println!("Validating configuration: {}", path),
        None => println!("Validating built-in defaults"),
    }
    println!();

    let config = resolve_config(cli)?;
    println!("  {}", style::success("TOML structure is valid"));
    println!("  {}", style::success("Environment overrides applied"));

    config.validate().context("configuration validation failed")?;
    println!("  {}", style::success("All values are valid"));

    let root = &config.paths.root;
    if root.is_dir() {
        println!("  {}", style::success(&format!("Root directory exists: {}", root.display())));
    } else {
        println!(
            "  {}",
            style::warn(&format!("Root directory not found: {}", root.display()))
        );
    }

    let versions = config.versions_path();
    if versions.is_dir() {
        println!(
            "  {}",
            style::success(&format!("Backup store exists: {}", versions.display()))
        );
    } else {
        println!(
            "  {}",
            style::warn(&format!(
                "Backup store not found: {} (conflicts will be skipped)",
                versions.display()
            ))
        );
    }

    println!();
    println!("Configuration is valid.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_run() {
        let cli = Cli::parse_from(["deconflicter"]);
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "deconflicter",
            "scan",
            "--root",
            "/srv/notes",
            "--log-level",
            "debug",
        ]);
        assert!(matches!(cli.command, Some(Commands::Scan)));
        assert_eq!(cli.root, Some(PathBuf::from("/srv/notes")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_root_flag_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dir.path().join("deconflicter.toml");
        std::fs::write(&cfg, "[paths]\nroot = \"/from/file\"\n").unwrap();

        let cli = Cli::parse_from([
            "deconflicter",
            "--config",
            cfg.to_str().unwrap(),
            "--root",
            "/from/flag",
        ]);
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.paths.root, PathBuf::from("/from/flag"));
    }

    #[test]
    fn test_run_defaults_to_error_level() {
        assert_eq!(default_level(None), "error");
        assert_eq!(default_level(Some(&Commands::Run)), "error");
        assert_eq!(default_level(Some(&Commands::Check)), "warn");
        assert_eq!(default_level(Some(&Commands::Scan)), "warn");
    }

    #[test]
    fn test_run_accepts_config_without_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dir.path().join("deconflicter.toml");
        std::fs::write(
            &cfg,
            "[syncthing]\napi_key_env = \"DECONFLICTER_TEST_UNSET_KEY\"\n",
        )
        .unwrap();
        let cli = Cli::parse_from(["deconflicter", "--config", cfg.to_str().unwrap()]);

        let mut config = resolve_config(&cli).unwrap();
        config.syncthing.folder_id.clear();
        assert!(config.syncthing.api_key.is_none());
        assert!(config.validate().is_err());
        assert!(config.validate_for_run().is_ok());
    }

    #[test]
    fn test_expand_tilde_plain_path() {
        assert_eq!(expand_tilde("/etc/x.toml"), PathBuf::from("/etc/x.toml"));
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("deconflicter.toml");
        cmd_init(&out).unwrap();
        let written = std::fs::read_to_string(&out).unwrap();
        assert!(written.contains("[syncthing]"));
        assert!(cmd_init(&out).is_err());
    }
}
