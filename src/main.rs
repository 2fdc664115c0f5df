/*============================================================
  Synavera Project: ModWatch
  Module: modwatch_core::main
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Entry point for ModWatch. Reads the installed-mod export,
    runs one update check cycle, and emits a structured
    manifest describing available updates.

  Security / Safety Notes:
    Operates within user privileges. Reads mod artifacts and
    performs HTTPS requests only.

  Dependencies:
    clap for CLI parsing, chrono for timestamps, tokio runtime.

  Operational Scope:
    Invoked by launchers or operators to refresh the update
    manifest outside the game client.

  Revision History:
    2025-03-15 COD  Authored ModWatch runtime.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Result-first error handling with deterministic exits
    - Structured logging following Synavera cadence
    - Configurable execution via CLI and config file
============================================================*/

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{ArgAction, Parser};

use modwatch_core::config::ModwatchConfig;
use modwatch_core::coordinator::{run_cycle, CycleContext};
use modwatch_core::error::{ModwatchError, Result};
use modwatch_core::http::build_async_client;
use modwatch_core::inventory::load_inventory;
use modwatch_core::logger::Logger;
use modwatch_core::manifest::{build_manifest, write_manifest, ManifestDocument};
use modwatch_core::reconcile::Reconciler;
use modwatch_core::registry::{DeprecationFlag, RegistryClient};
use modwatch_core::UpdateChannel;

/// Command-line arguments for ModWatch.
#[derive(Debug, Parser)]
#[command(
    name = "ModWatch",
    version,
    author = "Synavera Systems",
    about = "Update detection for installed game mods"
)]
struct Cli {
    /// Installed-mod export (JSON) produced by the mod loader.
    #[arg(long, value_name = "PATH")]
    inventory: PathBuf,
    /// Override configuration file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Override manifest output path.
    #[arg(long, value_name = "PATH")]
    manifest: Option<PathBuf>,
    /// Explicit log file path.
    #[arg(long, value_name = "PATH")]
    log: Option<PathBuf>,
    /// Override the preferred release channel.
    #[arg(long, value_enum, value_name = "CHANNEL")]
    channel: Option<ChannelArg>,
    /// Do not write manifest; emit summary only.
    #[arg(long, action = ArgAction::SetTrue)]
    dry_run: bool,
    /// Enable verbose logging to stderr.
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum ChannelArg {
    Release,
    Beta,
    Alpha,
}

impl From<ChannelArg> for UpdateChannel {
    fn from(arg: ChannelArg) -> Self {
        match arg {
            ChannelArg::Release => UpdateChannel::Release,
            ChannelArg::Beta => UpdateChannel::Beta,
            ChannelArg::Alpha => UpdateChannel::Alpha,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("[ModWatch] Failed to start runtime: {err}");
            return ModwatchError::Runtime(err.to_string()).exit_code();
        }
    };

    let code = match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("[ModWatch] {}", err);
            err.exit_code()
        }
    };
    // Abandoned checkers must not keep the process alive.
    runtime.shutdown_timeout(Duration::from_secs(1));
    code
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = ModwatchConfig::load_from_optional_path(cli.config.as_deref())?;
    if let Some(channel) = cli.channel {
        config.general.channel = channel.into();
    }

    let session_stamp = Utc::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    let log_path = cli
        .log
        .clone()
        .or_else(|| Some(config.log_dir().join(format!("cycle_{session_stamp}.log"))));
    let logger = Arc::new(Logger::new(log_path, cli.verbose)?);
    logger.info("INIT", "ModWatch awakening.");

    if !config.general.update_checker {
        logger.info("DISABLED", "Update checker disabled in configuration; exiting");
        logger.finalize()?;
        return Ok(ExitCode::SUCCESS);
    }

    let mods = load_inventory(&cli.inventory, &config, &logger)?;
    logger.info("MODS", format!("Loaded {} installed mods", mods.len()));
    if mods.is_empty() {
        logger.warn("EMPTY", "Inventory lists no mods; exiting");
        logger.finalize()?;
        return Ok(ExitCode::SUCCESS);
    }

    let platform = config.platform();
    let deprecation = Arc::new(DeprecationFlag::new());
    let client = build_async_client(
        &platform,
        config.registry_connect_timeout(),
        config.registry_timeout(),
    )?;
    let ctx = Arc::new(CycleContext {
        registry: RegistryClient::new(
            client,
            &config.registry.api_url,
            Arc::clone(&deprecation),
            Arc::clone(&logger),
        ),
        reconciler: Reconciler::new(config.general.strategy, config.registry.site_url.clone()),
        platform,
        preference: config.general.channel,
        deprecation,
        logger: Arc::clone(&logger),
        checker_timeout: Some(config.checker_timeout()),
    });

    let report = run_cycle(ctx, mods.clone())
        .await
        .map_err(|err| ModwatchError::Runtime(format!("Update cycle aborted: {err}")))?;
    let document = build_manifest(&mods, &report, config.general.channel);

    if cli.dry_run {
        print_summary(&document);
    } else {
        let manifest_path = cli.manifest.clone().unwrap_or_else(|| config.manifest_path());
        write_manifest(&document, &manifest_path)?;
        logger.info(
            "MANIFEST",
            format!("Manifest written to {}", manifest_path.display()),
        );
    }

    logger.info(
        "SUMMARY",
        format!(
            "mods={} updates={}",
            document.metadata.total_mods, document.metadata.updates_available
        ),
    );
    logger.info("COMPLETE", "Watch complete.");
    logger.finalize()?;

    Ok(ExitCode::SUCCESS)
}

fn print_summary(document: &ManifestDocument) {
    println!(
        "→ Manifest dry-run. Mods={} Updates={} (Custom={} Registry={} Skipped={})",
        document.metadata.total_mods,
        document.metadata.updates_available,
        document.metadata.custom_checked,
        document.metadata.registry_checked,
        document.metadata.skipped
    );
    for (id, entry) in &document.mods {
        if entry.update_available {
            println!(
                "  {id} {} -> {}",
                entry.installed_version,
                entry.new_version.as_deref().unwrap_or("?")
            );
        }
    }
}
