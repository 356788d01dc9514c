//! # IndexSync Console
//!
//! Terminal front end for the sync orchestrator.
//!
//! ## Commands
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  indexsync configure --url <URL> --nonce <TOKEN>   write sync.toml      │
//! │  indexsync sync [--delete]     recover, then start (or auto-resume)     │
//! │  indexsync resume              continue a paused run                    │
//! │  indexsync status              print the executor's view as JSON        │
//! │  indexsync stop                cancel the current run                   │
//! │                                                                         │
//! │  Ctrl-C while a run is attached stops it.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Logging
//! - Set `RUST_LOG=debug` for verbose output
//! - Default: `info,indexsync=debug` (written to stderr)

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use indexsync_agent::{
    AgentConfig, SyncEventEmitter, SyncOrchestrator, SyncOrchestratorBuilder,
    SyncResult,
};
use indexsync_core::{LogEntry, LogStatus, RunState, SyncPhase};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "indexsync",
    version,
    about = "Drive and observe search index synchronization"
)]
struct Cli {
    /// Config file (defaults to the platform config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Configure(ConfigureArgs),
    Sync(SyncArgs),
    Resume,
    Status,
    Stop,
}

#[derive(Args, Debug, Clone)]
struct ConfigureArgs {
    #[arg(long)]
    url: String,

    #[arg(long)]
    nonce: String,
}

#[derive(Args, Debug, Clone)]
struct SyncArgs {
    /// Delete the index and rebuild it from scratch.
    #[arg(long, default_value_t = false)]
    delete: bool,
}

// =============================================================================
// Console Emitter
// =============================================================================

struct ConsoleEmitter;

impl SyncEventEmitter for ConsoleEmitter {
    fn emit_state(&self, state: &RunState) {
        if matches!(state.phase, SyncPhase::Running | SyncPhase::Observing) {
            let progress = state.progress();
            println!(
                "[{}] {}/{} items ({:.0}%)",
                state.phase,
                progress.items_processed,
                progress.items_total,
                progress.ratio() * 100.0
            );
        }
    }

    fn emit_log(&self, entry: &LogEntry) {
        let track = if entry.is_deleting { " (delete)" } else { "" };
        match entry.status {
            LogStatus::Error | LogStatus::Warning => {
                eprintln!("{}{}: {}", entry.status, track, entry.message)
            }
            _ => println!("{}{}: {}", entry.status, track, entry.message),
        }
    }
}

// =============================================================================
// Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "Command failed");
            eprintln!("{}", err.user_message());
            ExitCode::FAILURE
        }
    }
}

/// Initializes the tracing subscriber.
///
/// ## Environment
/// - `RUST_LOG`: overrides the default filter
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,indexsync=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> SyncResult<ExitCode> {
    if let Commands::Configure(args) = &cli.command {
        return configure(cli.config.clone(), args);
    }

    let config = AgentConfig::load(cli.config.clone())?;
    let auto_resume = config.sync.auto_resume;
    let sync = SyncOrchestratorBuilder::new(config)
        .with_emitter(Arc::new(ConsoleEmitter))
        .build()?;

    match cli.command {
        Commands::Configure(_) => Ok(ExitCode::SUCCESS),
        Commands::Sync(args) => {
            let handle = match sync.recover().await? {
                Some(handle) => handle,
                None => match sync.state().await.phase {
                    SyncPhase::Paused if auto_resume => sync.resume().await?,
                    SyncPhase::Paused => {
                        eprintln!(
                            "An unfinished sync is paused. Run `indexsync resume` to continue \
                             it or `indexsync stop` to cancel it."
                        );
                        return Ok(ExitCode::FAILURE);
                    }
                    _ => sync.start(args.delete).await?,
                },
            };
            attach(&sync, handle).await
        }
        Commands::Resume => {
            let handle = match sync.recover().await? {
                Some(handle) => handle,
                None => sync.resume().await?,
            };
            attach(&sync, handle).await
        }
        Commands::Status => {
            if let Some(handle) = sync.recover().await? {
                handle.abort();
            }
            let state = sync.state().await;
            println!("{}", serde_json::to_string_pretty(&state)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Stop => {
            let handle = sync.recover().await?;
            if sync.state().await.phase.is_active() {
                sync.stop().await?;
            } else {
                println!("No sync in progress.");
            }
            if let Some(handle) = handle {
                let _ = handle.await;
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn configure(path: Option<PathBuf>, args: &ConfigureArgs) -> SyncResult<ExitCode> {
    let mut config = AgentConfig::load_or_default(path.clone());
    config.endpoint.url = Some(args.url.clone());
    config.endpoint.nonce = args.nonce.clone();
    config.validate()?;
    config.save(path)?;
    println!("Configuration saved.");
    Ok(ExitCode::SUCCESS)
}

/// Waits for a run's loop, stopping the run on Ctrl-C.
async fn attach(sync: &SyncOrchestrator, mut handle: JoinHandle<()>) -> SyncResult<ExitCode> {
    tokio::select! {
        _ = &mut handle => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, stopping sync");
            if let Err(err) = sync.stop().await {
                debug!(error = %err, "Run ended before it could be stopped");
            }
            let _ = handle.await;
        }
    }

    let state = sync.state().await;
    Ok(match state.phase {
        SyncPhase::Complete if !state.last_sync_failed => ExitCode::SUCCESS,
        SyncPhase::Paused | SyncPhase::Cancelled => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}
