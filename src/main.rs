//! Content-sync agent for unattended playback devices.
//!
//! Keeps the local media library and playlist in sync with a remote object
//! store and drives continuous fullscreen playback. Two entry points:
//! `run` (continuous service: sync poll loop + playback loop) and `update`
//! (one manual sync cycle, then exit).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use bridge_desktop::{ReqwestHttpClient, VlcRenderer};
use core_library::LibraryStore;
use core_playback::{PlaybackLoop, PlaybackOptions};
use core_runtime::config::AgentConfig;
use core_runtime::events::{EventBus, EventSeverity, RecvError};
use core_runtime::logging::{init_logging, LoggingConfig};
use core_sync::{CycleRunner, EngineConfig, SyncEngine, UpdateTrigger};
use provider_s3::S3Connector;

#[derive(Parser)]
#[command(
    name = "sync-agent",
    version,
    about = "Field content-sync agent for unattended playback devices"
)]
struct Cli {
    /// Path to the provisioning config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Continuous service: sync poll loop plus playback loop (default)
    Run,
    /// Run one sync cycle now, then exit
    Update,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let mut logging = LoggingConfig::default();
    if let Ok(filter) = std::env::var("RUST_LOG") {
        logging = logging.with_filter(filter);
    }
    if let Some(log_file) = &config.paths.log_file {
        logging = logging.with_log_file(log_file);
    }
    init_logging(logging)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_service(config).await,
        Commands::Update => run_update(config).await,
    }
}

fn load_config(cli: &Cli) -> Result<AgentConfig> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => AgentConfig::default_path()
            .context("no config directory available; pass --config explicitly")?,
    };
    Ok(AgentConfig::load(&path)?)
}

fn build_engine(
    config: &AgentConfig,
    events: EventBus,
) -> Result<(SyncEngine, Arc<LibraryStore>)> {
    let http_client = Arc::new(ReqwestHttpClient::new()?);
    let store = Arc::new(S3Connector::new(
        http_client,
        config.store.endpoint.clone(),
        config.store.bucket.clone(),
        config.store.access_token.clone(),
    ));
    let library = Arc::new(LibraryStore::open(&config.paths.media_root)?);
    let engine = SyncEngine::new(
        EngineConfig::from_agent(config),
        store,
        library.clone(),
        events,
    );
    Ok((engine, library))
}

/// One manual cycle; the exit code reflects the outcome.
async fn run_update(config: AgentConfig) -> Result<()> {
    let events = EventBus::new(128);
    let (mut engine, _library) = build_engine(&config, events)?;

    let result = engine.run_cycle(&CancellationToken::new()).await;
    match result.error {
        None => {
            info!(changed = result.changed, "Update complete");
            Ok(())
        }
        Some(e) => bail!("update failed: {}", e),
    }
}

/// Continuous service mode: the two loops share nothing but the published
/// playlist and the library store.
async fn run_service(config: AgentConfig) -> Result<()> {
    info!(
        device = %config.device.prefix(),
        interval_secs = config.sync.poll_interval_secs,
        "Starting sync agent"
    );

    let events = EventBus::new(128);
    let (engine, library) = build_engine(&config, events.clone())?;
    let playlist_rx = engine.subscribe_playlist();

    let cancel = CancellationToken::new();
    let (runner, trigger) = CycleRunner::new(engine, config.sync.poll_interval(), events.clone());
    let playback = PlaybackLoop::new(
        Arc::new(VlcRenderer::new()),
        library,
        playlist_rx,
        events.clone(),
        PlaybackOptions {
            failure_rollback_threshold: config.playback.failure_rollback_threshold,
        },
    );

    spawn_manual_trigger_listener(trigger);
    spawn_event_logger(&events);

    let mut sync_task = tokio::spawn(runner.run(cancel.clone()));
    let mut playback_task = tokio::spawn(playback.run(cancel.clone()));

    let exit: Result<()> = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
            Ok(())
        }
        result = &mut sync_task => match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(anyhow::Error::from(e).context("sync runner failed")),
            Err(e) => Err(anyhow::anyhow!("sync task panicked: {}", e)),
        },
        result = &mut playback_task => match result {
            Ok(()) => Err(anyhow::anyhow!("playback loop exited unexpectedly")),
            Err(e) => Err(anyhow::anyhow!("playback task panicked: {}", e)),
        },
    };

    // Cancellation is safe at any point: commits are atomic and staging
    // never touches the live generation.
    cancel.cancel();
    if !sync_task.is_finished() {
        let _ = sync_task.await;
    }
    if !playback_task.is_finished() {
        let _ = playback_task.await;
    }

    info!("Sync agent stopped");
    exit
}

/// Mirror every bus event into the log at its severity. This is the
/// operator-facing record of cycle outcomes and playback errors.
fn spawn_event_logger(events: &EventBus) {
    let mut stream = events.subscribe();
    tokio::spawn(async move {
        loop {
            match stream.recv().await {
                Ok(event) => match event.severity() {
                    EventSeverity::Error => {
                        tracing::error!(target: "sync_agent::events", ?event, "{}", event.description())
                    }
                    EventSeverity::Warning => {
                        tracing::warn!(target: "sync_agent::events", ?event, "{}", event.description())
                    }
                    EventSeverity::Info => {
                        tracing::info!(target: "sync_agent::events", ?event, "{}", event.description())
                    }
                    EventSeverity::Debug => {
                        tracing::debug!(target: "sync_agent::events", ?event, "{}", event.description())
                    }
                },
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Event stream lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// SIGHUP requests an immediate sync cycle; requests coalesce while one
/// is already queued.
#[cfg(unix)]
fn spawn_manual_trigger_listener(trigger: UpdateTrigger) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hup = match signal(SignalKind::hangup()) {
            Ok(hup) => hup,
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGHUP; manual triggers disabled");
                return;
            }
        };
        while hup.recv().await.is_some() {
            if trigger.request() {
                info!("Manual update triggered");
            } else {
                info!("Manual update already queued");
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_manual_trigger_listener(_trigger: UpdateTrigger) {}
