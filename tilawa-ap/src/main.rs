//! Tilawa Audio Player (tilawa-ap) - Main entry point
//!
//! Verse audio playback service: loads bootstrap configuration, opens the
//! settings database, starts the playback engine and serves the control API.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tilawa_ap::api::{self, AppContext};
use tilawa_ap::config::TomlConfig;
use tilawa_ap::db;
use tilawa_ap::playback::audio_session;
use tilawa_ap::playback::simulated::SimulatedPlayerFactory;
use tilawa_ap::playback::VersePlaybackEngine;
use tilawa_common::events::EventBus;
use tilawa_common::SurahContext;

/// Command-line arguments for tilawa-ap
#[derive(Parser, Debug)]
#[command(name = "tilawa-ap")]
#[command(about = "Verse audio player for Tilawa")]
#[command(version)]
struct Args {
    /// Bootstrap TOML file (default: TILAWA_CONFIG, then ~/.config/tilawa/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "TILAWA_AP_PORT")]
    port: Option<u16>,

    /// SQLite database file (overrides the config file)
    #[arg(short, long, env = "TILAWA_DATABASE")]
    database: Option<PathBuf>,

    /// Surah to open at startup (default: the last one read)
    #[arg(short, long)]
    surah: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Initialize tracing; RUST_LOG wins over the config file
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Tilawa Audio Player v{} ({} {}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP")
    );

    let port = args.port.unwrap_or(toml_config.port);
    let database_path = args.database.clone().unwrap_or_else(|| toml_config.database_path.clone());

    let db_pool = db::init::init_database(&database_path)
        .await
        .with_context(|| format!("Failed to open database {}", database_path.display()))?;

    let autoplay = db::settings::get_autoplay_enabled(&db_pool)
        .await
        .context("Failed to read autoplay setting")?;

    let surah = match args.surah {
        Some(surah) => SurahContext::for_surah(surah).context("Invalid --surah")?,
        None => db::settings::get_last_surah(&db_pool)
            .await
            .context("Failed to read last surah")?
            .unwrap_or_else(|| SurahContext::new(1, 7)),
    };
    db::settings::set_last_surah(&db_pool, surah.surah)
        .await
        .context("Failed to store last surah")?;

    // Process-wide audio policy, once, before any player exists
    let session = audio_session::initialize(toml_config.audio.session.clone());
    let factory = Arc::new(SimulatedPlayerFactory::new(session, toml_config.simulated_timing()));

    let event_bus = EventBus::new(256);
    let engine = VersePlaybackEngine::spawn(
        toml_config.engine_config(),
        factory,
        surah,
        autoplay,
        event_bus,
    );
    info!(
        "Playback engine initialized (surah {}, autoplay {}, source {})",
        surah.surah,
        autoplay,
        toml_config.audio_source().url_for(surah.key(1))
    );

    let ctx = AppContext {
        engine: engine.clone(),
        db_pool,
        port,
    };

    api::run(ctx, shutdown_signal()).await.context("Server error")?;

    engine.shutdown().await.context("Engine did not shut down cleanly")?;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
