//! loopdeskd - notification daemon for loopdesk
//!
//! Runs the notification poller: scans the incident store for undelivered
//! notifiable incidents, delivers over the chat gateway (thread, then
//! direct message, then fallback channel), and acknowledges each delivery
//! durably so nothing is sent twice.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/loopdesk/incidents.db (~/.local/share/loopdesk/incidents.db)
//! - Config: $XDG_CONFIG_HOME/loopdesk/config.toml (~/.config/loopdesk/config.toml)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use loopdesk_core::clients::HttpChatGateway;
use loopdesk_core::notify::{DeliveryReconciler, NotificationPoller};
use loopdesk_core::{Config, Database};

#[derive(Parser)]
#[command(name = "loopdeskd")]
#[command(about = "Deliver pending incident notifications")]
#[command(version)]
struct Args {
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Config file path (default: XDG config location)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Poll interval in seconds (overrides config)
    #[arg(long)]
    interval: Option<u64>,

    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Ensure XDG environment variables are set before using core library
    Config::ensure_xdg_env();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path).context("failed to load configuration")?,
        None => Config::load().context("failed to load configuration")?,
    };
    if args.verbose {
        config.logging.level = "debug".to_string();
    }

    let _log_guard = loopdesk_core::logging::init(&config.logging)
        .context("failed to initialize logging")?;

    tracing::info!("loopdeskd starting up");

    let db_path = Config::database_path();
    tracing::info!(path = %db_path.display(), "Opening database");
    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;
    let db = Arc::new(db);

    let gateway = Arc::new(
        HttpChatGateway::new(config.gateway.clone()).context("failed to create chat gateway")?,
    );
    let poller = NotificationPoller::new(db, DeliveryReconciler::new(gateway));

    if args.once {
        let result = poller.tick().await.context("poll cycle failed")?;
        println!(
            "Due: {}  Delivered: {}  Failed: {}",
            result.due, result.delivered, result.failed
        );
        return Ok(());
    }

    let interval = Duration::from_secs(args.interval.unwrap_or(config.poller.interval_secs));

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nShutting down...");
        r.store(false, Ordering::SeqCst);
    })
    .context("failed to set Ctrl+C handler")?;

    println!(
        "Polling every {}s. Press Ctrl+C to stop.",
        interval.as_secs()
    );

    poller
        .run(interval, running)
        .await
        .context("poller loop failed")?;

    tracing::info!("loopdeskd shutting down");
    Ok(())
}
