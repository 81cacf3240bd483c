//! File logging
//!
//! Everything logs through `tracing` to a daily-rolled file under the XDG
//! state directory (`~/.local/state/loopdesk/loopdesk.log`), so the
//! poller's output survives daemon restarts and stays out of stdout. The
//! returned guard must live as long as the process; dropping it flushes
//! the non-blocking writer.

use crate::config::{Config, LoggingConfig};
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Dependencies that flood the file at debug level unless capped. The
/// gateway retry logs are unreadable with hyper's connection chatter
/// interleaved.
const NOISY_TARGETS: &[&str] = &["hyper", "reqwest", "rustls"];

/// Directive string for the default filter: the configured level for our
/// own crates, `warn` for the HTTP stack. `RUST_LOG` bypasses this.
fn default_directives(level: &str) -> String {
    let mut directives = level.to_string();
    for target in NOISY_TARGETS {
        directives.push(',');
        directives.push_str(target);
        directives.push_str("=warn");
    }
    directives
}

pub fn init(config: &LoggingConfig) -> crate::error::Result<LoggingGuard> {
    let log_dir = Config::state_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "loopdesk.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.level)));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .init();

    tracing::info!(
        log_dir = %log_dir.display(),
        level = %config.level,
        "Logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// Test logging: stdout, `RUST_LOG`-driven, safe to call repeatedly.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Keeps the background log writer alive; flushes on drop.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

pub fn log_file_path() -> PathBuf {
    Config::log_path()
}
