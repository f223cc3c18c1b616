use chrono::Local;
use fern::Dispatch;
use log::LevelFilter;
use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::{Error, Result};

/// Target of the order lifecycle audit events.
pub const AUDIT_TARGET: &str = "resource_broker::audit";

const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "broker.log";

/// Initializes the global operational logger.
///
/// Call once at the start of `main`. The level comes from `RUST_LOG`
/// (`RUST_LOG=debug resource-broker ...`) and defaults to `info`.
/// Records go to stderr with colors and to `logs/broker.log` without.
pub fn init() {
    if let Err(e) = fs::create_dir_all(LOG_DIR) {
        eprintln!("Failed to create log directory at '{}': {}", LOG_DIR, e);
    }
    let log_file_path = format!("{}/{}", LOG_DIR, LOG_FILE);

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let log_level_filter = log_level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);

    let colors = fern::colors::ColoredLevelConfig::new()
        .error(fern::colors::Color::Red)
        .warn(fern::colors::Color::Yellow)
        .info(fern::colors::Color::Green)
        .debug(fern::colors::Color::Blue)
        .trace(fern::colors::Color::BrightBlack);

    let console_config = Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .chain(std::io::stderr());

    let mut dispatch = Dispatch::new()
        .level(log_level_filter)
        .level_for("mio", LevelFilter::Warn)
        .level_for("tokio_util", LevelFilter::Warn)
        .level_for("serde", LevelFilter::Warn)
        .level_for("uuid", LevelFilter::Warn)
        .chain(console_config);

    match fern::log_file(&log_file_path) {
        Ok(file) => {
            let file_config = Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!(
                        "[{} {} {}] {}",
                        Local::now().format("%Y-%m-%d %H:%M:%S"),
                        record.level(),
                        record.target(),
                        message
                    ))
                })
                .chain(file);
            dispatch = dispatch.chain(file_config);
        }
        Err(e) => eprintln!("Failed to open log file '{}', logging to the console only: {}", log_file_path, e),
    }

    if let Err(e) = dispatch.apply() {
        eprintln!("Failed to apply logger configuration: {}", e);
        return;
    }

    log::info!("Logger initialized. Logging to console and '{}'.", log_file_path);
}

/// Routes the lifecycle audit events, and nothing else, into `path`.
///
/// Until this is called the audit events reach the `log` backend like any
/// other record. The returned guard flushes the file writer on drop and must
/// live as long as the broker.
pub fn init_audit(path: impl AsRef<Path>) -> Result<WorkerGuard> {
    let path = path.as_ref();
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::ConfigError(format!("audit log path '{}' names no file", path.display())))?;
    fs::create_dir_all(directory)?;

    let appender = tracing_appender::rolling::never(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::new(format!("{}=info", AUDIT_TARGET)))
        .with(fmt::layer().with_writer(writer).with_ansi(false).with_target(false));

    // Not `SubscriberInitExt::init`: that would also claim the `log` facade fern owns.
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::ConfigError(format!("audit subscriber already installed: {}", e)))?;

    log::info!("Audit trail is written to '{}'.", path.display());
    Ok(guard)
}
