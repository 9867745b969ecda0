//! Logging system configuration and initialization
//!
//! - Console and/or file output, optional JSON in the file
//! - Log level from the config file, overridable with `RUST_LOG`
//! - Timestamps in Turkey time (UTC+3)
//! - One log file per run, older files pruned down to `max_files`

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use chrono::{FixedOffset, Offset, Utc};
use lazy_static::lazy_static;
use tracing::{info, warn};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "price-watch";
const TURKEY_UTC_OFFSET_SECONDS: i32 = 3 * 3600;

/// Dependencies that are only interesting at trace level.
const NOISY_TARGETS: &[&str] = &["reqwest", "hyper", "hyper_util", "h2", "html5ever", "selectors"];

// Keeps the non-blocking file writer flushing until the process exits
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>> =
        Mutex::new(Vec::new());
}

fn turkey_offset() -> FixedOffset {
    FixedOffset::east_opt(TURKEY_UTC_OFFSET_SECONDS).unwrap_or_else(|| Utc.fix())
}

/// Custom time formatter for TRT (Turkey Time, UTC+3)
struct TrtTimeFormatter;

impl FormatTime for TrtTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = Utc::now().with_timezone(&turkey_offset());
        write!(w, "{}", now.format("%Y-%m-%d %H:%M:%S%.3f %:z"))
    }
}

/// Log directory relative to the executable location
pub fn get_log_directory() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    exe_dir.join("logs")
}

/// Filter used when `RUST_LOG` is not set.
fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let mut filter = EnvFilter::try_new(&config.level)
        .map_err(|e| anyhow!("Invalid log level '{}': {}", config.level, e))?;

    if !config.level.to_lowercase().contains("trace") {
        for target in NOISY_TARGETS {
            filter = filter.add_directive(format!("{target}=warn").parse()?);
        }
    }

    for (target, level) in &config.module_filters {
        let directive = format!("{target}={level}")
            .parse()
            .map_err(|e| anyhow!("Invalid module filter {}={}: {}", target, level, e))?;
        filter = filter.add_directive(directive);
    }

    Ok(filter)
}

/// Initialize logging with the given configuration
///
/// Dependency noise (`reqwest`, `hyper`, `html5ever`, `selectors`) is held at
/// `warn` unless the level is `trace`. `RUST_LOG` replaces the whole filter:
///
/// ```bash
/// RUST_LOG="debug,reqwest=debug" price-watch
/// ```
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_filter(config)?,
    };
    let registry = Registry::default().with(env_filter);

    let console_layer = config.console_output.then(|| {
        fmt::Layer::new()
            .with_writer(std::io::stdout)
            .with_timer(TrtTimeFormatter)
            .with_target(false)
    });

    let log_dir = config.log_dir.clone().unwrap_or_else(get_log_directory);

    match (config.file_output, config.json_format) {
        (false, _) if console_layer.is_none() => {
            return Err(anyhow!("No logging output configured"));
        }
        (false, _) => registry
            .with(console_layer)
            .try_init()
            .map_err(|e| anyhow!("Failed to install log subscriber: {}", e))?,
        (true, json) => {
            std::fs::create_dir_all(&log_dir)
                .map_err(|e| anyhow!("Failed to create log directory {:?}: {}", log_dir, e))?;
            cleanup_old_logs(&log_dir, config.max_files.saturating_sub(1) as usize)?;

            let file_name = format!(
                "{LOG_FILE_PREFIX}-{}.log",
                Utc::now().with_timezone(&turkey_offset()).format("%Y%m%dT%H%M%S")
            );
            let (file_writer, file_guard) = non_blocking(rolling::never(&log_dir, file_name));
            LOG_GUARDS
                .lock()
                .map_err(|_| anyhow!("Log guard registry poisoned"))?
                .push(file_guard);

            if json {
                let file_layer = fmt::Layer::new()
                    .json()
                    .with_writer(file_writer)
                    .with_timer(TrtTimeFormatter)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_ansi(false);
                registry
                    .with(console_layer)
                    .with(file_layer)
                    .try_init()
                    .map_err(|e| anyhow!("Failed to install log subscriber: {}", e))?;
            } else {
                let file_layer = fmt::Layer::new()
                    .with_writer(file_writer)
                    .with_timer(TrtTimeFormatter)
                    .with_target(false)
                    .with_ansi(false);
                registry
                    .with(console_layer)
                    .with(file_layer)
                    .try_init()
                    .map_err(|e| anyhow!("Failed to install log subscriber: {}", e))?;
            }
        }
    }

    info!("Logging system initialized");
    info!("Log level: {}", config.level);
    if config.file_output {
        info!("Log directory: {:?}", log_dir);
    }
    Ok(())
}

/// Remove the oldest `*.log` files so at most `keep` remain.
fn cleanup_old_logs(log_dir: &Path, keep: usize) -> Result<usize> {
    if !log_dir.exists() {
        return Ok(0);
    }

    let mut log_files = Vec::new();
    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_log = path.extension().is_some_and(|ext| ext == "log");
        if !(path.is_file() && is_log) {
            continue;
        }
        if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
            log_files.push((path, modified));
        }
    }

    // Newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    let mut removed = 0;
    for (path, _) in log_files.iter().skip(keep) {
        match std::fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to remove old log file {:?}: {}", path, e),
        }
    }
    Ok(removed)
}
