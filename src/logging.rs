//! Tracing subscriber setup.
//!
//! File output runs through a non-blocking rolling appender; the returned
//! guard must outlive the process or buffered lines are lost. In text mode
//! diagnostics are mirrored to stderr, keeping stdout for the terminal
//! prompts and the receipt.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::AppConfig;

pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let rolling = match config.rotation.as_str() {
        "hourly" => tracing_appender::rolling::hourly(&config.log_dir, &config.log_file),
        "daily" => tracing_appender::rolling::daily(&config.log_dir, &config.log_file),
        _ => tracing_appender::rolling::never(&config.log_dir, &config.log_file),
    };
    let (file_writer, guard) = tracing_appender::non_blocking(rolling);

    // RUST_LOG wins over the configured level when set.
    let default_filter = if config.enable_tracing {
        config.log_level.clone()
    } else {
        // Transport crates are chatty at debug level.
        format!(
            "{},hyper=off,reqwest=off,tungstenite=off,tokio_tungstenite=off",
            config.log_level
        )
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let base = tracing_subscriber::registry().with(filter);

    if config.use_json {
        base.with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();
    } else {
        base.with(
            fmt::layer()
                .with_target(false)
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
    }

    guard
}
