use std::fs::OpenOptions;
use std::path::Path;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logs to stderr and, when given, appends to `log_file` as well.
/// `RUST_LOG` takes precedence over `log_level`.
pub fn init_logging(log_level: &str, log_file: Option<&Path>) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let opened = log_file.map(|path| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| format!("Could not open log file {}: {}", path.display(), e))
    });

    match opened {
        Some(Ok(file)) => {
            let writer = std::io::stderr.and(std::sync::Mutex::new(file));
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
        }
        Some(Err(reason)) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
            tracing::warn!("{}, logging to stderr only", reason);
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    tracing::debug!("Logging initialized at level: {}", log_level);
}
