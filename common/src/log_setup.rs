use std::path::Path;
use std::sync::OnceLock;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Installs console logging, plus daily-rolling file logging if `log_dir`
/// is given.
///
/// `RUST_LOG` overrides `base_level`. Log files get the `linkage` prefix.
pub fn setup_logging(base_level: &str, log_dir: Option<&Path>) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(base_level))?;

    let file_layer = match log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir)?;

            let file_appender = tracing_appender::rolling::Builder::new()
                .rotation(tracing_appender::rolling::Rotation::DAILY)
                .filename_prefix("linkage")
                .filename_suffix("log")
                .max_log_files(5)
                .build(log_dir)?;

            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
            LOG_GUARD
                .set(guard)
                .map_err(|_| anyhow::anyhow!("Logging already initialized"))?;

            let file_layer = tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true)
                .with_file(true)
                .with_ansi(false)
                .with_writer(file_writer);
            Some(file_layer)
        }
        None => None,
    };

    // stdout is reserved for reports; everything goes to stderr.
    let console_writer = std::io::stderr.with_max_level(Level::TRACE);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(true)
        .with_writer(console_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(())
}
