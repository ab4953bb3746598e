//! Tracing initialization: stderr output plus an optional daily-rolling
//! file layer for the daemon.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::LoggingConfig;
use crate::paths;

const LOG_FILE_PREFIX: &str = "slotdesk.log";

#[derive(Clone)]
pub struct TelemetryConfig {
    pub verbosity: u8,
    pub logging: LoggingConfig,
}

impl TelemetryConfig {
    pub fn new(verbosity: u8, logging: LoggingConfig) -> Self {
        Self { verbosity, logging }
    }
}

pub struct TelemetryGuard {
    _guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
}

pub fn is_test_env() -> bool {
    std::env::var_os("SLOTDESK_TESTING").is_some()
        || std::env::var_os("RUST_TEST_THREADS").is_some()
}

pub fn init(config: TelemetryConfig) -> TelemetryGuard {
    let filter = EnvFilter::builder()
        .with_default_directive(level_from_verbosity(config.verbosity).into())
        .with_env_var("SLOTDESK_LOG")
        .from_env_lossy();

    let mut guards = Vec::new();
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    layers.push(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
    );

    if config.logging.file.enabled && !is_test_env() {
        let dir = config
            .logging
            .file
            .dir
            .clone()
            .unwrap_or_else(paths::log_dir);
        if let Err(e) = std::fs::create_dir_all(&dir) {
            eprintln!("failed to create log dir {}: {e}", dir.display());
        } else {
            let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            guards.push(guard);
            layers.push(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .boxed(),
            );
        }
    }

    layers.push(Box::new(filter));

    // try_init: tests may initialize more than once; later attempts are
    // no-ops.
    let _ = Registry::default().with(layers).try_init();

    TelemetryGuard { _guards: guards }
}

fn level_from_verbosity(verbosity: u8) -> tracing::level_filters::LevelFilter {
    match verbosity {
        0 => tracing::level_filters::LevelFilter::WARN,
        1 => tracing::level_filters::LevelFilter::INFO,
        2 => tracing::level_filters::LevelFilter::DEBUG,
        _ => tracing::level_filters::LevelFilter::TRACE,
    }
}
