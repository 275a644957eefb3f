use std::fs::File;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;

/// Targets logged at the configured level. Everything else stays at `warn`.
const RELAYCAST_TARGETS: &[&str] = &[
    "relaycast",
    "relaycast_core",
    "relaycast_platforms",
    "relaycast_livestream",
    "relaycast_api",
    "tower_http",
];

/// Initialize structured logging based on configuration
///
/// `RUST_LOG` replaces the built-in directives entirely. Output is JSON when
/// `format == "json"` and human-readable otherwise, written to stdout or
/// appended to `file_path`.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = build_filter(&config.level)?;
    let registry = tracing_subscriber::registry().with(filter);
    let file = config.file_path.as_deref().map(open_log_file).transpose()?;

    if config.format.as_str() == "json" {
        let layer = fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_target(true)
            .with_line_number(true);
        match file {
            Some(file) => registry.with(layer.with_writer(file)).try_init()?,
            None => registry.with(layer).try_init()?,
        }
    } else {
        let layer = fmt::layer().pretty().with_target(true).with_file(false);
        match file {
            Some(file) => registry.with(layer.with_ansi(false).with_writer(file)).try_init()?,
            None => registry.with(layer).try_init()?,
        }
    }

    Ok(())
}

/// The configured level is validated even when `RUST_LOG` takes over.
fn build_filter(level: &str) -> anyhow::Result<EnvFilter> {
    let level: Level = level
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid log level: {level}"))?;

    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    Ok(EnvFilter::new(default_directives(level)))
}

fn default_directives(level: Level) -> String {
    let level = level.as_str().to_lowercase();
    let mut directives = String::from("warn");
    for target in RELAYCAST_TARGETS {
        directives.push_str(&format!(",{target}={level}"));
    }
    directives
}

fn open_log_file(path: &str) -> anyhow::Result<Arc<File>> {
    let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Arc::new(file))
}
