use std::{path::Path, sync::LazyLock};

use anyhow::Result;
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::{
    EnvFilter,
    fmt::{format::FmtSpan, writer::MakeWriterExt},
};

pub const CLI_PREFIX: &str = "cli";

const DEFAULT_LEVEL: &str = "info";

/// Where logs go and how much of them.
#[derive(Debug, Clone, Copy)]
pub struct LogConfig<'a> {
    /// File name prefix of the rotated files.
    pub prefix: &'a str,
    pub dir: &'a Path,
    /// Overrides `RUST_LOG` when set.
    pub level: Option<LevelFilter>,
    /// Mirrors logs to stderr. Stdout is left to command output.
    pub echo: bool,
}

impl LogConfig<'_> {
    /// Bare levels are scoped to this crate, full `target=level` directives are taken as is.
    fn directives(&self, rust_log: Option<&str>) -> String {
        let crate_target = env!("CARGO_PKG_NAME").replace('-', "_");
        match (self.level, rust_log) {
            (Some(level), _) => format!("{crate_target}={}", level.to_string().to_lowercase()),
            (None, Some(directives)) if directives.contains('=') => directives.to_string(),
            (None, Some(level)) => format!("{crate_target}={}", level.trim()),
            (None, None) => format!("{crate_target}={DEFAULT_LEVEL}"),
        }
    }
}

/// Sends logs into daily rotated files, keeping the last five days.
pub fn enable_logging(config: LogConfig<'_>) -> Result<()> {
    let appender = tracing_appender::rolling::Builder::new()
        .rotation(Rotation::DAILY)
        .max_log_files(5)
        .filename_prefix(config.prefix)
        .build(config.dir)?;

    let echo = config.echo;
    let stderr = std::io::stderr.with_filter(move |_| echo);
    let rust_log = std::env::var("RUST_LOG").ok();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.directives(rust_log.as_deref())))
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(stderr.and(appender))
        .with_ansi(false)
        .try_init();
    Ok(())
}

pub static TEST_LOGGING: LazyLock<()> = LazyLock::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_test_writer()
        .pretty()
        .try_init();
});
