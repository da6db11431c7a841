use std::{fs::OpenOptions, io, path::PathBuf, sync::Mutex};

use chrono::Utc;
use serde::Deserialize;
use tracing::metadata::LevelFilter;
use tracing_subscriber::{
    filter::FilterFn, fmt::time::FormatTime, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

struct Time;

impl FormatTime for Time {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        let time = Utc::now();
        w.write_fmt(format_args!("{}", time.format("%Y-%m-%d %H:%M:%S%.6f")))
    }
}

/// Where log records go and how much is kept.
///
/// With no `file`, records go to stderr.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub level: Option<String>,
}

#[macro_export]
macro_rules! log {
    ($level:expr, $span:expr, $($msg:expr),*) => {{
        let span = $crate::tracing::span!(target: "postern", $level, $span);
        let _enter = span.enter();

        $crate::tracing::event!(target: "postern", $level, $($msg),*)
    }};
}

#[macro_export]
macro_rules! outgoing {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "outgoing", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::outgoing!(level = TRACE, $($msg),*)
    };
}

#[macro_export]
macro_rules! incoming {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "incoming", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::incoming!(level = TRACE, $($msg),*)
    };
}

#[macro_export]
macro_rules! internal {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "internal", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::internal!(level = TRACE, $($msg),*)
    };
}

fn level_filter(config: &LogConfig) -> LevelFilter {
    let level = config
        .level
        .clone()
        .or_else(|| std::env::var("LOG_LEVEL").ok());

    if let Some(level) = level {
        match level.to_ascii_lowercase().as_str() {
            "warn" => LevelFilter::WARN,
            "info" => LevelFilter::INFO,
            "debug" => LevelFilter::DEBUG,
            "trace" => LevelFilter::TRACE,
            _ => LevelFilter::ERROR,
        }
    } else if cfg!(debug_assertions) {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    }
}

/// Install the global subscriber according to `config`.
///
/// # Errors
///
/// Fails if the configured log file cannot be opened for appending.
pub fn init(config: &LogConfig) -> io::Result<()> {
    let level = level_filter(config);
    let target = FilterFn::new(|metadata| metadata.target().starts_with("postern"));

    match &config.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::Registry::default()
                .with(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .with_ansi(false)
                        .with_timer(Time)
                        .with_target(false)
                        .with_writer(Mutex::new(file))
                        .with_filter(level)
                        .with_filter(target),
                )
                .init();
        }
        None => {
            tracing_subscriber::Registry::default()
                .with(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .with_ansi(true)
                        .with_timer(Time)
                        .with_target(false)
                        .with_writer(io::stderr)
                        .with_filter(level)
                        .with_filter(target),
                )
                .init();
        }
    }

    Ok(())
}
