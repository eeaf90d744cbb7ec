use clap::ValueEnum;
use tracing::level_filters::LevelFilter;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Level used when neither `--log-level` nor `GSBRIDGE_LOG_LEVEL` is set.
    ///
    /// The bridge daemon reports lifecycle events at info. One-shot commands
    /// stay quiet unless something goes wrong.
    pub fn default_for(daemon: bool) -> Self {
        if daemon {
            LogLevel::Info
        } else {
            LogLevel::Warn
        }
    }

    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }

    /// Frame, protocol and link events come from different crates; name the
    /// emitting module once per-frame logging is on.
    fn shows_target(self) -> bool {
        matches!(self, LogLevel::Debug | LogLevel::Trace)
    }
}

/// Logs go to stderr so stdout stays clean for command output.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level.as_filter())
        .with_ansi(false)
        .with_target(level.shows_target());

    let result = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
    };
    if let Err(e) = result {
        eprintln!("warning: logging not initialised: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daemon_logs_lifecycle_one_shot_stays_quiet() {
        assert_eq!(LogLevel::default_for(true), LogLevel::Info);
        assert_eq!(LogLevel::default_for(false), LogLevel::Warn);
    }

    #[test]
    fn targets_only_at_frame_level_verbosity() {
        assert!(!LogLevel::Info.shows_target());
        assert!(LogLevel::Debug.shows_target());
        assert!(LogLevel::Trace.shows_target());
        assert_eq!(LogLevel::Trace.as_filter(), LevelFilter::TRACE);
    }
}
