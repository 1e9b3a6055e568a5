use std::io;
use tracing_subscriber::{fmt, EnvFilter};

/// Output format of the process-wide subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    /// Anything other than `json` selects the compact human format.
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("json") { LogFormat::Json } else { LogFormat::Compact }
    }
}

fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Initialize the tracing subscriber.
/// - `RUST_LOG` wins over `default_filter` when set
/// - Writes to stdout so container log collectors pick it up
/// - A second call is a no-op (tests install their own subscribers freely)
pub fn init_logging(format: LogFormat, default_filter: &str) {
    let builder = fmt()
        .with_env_filter(env_filter(default_filter))
        .with_target(false)
        .with_writer(io::stdout);
    let _ = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

/// Compact output with the stock filter, used before configuration is loaded.
pub fn init_logging_default() {
    init_logging(LogFormat::Compact, "info,tower_http=info,axum=info");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_format() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("compact"), LogFormat::Compact);
        assert_eq!(LogFormat::parse("anything"), LogFormat::Compact);
    }
}
