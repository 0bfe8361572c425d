use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::paths::DataDir;

const DEFAULT_FILTER: &str = "info,reqwest=warn,hyper_util=warn,tungstenite=warn";
const LOG_FILE: &str = "client.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    /// `AGENTLINK_LOG_FORMAT=pretty` switches to multi-line text; anything else is JSON.
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

/// First directive that parses wins: `AGENTLINK_LOG_FILTER`, then `RUST_LOG`.
fn filter_directive(own: Option<String>, rust_log: Option<String>) -> String {
    [own, rust_log]
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty() && EnvFilter::try_new(value).is_ok())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Keeps the non-blocking writer alive; logs flush when it drops.
pub struct LoggingHandle {
    _guard: WorkerGuard,
}

/// Log to `<data_dir>/logs/client.log` so output never interleaves with
/// the interactive terminal.
pub fn init_logging(data_dir: &DataDir) -> anyhow::Result<LoggingHandle> {
    let log_dir = data_dir.log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join(LOG_FILE);

    let directive = filter_directive(
        std::env::var("AGENTLINK_LOG_FILTER").ok(),
        std::env::var("RUST_LOG").ok(),
    );
    let format = LogFormat::parse(std::env::var("AGENTLINK_LOG_FORMAT").ok().as_deref());

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(&log_dir, LOG_FILE));
    let registry = tracing_subscriber::registry().with(EnvFilter::try_new(&directive)?);
    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .pretty()
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .json()
                    .flatten_event(true)
                    .with_current_span(true),
            )
            .try_init()?,
    }

    tracing::info!(
        component = "logging",
        event = "logging.initialized",
        log_path = %log_path.display(),
        format = ?format,
        filter = %directive,
    );

    Ok(LoggingHandle { _guard: guard })
}
