use chrono::Utc;
use chrono_tz::Europe::Paris;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,tower_http=info,axum=info";

/// Log timestamps in exchange time.
struct ParisTime;

impl FormatTime for ParisTime {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = Utc::now().with_timezone(&Paris);
        write!(w, "{}", now.format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Where log lines go besides the console.
#[derive(Debug, Clone, PartialEq)]
pub struct LogTarget {
    pub to_file: bool,
    pub dir: String,
}

impl LogTarget {
    pub fn from_env() -> Self {
        Self {
            to_file: std::env::var("LOG_TO_FILE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            dir: std::env::var("LOG_DIR").unwrap_or_else(|_| "./logs".to_string()),
        }
    }
}

/// Install the global subscriber. Keep the returned guard alive for the
/// lifetime of the process, or buffered file lines are lost on exit.
pub fn init_logging() -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let console_layer = fmt::layer()
        .with_timer(ParisTime)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    let target = LogTarget::from_env();
    if !target.to_file {
        tracing_subscriber::registry().with(env_filter).with(console_layer).init();
        return None;
    }

    let appender = RollingFileAppender::new(Rotation::DAILY, &target.dir, "bourse-ingest.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file_layer = fmt::layer()
        .with_timer(ParisTime)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();
    Some(guard)
}
