use chrono::Local;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{error, Event, Subscriber};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer};

/// Events with this target are also printed to stdout.
pub const ECHO_TARGET: &str = "console";

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `[YYYY-MM-DD HH:MM:SS] message key=value` with local time, no level or target.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogLineFormat;

impl<S, N> FormatEvent<S, N> for LogLineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(writer, "[{}] ", Local::now().format(TIMESTAMP_FORMAT))?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Opens the log file in append mode for every event and closes it afterwards.
///
/// An unopenable file drops the event instead of failing the run.
#[derive(Debug, Clone)]
pub struct AppendFile {
    path: PathBuf,
}

impl AppendFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl<'a> MakeWriter<'a> for AppendFile {
    type Writer = Box<dyn Write + 'a>;

    fn make_writer(&'a self) -> Self::Writer {
        match OpenOptions::new().create(true).append(true).open(&self.path) {
            Ok(file) => Box::new(file),
            Err(_) => Box::new(io::sink()),
        }
    }
}

/// `RUST_LOG` when set, otherwise the configured level.
pub fn default_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
}

pub fn build_subscriber(log_file: &str, filter: EnvFilter) -> impl Subscriber + Send + Sync {
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .event_format(LogLineFormat)
        .with_writer(AppendFile::new(log_file))
        .with_filter(filter);

    let echo_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .event_format(LogLineFormat)
        .with_writer(io::stdout)
        .with_filter(filter_fn(|metadata| metadata.target() == ECHO_TARGET));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(echo_layer)
}

pub fn init_logging(log_file: &str, log_level: &str) -> Result<(), TryInitError> {
    use tracing_subscriber::util::SubscriberInitExt;
    build_subscriber(log_file, default_filter(log_level)).try_init()
}

/// Write a single `Bad request: ...` line to `log_file` without installing a global subscriber.
pub fn record_bad_request(log_file: &str, message: &str) {
    let subscriber = build_subscriber(log_file, EnvFilter::new("info"));
    tracing::subscriber::with_default(subscriber, || error!("Bad request: {}", message));
}
