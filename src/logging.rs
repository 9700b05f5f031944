// Centralized tracing setup: per-sink runtime log levels, optional JSON file logs, span timing
use eyre::{Result, WrapErr};
use std::env;
use std::fs;
use std::path::Path;
use std::sync::OnceLock; // For global file guard
use std::time::{Duration, Instant};
use tracing::{Id, Subscriber, debug, field::Field, field::Visit, span};
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Context, Layer, SubscriberExt},
    util::SubscriberInitExt,
};

static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

const LOG_DIR: &str = "logs";

/// Filter directive: everything at `warn`, this library, the calling binary and request tracing at `level`.
fn filter_directive(service_name: &str, level: &str) -> String {
    format!(
        "warn,portfolio_snapshot_ingest={level},{service}={level},tower_http={level}",
        level = level,
        service = service_name,
    )
}

fn build_filter(service_name: &str, level: &str) -> EnvFilter {
    EnvFilter::try_new(filter_directive(service_name, level))
        .unwrap_or_else(|_| EnvFilter::new("warn,portfolio_snapshot_ingest=info"))
}

pub fn init_logging(service_name: String) -> Result<()> {
    let console_log_level = env::var("CONSOLE_LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string());
    let file_log_level = env::var("FILE_LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string());
    let log_to_file = env::var("LOG_TO_FILE").unwrap_or_else(|_| "false".to_string()) == "true";

    // Console goes to stderr: ingest_event owns stdout for its response envelope
    let console_layer = fmt::Layer::new()
        .pretty()
        .with_writer(std::io::stderr)
        .with_filter(build_filter(&service_name, &console_log_level));

    if log_to_file {
        let timestamp = chrono::Utc::now().format("%Y-%m-%d_%H:%M:%S").to_string();
        let log_dir = Path::new(LOG_DIR);
        fs::create_dir_all(log_dir).wrap_err("Failed to create log directory")?;
        let log_file_name = format!("{}_{}.log", service_name, timestamp);

        let file_appender = tracing_appender::rolling::never(log_dir, log_file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        FILE_GUARD.set(guard).ok();

        // File layer: structured JSON logs with UTC timestamps
        let file_layer = fmt::Layer::new()
            .json()
            .with_writer(non_blocking)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_filter(build_filter(&service_name, &file_log_level));

        tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .with(SpanTimingLayer)
            .try_init()
            .wrap_err("Failed to install tracing subscriber")?;
    } else {
        tracing_subscriber::registry()
            .with(console_layer)
            .with(SpanTimingLayer)
            .try_init()
            .wrap_err("Failed to install tracing subscriber")?;
    }

    Ok(())
}

/// Reports busy/idle/total time for spans created with `on_close = true`.
struct SpanTimingLayer;

struct SpanTimes {
    start: Instant,
    last: Instant,
    busy: Duration,
    idle: Duration,
}

struct OnCloseVisitor {
    on_close: bool,
}

impl Visit for OnCloseVisitor {
    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == "on_close" {
            self.on_close = value;
        }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn std::fmt::Debug) {}
}

impl<S> Layer<S> for SpanTimingLayer
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = OnCloseVisitor { on_close: false };
        attrs.record(&mut visitor);
        if !visitor.on_close {
            return;
        }

        if let Some(span) = ctx.span(id) {
            let now = Instant::now();
            span.extensions_mut().insert(SpanTimes {
                start: now,
                last: now,
                busy: Duration::ZERO,
                idle: Duration::ZERO,
            });
        }
    }

    // Time since the previous exit counts as idle
    fn on_enter(&self, id: &Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            if let Some(times) = span.extensions_mut().get_mut::<SpanTimes>() {
                times.idle += times.last.elapsed();
                times.last = Instant::now();
            }
        }
    }

    fn on_exit(&self, id: &Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            if let Some(times) = span.extensions_mut().get_mut::<SpanTimes>() {
                times.busy += times.last.elapsed();
                times.last = Instant::now();
            }
        }
    }

    fn on_close(&self, id: Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(&id) {
            let times = span.extensions_mut().remove::<SpanTimes>();
            if let Some(times) = times {
                debug!(
                    span = span.name(),
                    busy_time = ?times.busy,
                    idle_time = ?times.idle,
                    total_time = ?times.start.elapsed(),
                    "span closed"
                );
            }
        }
    }
}
