//! Injected logger handles.
//!
//! Every filter and interceptor owns its own [`Logger`]; production handles
//! forward to `tracing`, tests swap in a [`MemorySink`].

use std::sync::{Arc, Mutex};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub const DEFAULT_LOG_FILTER: &str = "info,request_lifecycle=debug";

pub trait LogSink: Send + Sync {
    fn log(&self, level: Level, context: &str, message: &str);
}

/// Forwards log lines to the global `tracing` subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: Level, context: &str, message: &str) {
        match level {
            Level::ERROR => tracing::error!(context = %context, "{}", message),
            Level::WARN => tracing::warn!(context = %context, "{}", message),
            Level::INFO => tracing::info!(context = %context, "{}", message),
            Level::DEBUG => tracing::debug!(context = %context, "{}", message),
            _ => tracing::trace!(context = %context, "{}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: Level,
    pub context: String,
    pub message: String,
}

/// Keeps every line in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.records().into_iter().map(|r| r.message).collect()
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: Level, context: &str, message: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.push(LogRecord {
                level,
                context: context.to_string(),
                message: message.to_string(),
            });
        }
    }
}

#[derive(Clone)]
pub struct Logger {
    context: &'static str,
    sink: Arc<dyn LogSink>,
}

impl Logger {
    pub fn new(context: &'static str) -> Self {
        Self::with_sink(context, Arc::new(TracingSink))
    }

    pub fn with_sink(context: &'static str, sink: Arc<dyn LogSink>) -> Self {
        Self { context, sink }
    }

    pub fn context(&self) -> &'static str {
        self.context
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.sink.log(Level::INFO, self.context, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.sink.log(Level::WARN, self.context, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.sink.log(Level::ERROR, self.context, message.as_ref());
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// Install the global subscriber; `RUST_LOG` overrides `default_filter`
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
