//! Logger configuration: sinks, queue sizing and level filtering.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{NanoLogError, Result};
use crate::level::LogLevel;
use crate::pool::BufferPool;
use crate::processor::{SinkErrorHandler, DEFAULT_QUEUE_CAPACITY};
use crate::sink::Sink;

/// Environment variable read by [`LoggerOptions::from_env`].
pub const LEVEL_ENV_VAR: &str = "NANOLOG_LEVEL";

#[derive(Debug)]
struct FilterState {
    default: LogLevel,
    overrides: HashMap<String, LogLevel>,
}

/// Default level plus per-category overrides.
///
/// Every change bumps [`version`](LevelFilter::version). Loggers cache their
/// resolved level together with the version it was computed at and only
/// resolve again once the version moves, so the hot path takes no lock.
#[derive(Debug)]
pub struct LevelFilter {
    state: RwLock<FilterState>,
    version: AtomicU64,
}

impl LevelFilter {
    pub fn new(default: LogLevel) -> Self {
        Self {
            state: RwLock::new(FilterState {
                default,
                overrides: HashMap::new(),
            }),
            version: AtomicU64::new(1),
        }
    }

    /// Current version. Starts at 1 and never returns to 0.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub fn default_level(&self) -> LogLevel {
        self.state.read().default
    }

    pub fn set_default(&self, level: LogLevel) {
        self.state.write().default = level;
        self.bump();
    }

    pub fn set_override(&self, category: impl Into<String>, level: LogLevel) {
        self.state.write().overrides.insert(category.into(), level);
        self.bump();
    }

    /// Removes an override; returns whether one existed.
    pub fn remove_override(&self, category: &str) -> bool {
        let removed = self.state.write().overrides.remove(category).is_some();
        if removed {
            self.bump();
        }
        removed
    }

    /// Minimum enabled level for `category`.
    ///
    /// An exact override wins, then the longest override naming a parent
    /// (`app` covers `app.db` and `app::db`), then the default.
    pub fn resolve(&self, category: &str) -> LogLevel {
        let state = self.state.read();
        if let Some(level) = state.overrides.get(category) {
            return *level;
        }
        state
            .overrides
            .iter()
            .filter(|(prefix, _)| is_parent(prefix, category))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, level)| *level)
            .unwrap_or(state.default)
    }

    fn bump(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
    }
}

impl Default for LevelFilter {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}

fn is_parent(prefix: &str, category: &str) -> bool {
    match category.strip_prefix(prefix) {
        Some(rest) => !prefix.is_empty() && (rest.starts_with('.') || rest.starts_with("::")),
        None => false,
    }
}

/// Parses `"warn,app=debug,app.db=trace"` into a default and overrides.
///
/// A bare level sets the default; the last bare level wins.
pub fn parse_directives(input: &str) -> Result<(Option<LogLevel>, Vec<(String, LogLevel)>)> {
    let mut default = None;
    let mut overrides = Vec::new();
    for directive in input.split(',').map(str::trim).filter(|d| !d.is_empty()) {
        match directive.split_once('=') {
            Some((category, level)) => {
                let category = category.trim();
                if category.is_empty() {
                    return Err(NanoLogError::InvalidDirective {
                        directive: directive.to_string(),
                    });
                }
                let level = level.trim().parse().map_err(|_| NanoLogError::InvalidDirective {
                    directive: directive.to_string(),
                })?;
                overrides.push((category.to_string(), level));
            }
            None => default = Some(directive.parse()?),
        }
    }
    Ok((default, overrides))
}

/// Builder for a [`LoggingContext`](crate::LoggingContext).
///
/// ```
/// use nanolog::{LogLevel, LoggerOptions, TextSink};
///
/// let options = LoggerOptions::new()
///     .with_level(LogLevel::Warn)
///     .with_override("app.db", LogLevel::Debug)
///     .with_queue_capacity(1024)
///     .add_sink(TextSink::new(Vec::new()));
/// assert_eq!(options.sink_count(), 1);
/// ```
pub struct LoggerOptions {
    pub(crate) level: LogLevel,
    pub(crate) overrides: Vec<(String, LogLevel)>,
    pub(crate) sinks: Vec<Box<dyn Sink>>,
    pub(crate) queue_capacity: usize,
    pub(crate) pool: Option<Arc<BufferPool>>,
    pub(crate) on_sink_error: Option<SinkErrorHandler>,
}

impl LoggerOptions {
    pub fn new() -> Self {
        Self {
            level: LogLevel::Info,
            overrides: Vec::new(),
            sinks: Vec::new(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            pool: None,
            on_sink_error: None,
        }
    }

    /// Options with directives taken from `NANOLOG_LEVEL`, if set.
    pub fn from_env() -> Result<Self> {
        let options = Self::new();
        match env::var(LEVEL_ENV_VAR) {
            Ok(value) => options.parse_directives(&value),
            Err(_) => Ok(options),
        }
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_override(mut self, category: impl Into<String>, level: LogLevel) -> Self {
        self.overrides.push((category.into(), level));
        self
    }

    /// Applies `warn,app=debug` style directives on top of the current ones.
    pub fn parse_directives(mut self, directives: &str) -> Result<Self> {
        let (default, overrides) = parse_directives(directives)?;
        if let Some(level) = default {
            self.level = level;
        }
        self.overrides.extend(overrides);
        Ok(self)
    }

    /// Registers a sink. Sinks run in registration order.
    pub fn add_sink(mut self, sink: impl Sink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Uses `pool` for overflow buffers instead of the shared one.
    pub fn with_pool(mut self, pool: Arc<BufferPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Receives every error returned by a sink.
    pub fn on_sink_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, &NanoLogError) + Send + Sync + 'static,
    {
        self.on_sink_error = Some(Arc::new(handler));
        self
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    pub(crate) fn build_filter(&self) -> LevelFilter {
        let filter = LevelFilter::new(self.level);
        for (category, level) in &self.overrides {
            filter.set_override(category.clone(), *level);
        }
        filter
    }
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LoggerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sinks: Vec<&str> = self.sinks.iter().map(|s| s.name()).collect();
        f.debug_struct("LoggerOptions")
            .field("level", &self.level)
            .field("overrides", &self.overrides)
            .field("sinks", &sinks)
            .field("queue_capacity", &self.queue_capacity)
            .finish()
    }
}
