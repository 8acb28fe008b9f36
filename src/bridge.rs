//! Routes records from the `log` crate facade into a [`LoggingContext`].

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::context::LoggingContext;
use crate::error::{NanoLogError, Result};
use crate::level::LogLevel;
use crate::logger::{Logger, MessageBuilder};

/// `log::Log` implementation; the record target becomes the category.
///
/// Loggers are created on first use per target and keep their cached level,
/// so filter changes on the context apply here as well.
pub struct LogBridge {
    context: Arc<LoggingContext>,
    loggers: RwLock<HashMap<String, Arc<Logger>>>,
}

impl LogBridge {
    pub fn new(context: Arc<LoggingContext>) -> Self {
        Self {
            context,
            loggers: RwLock::new(HashMap::new()),
        }
    }

    /// Installs a bridge as the global `log` logger.
    ///
    /// Fails when another logger was installed first.
    pub fn install(context: Arc<LoggingContext>) -> Result<()> {
        let bridge: &'static LogBridge = Box::leak(Box::new(LogBridge::new(context)));
        log::set_logger(bridge)
            .map_err(|_| NanoLogError::invalid_config("a `log` logger is already installed"))?;
        log::set_max_level(log::LevelFilter::Trace);
        Ok(())
    }

    fn logger_for(&self, target: &str) -> Arc<Logger> {
        if let Some(logger) = self.loggers.read().get(target) {
            return Arc::clone(logger);
        }
        let mut loggers = self.loggers.write();
        let logger = loggers
            .entry(target.to_string())
            .or_insert_with(|| Arc::new(self.context.logger(target)));
        Arc::clone(logger)
    }
}

impl log::Log for LogBridge {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        self.logger_for(metadata.target())
            .is_enabled(LogLevel::from(metadata.level()))
    }

    fn log(&self, record: &log::Record<'_>) {
        let logger = self.logger_for(record.target());
        let mut builder = MessageBuilder::new(&logger, LogLevel::from(record.level()));
        if !builder.is_enabled() {
            return;
        }
        match record.args().as_str() {
            Some(text) => builder.append_literal(text),
            None => builder.append_literal(&record.args().to_string()),
        };

        let file: Cow<'static, str> = match (record.file_static(), record.file()) {
            (Some(file), _) => Cow::Borrowed(file),
            (None, Some(file)) => Cow::Owned(file.to_string()),
            (None, None) => Cow::Borrowed(""),
        };
        let member: Cow<'static, str> = match (record.module_path_static(), record.module_path()) {
            (Some(module), _) => Cow::Borrowed(module),
            (None, Some(module)) => Cow::Owned(module.to_string()),
            (None, None) => Cow::Borrowed(""),
        };
        builder.submit(file, member, record.line().unwrap_or(0));
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::LoggerOptions;
    use crate::render::TextSink;
    use log::Log;

    #[test]
    fn test_bridge_filters_by_target() {
        let context = LoggingContext::start(
            LoggerOptions::new()
                .with_level(LogLevel::Warn)
                .with_override("net", LogLevel::Debug)
                .add_sink(TextSink::new(Vec::new())),
        )
        .unwrap();
        let bridge = LogBridge::new(Arc::clone(&context));

        let quiet = log::MetadataBuilder::new()
            .target("app")
            .level(log::Level::Info)
            .build();
        let loud = log::MetadataBuilder::new()
            .target("net.tcp")
            .level(log::Level::Debug)
            .build();
        assert!(!bridge.enabled(&quiet));
        assert!(bridge.enabled(&loud));

        context.filter().set_default(LogLevel::Info);
        assert!(bridge.enabled(&quiet));
        context.stop();
    }
}
