use std::borrow::Cow;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::clock;
use crate::level::LogLevel;

/// Metadata of one log call.
///
/// Created once per call and moved through the queue alongside its message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub level: LogLevel,
    pub time: DateTime<Utc>,
    pub category: Arc<str>,
    pub file: Cow<'static, str>,
    pub member: Cow<'static, str>,
    pub line: u32,
}

impl LogEvent {
    /// An event stamped with the current UTC time.
    pub fn new(
        level: LogLevel,
        category: Arc<str>,
        file: impl Into<Cow<'static, str>>,
        member: impl Into<Cow<'static, str>>,
        line: u32,
    ) -> Self {
        Self::with_time(clock::now_utc(), level, category, file, member, line)
    }

    pub fn with_time(
        time: DateTime<Utc>,
        level: LogLevel,
        category: Arc<str>,
        file: impl Into<Cow<'static, str>>,
        member: impl Into<Cow<'static, str>>,
        line: u32,
    ) -> Self {
        Self {
            level,
            time,
            category,
            file: file.into(),
            member: member.into(),
            line,
        }
    }

    /// Timestamp as UTC ticks.
    pub fn ticks(&self) -> i64 {
        clock::to_ticks(self.time)
    }

    /// Last path component of the source file.
    pub fn file_name(&self) -> &str {
        self.file
            .rsplit(|c| c == '/' || c == '\\')
            .next()
            .unwrap_or(&self.file)
    }
}
