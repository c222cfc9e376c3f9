//! Log records as seen by the layout engine.

use crate::domain::level::Level;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Structured key/value data attached to a record.
pub type Fields = BTreeMap<String, serde_json::Value>;

/// A source location captured for a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerFrame {
    /// Function or module path, when known
    pub function: Option<String>,
    /// Source file path
    pub file: String,
    /// Line number in `file`
    pub line: u32,
}

impl CallerFrame {
    pub fn new(function: Option<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            function,
            file: file.into(),
            line,
        }
    }

    /// File name without its directories.
    pub fn file_name(&self) -> &str {
        self.file
            .rsplit(|c: char| c == '/' || c == '\\')
            .next()
            .unwrap_or(self.file.as_str())
    }
}

/// A single log record.
///
/// Construct one with [`Entry::new`] and the `with_*` methods; the layout
/// engine only ever reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Record time; `None` renders as the time of rendering
    pub time: Option<DateTime<Local>>,
    pub level: Level,
    /// Empty when the record carries no trace id
    pub trace_id: String,
    pub fields: Fields,
    pub message: String,
    /// Calling frames captured when the record was logged, innermost first
    pub callers: Vec<CallerFrame>,
    /// Overrides the number of caller frames a `%caller` part prints
    pub caller_skip: Option<usize>,
    /// Thread id snapshot; `None` means "the rendering thread"
    pub thread_id: Option<u64>,
}

impl Entry {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            time: None,
            level,
            trace_id: String::new(),
            fields: Fields::new(),
            message: message.into(),
            callers: Vec::new(),
            caller_skip: None,
            thread_id: None,
        }
    }

    pub fn with_time(mut self, time: DateTime<Local>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Append a calling frame, one level further out than the last.
    pub fn with_caller(mut self, caller: CallerFrame) -> Self {
        self.callers.push(caller);
        self
    }

    /// The direct caller, if captured.
    pub fn caller(&self) -> Option<&CallerFrame> {
        self.callers.first()
    }

    pub fn with_caller_skip(mut self, skip: usize) -> Self {
        self.caller_skip = Some(skip);
        self
    }

    pub fn with_thread_id(mut self, thread_id: u64) -> Self {
        self.thread_id = Some(thread_id);
        self
    }
}
