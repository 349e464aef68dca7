//! Structured event log collected over a whole run and written out once at the end.
//!
//! Every component receives a clone of the same [`EventLog`] and tags entries with an explicit
//! `(component, operation)` pair. Entries are also forwarded to the `log` facade so they show up
//! in the console output as they happen.

use anyhow::{Context, Result};
use log::{error, info, warn};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::ensure_parent_dir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Warn,
    Error,
}

/// Classification of a per-unit failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Timeout, connection reset, DNS failure
    NetworkTransient,
    /// HTTP 429
    RateLimited,
    /// Any other non-200 status
    ClientError,
    /// Malformed row or JSON body
    ParseError,
    /// Every attempt failed
    Exhausted,
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub timestamp: String,
    pub level: EventLevel,
    pub component: &'static str,
    pub operation: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&self, component: &'static str, operation: &'static str, message: impl Into<String>) {
        self.record(EventLevel::Info, component, operation, None, message.into());
    }

    pub fn warn(&self, component: &'static str, operation: &'static str, message: impl Into<String>) {
        self.record(EventLevel::Warn, component, operation, None, message.into());
    }

    pub fn error(&self, component: &'static str, operation: &'static str, message: impl Into<String>) {
        self.record(EventLevel::Error, component, operation, None, message.into());
    }

    /// Record a classified per-unit failure
    pub fn failure(
        &self,
        component: &'static str,
        operation: &'static str,
        kind: FailureKind,
        message: impl Into<String>,
    ) {
        let level = match kind {
            FailureKind::Exhausted => EventLevel::Error,
            _ => EventLevel::Warn,
        };
        self.record(level, component, operation, Some(kind), message.into());
    }

    fn record(
        &self,
        level: EventLevel,
        component: &'static str,
        operation: &'static str,
        kind: Option<FailureKind>,
        message: String,
    ) {
        match level {
            EventLevel::Info => info!("[{}::{}] {}", component, operation, message),
            EventLevel::Warn => warn!("[{}::{}] {}", component, operation, message),
            EventLevel::Error => error!("[{}::{}] {}", component, operation, message),
        }

        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        let event = Event {
            timestamp,
            level,
            component,
            operation,
            kind,
            message,
        };
        self.lock().push(event);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Event>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn count_level(&self, level: EventLevel) -> usize {
        self.lock().iter().filter(|e| e.level == level).count()
    }

    pub fn count_kind(&self, kind: FailureKind) -> usize {
        self.lock().iter().filter(|e| e.kind == Some(kind)).count()
    }

    pub fn snapshot(&self) -> Vec<Event> {
        self.lock().clone()
    }

    /// Write all entries as JSON lines
    pub fn flush_to(&self, path: &Path) -> Result<usize> {
        ensure_parent_dir(path)?;
        let file = File::create(path)
            .with_context(|| format!("Failed to create event log: {}", path.display()))?;
        let mut writer = BufWriter::new(file);

        let entries = self.snapshot();
        for event in &entries {
            writeln!(writer, "{}", serde_json::to_string(event)?)?;
        }
        writer.flush()?;

        Ok(entries.len())
    }
}
