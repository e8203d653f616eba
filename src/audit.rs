//! Audit sinks for security events.
//!
//! The monitor is for operational alerting; audit sinks are the system of
//! record. Every [`SecurityEvent`] the guard records is handed to each sink.
//!
//! | Sink                    | Output                                      |
//! |-------------------------|---------------------------------------------|
//! | [`TracingAuditSink`]    | `tracing` events on target `template_guard::audit` |
//! | [`JsonLinesAuditSink`]  | one JSON object per line on any `Write`     |
//! | [`MemoryAuditSink`]     | in-memory buffer                            |

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use crate::error::Result;
use crate::monitor::SecurityEvent;

/// Receiver of recorded security events.
pub trait AuditSink: Send + Sync {
    /// Record one event.
    fn record(&self, event: &SecurityEvent) -> Result<()>;

    /// Flush buffered output.
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Writes events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &SecurityEvent) -> Result<()> {
        tracing::warn!(
            target: "template_guard::audit",
            user_id = %event.user_id,
            template_id = %event.template_id,
            category = %event.category,
            severity = %event.severity,
            timestamp = %event.timestamp.to_rfc3339(),
            "security event"
        );
        Ok(())
    }
}

/// Appends events as JSON lines.
#[derive(Debug)]
pub struct JsonLinesAuditSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesAuditSink<W> {
    /// Wrap `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Unwrap the writer.
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl JsonLinesAuditSink<std::fs::File> {
    /// Open `path` for appending, creating it if needed.
    pub fn append_to(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write + Send> AuditSink for JsonLinesAuditSink<W> {
    fn record(&self, event: &SecurityEvent) -> Result<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(&line)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()?;
        Ok(())
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<SecurityEvent>>,
}

impl MemoryAuditSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    pub fn events(&self) -> Vec<SecurityEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: &SecurityEvent) -> Result<()> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}
