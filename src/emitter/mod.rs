pub mod line_writer;

use crate::clock::Clock;
use crate::record::{split_node, LogKey, LogRecord};
use crate::sink::{IngestSink, SinkError};
use crate::watermark::DeliveryTracker;
use std::sync::Arc;
use thiserror::Error;

pub use line_writer::LineWriter;

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("message spans multiple lines")]
    MultiLine,
}

pub type Result<T> = std::result::Result<T, EmitError>;

/// Ships one build's (or one step's) output lines to the ingestion service.
///
/// Each line becomes a [`LogRecord`] stamped with the emitter's clock at send
/// time. When a [`DeliveryTracker`] is attached, every successful send advances
/// the build's delivery watermark. Emitters on remote agents run without one.
#[derive(Debug, Clone)]
pub struct LogEmitter {
    key: LogKey,
    node: Option<String>,
    sink: Arc<dyn IngestSink>,
    clock: Arc<dyn Clock>,
    tracker: Option<DeliveryTracker>,
    sender: Option<String>,
}

impl LogEmitter {
    pub fn new(
        key: LogKey,
        node: Option<String>,
        sink: Arc<dyn IngestSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            key,
            node,
            sink,
            clock,
            tracker: None,
            sender: None,
        }
    }

    pub fn with_tracker(mut self, tracker: DeliveryTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn key(&self) -> &LogKey {
        &self.key
    }

    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }

    pub fn is_tracked(&self) -> bool {
        self.tracker.is_some()
    }

    /// Ship a single line and return the timestamp it was stamped with.
    ///
    /// A trailing line terminator is dropped. On a build-level emitter a line of
    /// the form `node ++ NODE_ID_SEP ++ message` is attributed to that node.
    pub async fn emit(&self, line: &str) -> Result<i64> {
        let line = line.trim_end_matches(['\n', '\r']);
        if line.contains('\n') {
            return Err(EmitError::MultiLine);
        }

        let (node, message) = match &self.node {
            Some(node) => (Some(node.clone()), line),
            None => {
                let (node, message) = split_node(line);
                (node.map(str::to_string), message)
            }
        };

        let record = LogRecord {
            build: self.key.build.clone(),
            node,
            message: message.to_string(),
            sender: self.sender.clone(),
            timestamp: self.clock.epoch_ms(),
        };

        self.sink.send(&self.key.stream, &record).await?;

        if let Some(tracker) = &self.tracker {
            tracker.record(&self.key, record.timestamp);
        }

        tracing::trace!(
            key = %self.key,
            node = ?record.node,
            timestamp = record.timestamp,
            "Emitted log record"
        );
        Ok(record.timestamp)
    }

    /// Byte-oriented writer that splits raw output into lines.
    pub fn line_writer(&self) -> LineWriter<'_> {
        LineWriter::new(self)
    }

    pub async fn flush(&self) -> Result<()> {
        self.sink.flush().await?;
        Ok(())
    }

    /// Flush and close the underlying transport.
    pub async fn close(&self) -> Result<()> {
        self.sink.flush().await?;
        self.sink.close().await?;
        Ok(())
    }
}

/// Diagnostic sender id: `<hostname>:<pid>`.
pub fn default_sender() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.to_str().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown".to_string());
    format!("{}:{}", host, std::process::id())
}
