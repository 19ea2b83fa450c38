pub mod fluent;

use crate::record::LogRecord;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;

pub use fluent::{FluentForwardFactory, FluentForwardSink};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out connecting to {0}")]
    ConnectTimeout(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("sink is closed")]
    Closed,

    #[error("ingestion rejected record: {0}")]
    Rejected(String),
}

/// Ingestion side of the log backend.
///
/// `send` returns once the record has been handed to the transport; a returned
/// `Ok` is what allows the emitter to advance the delivery watermark.
#[async_trait]
pub trait IngestSink: Debug + Send + Sync {
    async fn send(&self, tag: &str, record: &LogRecord) -> Result<(), SinkError>;

    async fn flush(&self) -> Result<(), SinkError>;

    /// Flush and release the transport. Later sends fail with [`SinkError::Closed`].
    async fn close(&self) -> Result<(), SinkError>;
}

/// Opens one sink per emitter so that closing one build's output never closes
/// another's.
pub trait SinkFactory: Debug + Send + Sync {
    fn open(&self, tag: &str) -> Arc<dyn IngestSink>;
}
