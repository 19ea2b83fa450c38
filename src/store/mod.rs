pub mod filter;
pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use thiserror::Error;

pub use filter::{Field, FilterPattern};
pub use http::HttpLogStore;
pub use memory::{MemoryLogStore, MemorySink};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("log store returned error status {status}: {message}")]
    Service { status: u16, message: String },

    #[error("invalid continuation token: {0}")]
    InvalidToken(String),

    #[error("log store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// One page request against a log group / log stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRequest {
    pub log_group: String,
    pub log_stream: String,
    pub pattern: FilterPattern,
    pub next_token: Option<String>,
    pub limit: Option<usize>,
}

impl FilterRequest {
    pub fn new(log_group: impl Into<String>, log_stream: impl Into<String>, pattern: FilterPattern) -> Self {
        Self {
            log_group: log_group.into(),
            log_stream: log_stream.into(),
            pattern,
            next_token: None,
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_next_token(mut self, token: Option<String>) -> Self {
        self.next_token = token;
        self
    }
}

/// An event as the store hands it back. Every field is optional because
/// nothing about the store's metadata is trusted to be present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreEvent {
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub log_stream_name: Option<String>,
    /// Store receipt time, epoch millis. Only used when the payload carries no
    /// timestamp of its own.
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub ingestion_time: Option<i64>,
    /// The shipped record, as a JSON string.
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterPage {
    #[serde(default)]
    pub events: Vec<StoreEvent>,
    #[serde(default)]
    pub next_token: Option<String>,
}

/// Query side of the log backend. Results are eventually consistent with what
/// was shipped, and carry no ordering guarantee within or across pages.
#[async_trait]
pub trait LogStore: Debug + Send + Sync {
    async fn filter_events(&self, request: &FilterRequest) -> Result<FilterPage>;
}
