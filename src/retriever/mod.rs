pub mod view;

use crate::record::{decode_stamped, LogKey, LogRecord, TimestampSource};
use crate::store::{Field, FilterPattern, FilterRequest, LogStore, StoreError};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use view::{BrokenLog, LogView, StoredLog};

#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("log store error: {0}")]
    Store(#[from] StoreError),

    #[error("retrieval cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, RetrieveError>;

/// Which part of a build's log a view covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Build,
    Step(String),
}

impl Scope {
    pub fn node(&self) -> Option<&str> {
        match self {
            Scope::Build => None,
            Scope::Step(node) => Some(node),
        }
    }
}

/// Records gathered by one retrieval, in final order.
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    pub records: Vec<LogRecord>,
    pub pages: usize,
    /// Events skipped because they could not be decoded.
    pub malformed: usize,
    /// Events skipped because they belong to another build. Non-zero means the
    /// store query filtered wrongly.
    pub mismatched: usize,
    /// Timestamps the emitters stamped themselves. Store receipt times used as
    /// a fallback are second-truncated and never land here.
    pub emitter_stamps: HashSet<i64>,
}

impl Retrieval {
    pub fn push(&mut self, record: LogRecord, source: TimestampSource) {
        if source == TimestampSource::Payload {
            self.emitter_stamps.insert(record.timestamp);
        }
        self.records.push(record);
    }

    /// Whether a record carrying this emitter timestamp was fetched.
    pub fn contains_timestamp(&self, timestamp: i64) -> bool {
        self.emitter_stamps.contains(&timestamp)
    }
}

/// Pulls one build's records back out of the log store.
#[derive(Debug, Clone)]
pub struct LogRetriever {
    store: Arc<dyn LogStore>,
    log_group: String,
    key: LogKey,
}

impl LogRetriever {
    pub fn new(store: Arc<dyn LogStore>, log_group: impl Into<String>, key: LogKey) -> Self {
        Self {
            store,
            log_group: log_group.into(),
            key,
        }
    }

    pub fn key(&self) -> &LogKey {
        &self.key
    }

    fn pattern(&self, scope: &Scope) -> FilterPattern {
        let pattern = FilterPattern::new().id_eq(Field::Build, &self.key.build);
        match scope.node() {
            Some(node) => pattern.id_eq(Field::Node, node),
            None => pattern,
        }
    }

    /// Fetch every record in `scope`, ordered by emitter timestamp.
    ///
    /// Pages are walked until the store stops returning a continuation token.
    /// Records sharing a timestamp keep the order the store returned them in.
    /// Any store failure fails the whole fetch; a partial result is never
    /// returned.
    pub async fn fetch(&self, scope: &Scope, cancel: &CancellationToken) -> Result<Retrieval> {
        let mut request = FilterRequest::new(&self.log_group, &self.key.stream, self.pattern(scope));
        let mut retrieval = Retrieval::default();

        loop {
            let page = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetrieveError::Cancelled),
                page = self.store.filter_events(&request) => page?,
            };
            retrieval.pages += 1;

            tracing::debug!(
                key = %self.key,
                page = retrieval.pages,
                events = page.events.len(),
                "Fetched log page"
            );

            for event in page.events {
                let Some(payload) = event.message.as_deref() else {
                    tracing::warn!(key = %self.key, event_id = ?event.event_id, "Skipping event without payload");
                    retrieval.malformed += 1;
                    continue;
                };
                let (record, source) = match decode_stamped(payload, event.timestamp) {
                    Ok(decoded) => decoded,
                    Err(e) => {
                        tracing::warn!(key = %self.key, event_id = ?event.event_id, error = %e, "Skipping malformed event");
                        retrieval.malformed += 1;
                        continue;
                    }
                };
                if record.build != self.key.build {
                    tracing::warn!(
                        key = %self.key,
                        found_build = %record.build,
                        event_id = ?event.event_id,
                        "Store returned an event from another build"
                    );
                    retrieval.mismatched += 1;
                    continue;
                }
                retrieval.push(record, source);
            }

            match page.next_token {
                Some(token) => request = request.with_next_token(Some(token)),
                None => break,
            }
        }

        // Stable, so same-millisecond records keep store order.
        retrieval.records.sort_by_key(|r| r.timestamp);
        Ok(retrieval)
    }
}
