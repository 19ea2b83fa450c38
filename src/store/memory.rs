use super::{FilterPage, FilterRequest, LogStore, Result, StoreError, StoreEvent};
use crate::record::{decode_event, LogRecord};
use crate::sink::{IngestSink, SinkError, SinkFactory};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug)]
struct Entry {
    stream: String,
    event: StoreEvent,
    /// The entry shows up once the query count exceeds this.
    visible_after: u64,
}

#[derive(Debug)]
struct Inner {
    entries: Vec<Entry>,
    queries: u64,
    visibility_lag: u64,
    page_size: usize,
    scramble: bool,
    fail_sends: bool,
    /// Number of queries allowed to succeed before every later one fails.
    query_budget: Option<u64>,
    next_ingestion_time: i64,
}

/// In-process log backend: an [`IngestSink`] on one side and a [`LogStore`] on
/// the other, with knobs for the ways a real backend misbehaves (late
/// visibility, unordered pages, transport faults).
///
/// Clones share the same events.
#[derive(Debug, Clone)]
pub struct MemoryLogStore {
    inner: Arc<Mutex<Inner>>,
}

impl Default for MemoryLogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: Vec::new(),
                queries: 0,
                visibility_lag: 0,
                page_size: DEFAULT_PAGE_SIZE,
                scramble: false,
                fail_sends: false,
                query_budget: None,
                next_ingestion_time: 1,
            })),
        }
    }

    /// Events stored from now on become visible only after this many further
    /// queries. `u64::MAX` keeps them hidden for good.
    pub fn with_visibility_lag(self, queries: u64) -> Self {
        self.lock().visibility_lag = queries;
        self
    }

    pub fn with_page_size(self, page_size: usize) -> Self {
        self.lock().page_size = page_size.max(1);
        self
    }

    /// Serve matches newest-first, so callers cannot rely on store order.
    pub fn with_scrambled_order(self) -> Self {
        self.lock().scramble = true;
        self
    }

    pub fn fail_sends(&self, fail: bool) {
        self.lock().fail_sends = fail;
    }

    /// Let `budget` more queries succeed, then fail every later one.
    pub fn fail_queries_after(&self, budget: u64) {
        let mut inner = self.lock();
        inner.query_budget = Some(inner.queries + budget);
    }

    pub fn set_visibility_lag(&self, queries: u64) {
        self.lock().visibility_lag = queries;
    }

    /// Make every stored event visible to the next query.
    pub fn reveal_all(&self) {
        let mut inner = self.lock();
        inner.visibility_lag = 0;
        for entry in &mut inner.entries {
            entry.visible_after = 0;
        }
    }

    /// Store a raw payload as if some other shipper had sent it.
    pub fn insert_raw(&self, stream: &str, payload: &str, timestamp: Option<i64>) {
        let mut inner = self.lock();
        let ingestion_time = inner.next_ingestion_time;
        inner.next_ingestion_time += 1;
        let visible_after = inner.queries.saturating_add(inner.visibility_lag);
        inner.entries.push(Entry {
            stream: stream.to_string(),
            event: StoreEvent {
                event_id: Some(Uuid::new_v4().to_string()),
                log_stream_name: Some(stream.to_string()),
                timestamp,
                ingestion_time: Some(ingestion_time),
                message: Some(payload.to_string()),
            },
            visible_after,
        });
    }

    /// Every decodable record shipped to `stream`, visible or not, in arrival order.
    pub fn records(&self, stream: &str) -> Vec<LogRecord> {
        self.lock()
            .entries
            .iter()
            .filter(|e| e.stream == stream)
            .filter_map(|e| {
                let payload = e.event.message.as_deref()?;
                decode_event(payload, e.event.timestamp).ok()
            })
            .collect()
    }

    pub fn query_count(&self) -> u64 {
        self.lock().queries
    }

    /// A sink handle with its own open/closed state.
    pub fn sink(&self) -> MemorySink {
        MemorySink {
            store: self.clone(),
            closed: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn parse_token(token: Option<&str>) -> Result<usize> {
    match token {
        None => Ok(0),
        Some(t) => t
            .strip_prefix("offset:")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| StoreError::InvalidToken(t.to_string())),
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn filter_events(&self, request: &FilterRequest) -> Result<FilterPage> {
        let mut inner = self.lock();
        inner.queries += 1;
        let query = inner.queries;

        if let Some(budget) = inner.query_budget {
            if query > budget {
                return Err(StoreError::Unavailable(format!(
                    "injected failure on query {}",
                    query
                )));
            }
        }

        let mut matching: Vec<&StoreEvent> = inner
            .entries
            .iter()
            .filter(|e| e.stream == request.log_stream)
            .filter(|e| query > e.visible_after)
            .filter(|e| {
                if request.pattern.is_empty() {
                    return true;
                }
                e.event
                    .message
                    .as_deref()
                    .and_then(|m| serde_json::from_str(m).ok())
                    .is_some_and(|payload| request.pattern.matches(&payload))
            })
            .map(|e| &e.event)
            .collect();

        if inner.scramble {
            matching.reverse();
        }

        let offset = parse_token(request.next_token.as_deref())?;
        let page_size = request
            .limit
            .map_or(inner.page_size, |limit| limit.min(inner.page_size));
        let end = (offset + page_size).min(matching.len());

        let events = matching
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|e| (*e).clone())
            .collect();
        let next_token = (end < matching.len() && request.limit.is_none())
            .then(|| format!("offset:{}", end));

        Ok(FilterPage { events, next_token })
    }
}

impl SinkFactory for MemoryLogStore {
    fn open(&self, _tag: &str) -> Arc<dyn IngestSink> {
        Arc::new(self.sink())
    }
}

/// Write handle onto a [`MemoryLogStore`].
#[derive(Debug)]
pub struct MemorySink {
    store: MemoryLogStore,
    closed: AtomicBool,
}

#[async_trait]
impl IngestSink for MemorySink {
    async fn send(&self, tag: &str, record: &LogRecord) -> std::result::Result<(), SinkError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SinkError::Closed);
        }
        if self.store.lock().fail_sends {
            return Err(SinkError::Rejected("injected send failure".to_string()));
        }
        let payload = serde_json::to_string(record)?;
        // Store receipt time drops the milliseconds, like the real pipeline does.
        let receipt = record.timestamp - record.timestamp.rem_euclid(1000);
        self.store.insert_raw(tag, &payload, Some(receipt));
        Ok(())
    }

    async fn flush(&self) -> std::result::Result<(), SinkError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SinkError::Closed);
        }
        Ok(())
    }

    async fn close(&self) -> std::result::Result<(), SinkError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
