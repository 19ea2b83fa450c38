use crate::record::LogKey;
use crate::retriever::{RetrieveError, Retrieval, Result};
use crate::store::{Field, FilterPattern, FilterRequest, LogStore};
use crate::watermark::{DeliveryTracker, NO_WATERMARK};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_ATTEMPTS: u32 = 10;
pub const DEFAULT_DELAY: Duration = Duration::from_secs(3);

/// How long to wait for the store to show the last delivered record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatchUpPolicy {
    /// Store queries made before giving up. At least one is always made.
    pub attempts: u32,
    /// Pause between consecutive queries.
    pub delay: Duration,
}

impl Default for CatchUpPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            delay: DEFAULT_DELAY,
        }
    }
}

/// Outcome of checking whether a build's log has caught up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Nothing delivered is waiting to be confirmed.
    NoWatermark,
    /// The store holds the record stamped `watermark`.
    Confirmed { watermark: i64 },
    /// The store never showed `watermark` within the allowed attempts.
    GaveUp { watermark: i64, attempts: u32 },
}

impl Completion {
    pub fn is_complete(&self) -> bool {
        !matches!(self, Completion::GaveUp { .. })
    }
}

#[derive(Debug)]
enum State {
    Start,
    Awaiting { watermark: i64, attempt: u32 },
    Done(Completion),
}

/// Decides whether a log view may be reported complete, by checking the store
/// for the record carrying the build's delivery watermark.
///
/// The check is an exact match on the record's own `timestamp` field; the
/// store's time-range filtering loses sub-second precision.
#[derive(Debug, Clone)]
pub struct CompletionOracle {
    tracker: DeliveryTracker,
    store: Arc<dyn LogStore>,
    log_group: String,
    policy: CatchUpPolicy,
}

impl CompletionOracle {
    pub fn new(
        tracker: DeliveryTracker,
        store: Arc<dyn LogStore>,
        log_group: impl Into<String>,
        policy: CatchUpPolicy,
    ) -> Self {
        Self {
            tracker,
            store,
            log_group: log_group.into(),
            policy,
        }
    }

    pub fn policy(&self) -> CatchUpPolicy {
        self.policy
    }

    /// Settle without querying, using records already fetched.
    ///
    /// Returns `None` when a watermark is outstanding and `retrieval` does not
    /// contain it, meaning the store has to be polled.
    pub fn settle_from(&self, key: &LogKey, retrieval: &Retrieval) -> Option<Completion> {
        match self.tracker.latest(key) {
            NO_WATERMARK => Some(Completion::NoWatermark),
            watermark if retrieval.contains_timestamp(watermark) => {
                self.tracker.resolve(key, watermark);
                Some(Completion::Confirmed { watermark })
            }
            _ => None,
        }
    }

    /// Poll the store until it shows the outstanding watermark or the policy's
    /// attempts run out. Blocks the caller for at most
    /// `(attempts - 1) * delay` plus query time; cancelling `cancel` aborts
    /// the wait with [`RetrieveError::Cancelled`].
    pub async fn settle(&self, key: &LogKey, cancel: &CancellationToken) -> Result<Completion> {
        let attempts = self.policy.attempts.max(1);
        let mut state = State::Start;

        loop {
            state = match state {
                State::Start => match self.tracker.latest(key) {
                    NO_WATERMARK => State::Done(Completion::NoWatermark),
                    watermark => State::Awaiting {
                        watermark,
                        attempt: 0,
                    },
                },
                State::Awaiting { watermark, attempt } => {
                    if attempt > 0 {
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return Err(RetrieveError::Cancelled),
                            _ = tokio::time::sleep(self.policy.delay) => {}
                        }
                    }

                    if self.probe(key, watermark, cancel).await? {
                        self.tracker.resolve(key, watermark);
                        State::Done(Completion::Confirmed { watermark })
                    } else if attempt + 1 >= attempts {
                        tracing::info!(
                            log_group = %self.log_group,
                            key = %key,
                            watermark,
                            attempts,
                            "Gave up waiting for log store to contain event"
                        );
                        State::Done(Completion::GaveUp {
                            watermark,
                            attempts,
                        })
                    } else {
                        tracing::debug!(
                            log_group = %self.log_group,
                            key = %key,
                            watermark,
                            attempt = attempt + 1,
                            "Waiting for log store to contain event"
                        );
                        State::Awaiting {
                            watermark,
                            attempt: attempt + 1,
                        }
                    }
                }
                State::Done(completion) => return Ok(completion),
            };
        }
    }

    /// One store query for the record stamped `watermark`.
    async fn probe(&self, key: &LogKey, watermark: i64, cancel: &CancellationToken) -> Result<bool> {
        let pattern = FilterPattern::new()
            .text_eq(Field::Build, key.build.clone())
            .number_eq(Field::Timestamp, watermark);
        let request = FilterRequest::new(&self.log_group, &key.stream, pattern).with_limit(1);

        let page = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetrieveError::Cancelled),
            page = self.store.filter_events(&request) => page?,
        };
        Ok(!page.events.is_empty())
    }
}
