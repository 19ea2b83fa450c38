pub mod name;

use crate::clock::{Clock, SystemClock};
use crate::config::{BridgeConfig, ConfigError};
use crate::emitter::{default_sender, LogEmitter};
use crate::oracle::{CatchUpPolicy, CompletionOracle};
use crate::record::LogKey;
use crate::retriever::{BrokenLog, LogRetriever, LogView, RetrieveError, Scope, StoredLog};
use crate::sink::{FluentForwardFactory, SinkFactory};
use crate::store::{HttpLogStore, LogStore, StoreError};
use crate::watermark::DeliveryTracker;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use name::parse_build_name;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("{0} is not in expected format")]
    InvalidBuildName(String),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("log store error: {0}")]
    Store(#[from] StoreError),
}

/// Connects builds to the log backend: emitters for writing, retrievers for
/// reading back, and the shared delivery watermark table between them.
#[derive(Debug, Clone)]
pub struct Bridge {
    log_group: String,
    sinks: Arc<dyn SinkFactory>,
    store: Arc<dyn LogStore>,
    tracker: DeliveryTracker,
    clock: Arc<dyn Clock>,
    policy: CatchUpPolicy,
    sender: String,
    track_deliveries: bool,
}

impl Bridge {
    pub fn new(
        log_group: impl Into<String>,
        sinks: Arc<dyn SinkFactory>,
        store: Arc<dyn LogStore>,
    ) -> Self {
        Self {
            log_group: log_group.into(),
            sinks,
            store,
            tracker: DeliveryTracker::new(),
            clock: Arc::new(SystemClock),
            policy: CatchUpPolicy::default(),
            sender: default_sender(),
            track_deliveries: true,
        }
    }

    /// Bridge onto a Fluentd forwarder and a CloudWatch-compatible store.
    pub fn from_config(config: &BridgeConfig) -> Result<Self, BridgeError> {
        let sinks = FluentForwardFactory {
            host: config.fluentd.host.clone(),
            port: config.fluentd.port,
            connect_timeout: config.fluentd.connect_timeout,
        };
        let store = HttpLogStore::new(&config.store.endpoint, config.store.request_timeout)?;

        tracing::info!(
            fluentd = %format!("{}:{}", config.fluentd.host, config.fluentd.port),
            store = %config.store.endpoint,
            log_group = %config.store.log_group,
            "Configured log bridge"
        );

        Ok(Self::new(config.store.log_group.clone(), Arc::new(sinks), Arc::new(store))
            .with_policy(CatchUpPolicy::from(&config.catch_up))
            .with_delivery_tracking(config.track_deliveries))
    }

    pub fn with_tracker(mut self, tracker: DeliveryTracker) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_policy(mut self, policy: CatchUpPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = sender.into();
        self
    }

    /// Whether emitters created here record delivery watermarks. Disable on
    /// remote agents.
    pub fn with_delivery_tracking(mut self, enabled: bool) -> Self {
        self.track_deliveries = enabled;
        self
    }

    pub fn tracker(&self) -> &DeliveryTracker {
        &self.tracker
    }

    pub fn log_group(&self) -> &str {
        &self.log_group
    }

    /// Storage handle for one build, addressed by its name (`stream/build/`).
    pub fn for_build(&self, name: &str) -> Result<BuildLogStorage, BridgeError> {
        let key = parse_build_name(name)?;
        Ok(BuildLogStorage {
            bridge: self.clone(),
            key,
        })
    }

    /// Build-level emitter.
    pub fn logger_for(&self, name: &str) -> Result<LogEmitter, BridgeError> {
        Ok(self.for_build(name)?.overall_listener())
    }

    /// Step-level emitter.
    pub fn logger_for_step(&self, name: &str, step: &str) -> Result<LogEmitter, BridgeError> {
        Ok(self.for_build(name)?.node_listener(step))
    }

    /// Full build log. Never fails: problems come back as a broken view.
    pub async fn overall_log(
        &self,
        name: &str,
        complete_hint: bool,
        cancel: &CancellationToken,
    ) -> LogView {
        match self.for_build(name) {
            Ok(storage) => storage.overall_log(complete_hint, cancel).await,
            Err(e) => broken(name, e.to_string(), complete_hint),
        }
    }

    /// One step's log. Never fails: problems come back as a broken view.
    pub async fn step_log(
        &self,
        name: &str,
        step: &str,
        complete_hint: bool,
        cancel: &CancellationToken,
    ) -> LogView {
        match self.for_build(name) {
            Ok(storage) => storage.step_log(step, complete_hint, cancel).await,
            Err(e) => broken(name, e.to_string(), complete_hint),
        }
    }
}

fn broken(name: &str, reason: String, complete_hint: bool) -> LogView {
    tracing::warn!(build = %name, error = %reason, "Serving broken log view");
    LogView::Broken(BrokenLog::new(reason, complete_hint))
}

/// Log storage bound to one build.
#[derive(Debug, Clone)]
pub struct BuildLogStorage {
    bridge: Bridge,
    key: LogKey,
}

impl BuildLogStorage {
    pub fn key(&self) -> &LogKey {
        &self.key
    }

    pub fn overall_listener(&self) -> LogEmitter {
        self.emitter(None)
    }

    pub fn node_listener(&self, node: &str) -> LogEmitter {
        self.emitter(Some(node.to_string()))
    }

    fn emitter(&self, node: Option<String>) -> LogEmitter {
        let bridge = &self.bridge;
        let emitter = LogEmitter::new(
            self.key.clone(),
            node,
            bridge.sinks.open(&self.key.stream),
            bridge.clock.clone(),
        )
        .with_sender(bridge.sender.clone());
        if bridge.track_deliveries {
            emitter.with_tracker(bridge.tracker.clone())
        } else {
            emitter
        }
    }

    pub async fn overall_log(&self, complete_hint: bool, cancel: &CancellationToken) -> LogView {
        self.view(Scope::Build, complete_hint, cancel).await
    }

    pub async fn step_log(
        &self,
        node: &str,
        complete_hint: bool,
        cancel: &CancellationToken,
    ) -> LogView {
        self.view(Scope::Step(node.to_string()), complete_hint, cancel)
            .await
    }

    async fn view(&self, scope: Scope, complete_hint: bool, cancel: &CancellationToken) -> LogView {
        match self.read(scope, complete_hint, cancel).await {
            Ok(log) => LogView::Stored(log),
            Err(e) => broken(&self.key.to_string(), e.to_string(), complete_hint),
        }
    }

    /// Fetch right away; only the completeness flag depends on the store
    /// having caught up with the delivery watermark.
    pub async fn read(
        &self,
        scope: Scope,
        complete_hint: bool,
        cancel: &CancellationToken,
    ) -> Result<StoredLog, RetrieveError> {
        let bridge = &self.bridge;
        let retriever = LogRetriever::new(bridge.store.clone(), &bridge.log_group, self.key.clone());
        let retrieval = retriever.fetch(&scope, cancel).await?;

        if !complete_hint {
            return Ok(StoredLog::new(self.key.clone(), scope, retrieval, false));
        }

        let oracle = CompletionOracle::new(
            bridge.tracker.clone(),
            bridge.store.clone(),
            &bridge.log_group,
            bridge.policy,
        );

        if let Some(completion) = oracle.settle_from(&self.key, &retrieval) {
            return Ok(StoredLog::new(
                self.key.clone(),
                scope,
                retrieval,
                completion.is_complete(),
            ));
        }

        let completion = oracle.settle(&self.key, cancel).await?;
        if completion.is_complete() {
            // The first fetch predates the confirmed record.
            let retrieval = retriever.fetch(&scope, cancel).await?;
            Ok(StoredLog::new(self.key.clone(), scope, retrieval, true))
        } else {
            Ok(StoredLog::new(self.key.clone(), scope, retrieval, false))
        }
    }
}
