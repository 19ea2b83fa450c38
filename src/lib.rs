//! Ships build log lines to a log-ingestion service and reads them back,
//! ordered and split per step, from an eventually consistent log store.

pub mod bridge;
pub mod cli;
pub mod clock;
pub mod config;
pub mod emitter;
pub mod oracle;
pub mod record;
pub mod retriever;
pub mod sink;
pub mod store;
pub mod watermark;

pub use bridge::{Bridge, BridgeError, BuildLogStorage};
pub use record::{LogKey, LogRecord, NODE_ID_SEP};
pub use retriever::{LogView, Scope};
pub use watermark::DeliveryTracker;
