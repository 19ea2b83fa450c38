use super::{Retrieval, Scope};
use crate::record::{LogKey, LogRecord};

/// The result of asking for a build's log: either records rendered from the
/// store, or a placeholder explaining why they could not be loaded.
#[derive(Debug, Clone)]
pub enum LogView {
    Stored(StoredLog),
    Broken(BrokenLog),
}

impl LogView {
    /// Whether the producer believes no more lines will arrive.
    pub fn is_complete(&self) -> bool {
        match self {
            LogView::Stored(log) => log.is_complete(),
            LogView::Broken(log) => log.complete,
        }
    }

    pub fn is_broken(&self) -> bool {
        matches!(self, LogView::Broken(_))
    }

    pub fn text(&self) -> &str {
        match self {
            LogView::Stored(log) => log.text(),
            LogView::Broken(log) => &log.text,
        }
    }

    /// Rendered bytes from byte offset `start`; empty past the end.
    pub fn bytes_from(&self, start: usize) -> &[u8] {
        self.text().as_bytes().get(start..).unwrap_or_default()
    }

    pub fn as_stored(&self) -> Option<&StoredLog> {
        match self {
            LogView::Stored(log) => Some(log),
            LogView::Broken(_) => None,
        }
    }
}

/// Ordered records for one build or one step, rendered once on construction.
///
/// Build views render `node ++ NODE_ID_SEP ++ message` for attributed lines;
/// step views render bare messages.
#[derive(Debug, Clone)]
pub struct StoredLog {
    key: LogKey,
    scope: Scope,
    records: Vec<LogRecord>,
    complete: bool,
    malformed: usize,
    text: String,
}

impl StoredLog {
    pub fn new(key: LogKey, scope: Scope, retrieval: Retrieval, complete: bool) -> Self {
        let records = match &scope {
            Scope::Build => retrieval.records,
            Scope::Step(node) => retrieval
                .records
                .into_iter()
                .filter(|r| r.node.as_deref() == Some(node.as_str()))
                .collect(),
        };
        let text = render(&scope, &records);
        Self {
            key,
            scope,
            records,
            complete,
            malformed: retrieval.malformed + retrieval.mismatched,
            text,
        }
    }

    pub fn key(&self) -> &LogKey {
        &self.key
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Events dropped while building this view.
    pub fn skipped(&self) -> usize {
        self.malformed
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.lines()
    }

    pub fn bytes_from(&self, start: usize) -> &[u8] {
        self.text.as_bytes().get(start..).unwrap_or_default()
    }

    /// Narrow a build view to one step without going back to the store.
    pub fn project(&self, node: &str) -> StoredLog {
        let retrieval = Retrieval {
            records: self.records.clone(),
            ..Retrieval::default()
        };
        StoredLog::new(
            self.key.clone(),
            Scope::Step(node.to_string()),
            retrieval,
            self.complete,
        )
    }
}

fn render(scope: &Scope, records: &[LogRecord]) -> String {
    let mut out = String::new();
    for record in records {
        match scope {
            Scope::Build => out.push_str(&record.render_attributed()),
            Scope::Step(_) => out.push_str(&record.message),
        }
        out.push('\n');
    }
    out
}

/// Stands in for a log that could not be loaded, so one build's failure shows
/// up in that build's view only.
#[derive(Debug, Clone)]
pub struct BrokenLog {
    pub reason: String,
    pub complete: bool,
    text: String,
}

impl BrokenLog {
    pub fn new(reason: impl Into<String>, complete: bool) -> Self {
        let reason = reason.into();
        let text = format!("Log unavailable: {}\n", reason);
        Self {
            reason,
            complete,
            text,
        }
    }
}
