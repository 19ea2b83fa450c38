pub mod decode;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use decode::{decode_event, decode_stamped, DecodeError, TimestampSource};

/// Separator placed between a node id and its message when a build-level line
/// carries node attribution. U+001F plus a private-use code point keeps it out of
/// ordinary console text.
pub const NODE_ID_SEP: &str = "\u{1f}\u{e000}";

/// Identifies one build's ordered log: the stream it is grouped under plus the
/// build id within that stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LogKey {
    pub stream: String,
    pub build: String,
}

impl LogKey {
    pub fn new(stream: impl Into<String>, build: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            build: build.into(),
        }
    }
}

impl fmt::Display for LogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.stream, self.build)
    }
}

/// One output line as shipped to the ingestion service.
///
/// `timestamp` is epoch milliseconds assigned by the emitter at send time; the
/// store's own timestamps are not trusted to keep millisecond precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub build: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    pub timestamp: i64,
}

impl LogRecord {
    /// Render for a build-level view: `node ++ SEP ++ message`, or the bare
    /// message when the line is not attributed to a step.
    pub fn render_attributed(&self) -> String {
        match &self.node {
            Some(node) => format!("{}{}{}", node, NODE_ID_SEP, self.message),
            None => self.message.clone(),
        }
    }
}

/// Split a line on the first node separator.
///
/// Returns `(None, line)` when the separator is absent.
pub fn split_node(line: &str) -> (Option<&str>, &str) {
    match line.split_once(NODE_ID_SEP) {
        Some((node, message)) => (Some(node), message),
        None => (None, line),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(node: Option<&str>, message: &str) -> LogRecord {
        LogRecord {
            build: "42".to_string(),
            node: node.map(str::to_string),
            message: message.to_string(),
            sender: None,
            timestamp: 1,
        }
    }

    #[test]
    fn test_render_with_node() {
        let rec = record(Some("step1"), "echo hi");
        assert_eq!(rec.render_attributed(), format!("step1{}echo hi", NODE_ID_SEP));
    }

    #[test]
    fn test_render_without_node() {
        assert_eq!(record(None, "Started").render_attributed(), "Started");
    }

    #[test]
    fn test_split_node_uses_first_separator() {
        let line = format!("3{}a{}b", NODE_ID_SEP, NODE_ID_SEP);
        let (node, message) = split_node(&line);
        assert_eq!(node, Some("3"));
        assert_eq!(message, format!("a{}b", NODE_ID_SEP));
    }

    #[test]
    fn test_split_node_absent() {
        assert_eq!(split_node("plain line"), (None, "plain line"));
    }

    #[test]
    fn test_serialized_record_omits_absent_fields() {
        let json = serde_json::to_value(record(None, "Started")).unwrap();
        assert!(json.get("node").is_none());
        assert!(json.get("sender").is_none());
        assert_eq!(json["build"], "42");
        assert_eq!(json["timestamp"], 1);
    }

    #[test]
    fn test_key_display() {
        assert_eq!(LogKey::new("folder/job", "7").to_string(), "folder/job#7");
    }
}
