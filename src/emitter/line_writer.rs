use super::{LogEmitter, Result};

/// Longest line shipped as one record; the store rejects events above 256 KiB.
pub const MAX_LINE_BYTES: usize = 256 * 1024;

/// Splits raw output bytes into lines and emits each complete line.
///
/// Trailing `\n`/`\r` runs are stripped and invalid UTF-8 is replaced. A partial
/// final line is held until [`LineWriter::finish`]. Lines longer than the limit
/// are shipped in pieces, cut on a character boundary.
#[derive(Debug)]
pub struct LineWriter<'a> {
    emitter: &'a LogEmitter,
    pending: Vec<u8>,
    max_line: usize,
}

impl<'a> LineWriter<'a> {
    pub fn new(emitter: &'a LogEmitter) -> Self {
        Self::with_max_line(emitter, MAX_LINE_BYTES)
    }

    pub fn with_max_line(emitter: &'a LogEmitter, max_line: usize) -> Self {
        Self {
            emitter,
            pending: Vec::new(),
            max_line: max_line.max(4),
        }
    }

    /// Returns the number of lines emitted.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        self.pending.extend_from_slice(bytes);
        let mut emitted = 0;
        loop {
            let newline = self.pending.iter().position(|&b| b == b'\n');
            let end = match newline {
                Some(pos) if pos <= self.max_line => pos + 1,
                _ if self.pending.len() > self.max_line => {
                    tracing::debug!(
                        key = %self.emitter.key(),
                        max_line = self.max_line,
                        "Splitting oversized output line"
                    );
                    char_boundary(&self.pending, self.max_line)
                }
                _ => break,
            };
            let line: Vec<u8> = self.pending.drain(..end).collect();
            self.emit_bytes(&line).await?;
            emitted += 1;
        }
        Ok(emitted)
    }

    /// Emit any unterminated trailing line.
    pub async fn finish(mut self) -> Result<()> {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.emit_bytes(&line).await?;
        }
        Ok(())
    }

    async fn emit_bytes(&self, line: &[u8]) -> Result<()> {
        let mut end = line.len();
        while end > 0 && matches!(line[end - 1], b'\n' | b'\r') {
            end -= 1;
        }
        let text = String::from_utf8_lossy(&line[..end]);
        self.emitter.emit(&text).await?;
        Ok(())
    }
}

/// Largest cut point at or below `limit` that does not split a UTF-8
/// sequence. `buf` must be longer than `limit`.
fn char_boundary(buf: &[u8], limit: usize) -> usize {
    let mut cut = limit;
    while cut > 0 && buf[cut] & 0xC0 == 0x80 {
        cut -= 1;
    }
    if cut == 0 {
        limit
    } else {
        cut
    }
}

#[cfg(test)]
mod tests {
    use super::LineWriter;
    use crate::clock::ManualClock;
    use crate::emitter::LogEmitter;
    use crate::record::LogKey;
    use crate::store::MemoryLogStore;
    use std::sync::Arc;

    fn messages(store: &MemoryLogStore) -> Vec<String> {
        store
            .records("job")
            .into_iter()
            .map(|r| r.message)
            .collect()
    }

    #[tokio::test]
    async fn test_splits_chunks_into_lines() {
        let store = MemoryLogStore::new();
        let emitter = LogEmitter::new(
            LogKey::new("job", "1"),
            None,
            Arc::new(store.sink()),
            Arc::new(ManualClock::new(10)),
        );
        let mut writer = emitter.line_writer();

        assert_eq!(writer.write(b"first\r\nsec").await.unwrap(), 1);
        assert_eq!(writer.write(b"ond\n\nthird").await.unwrap(), 2);
        writer.finish().await.unwrap();

        assert_eq!(messages(&store), vec!["first", "second", "", "third"]);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let store = MemoryLogStore::new();
        let emitter = LogEmitter::new(
            LogKey::new("job", "1"),
            None,
            Arc::new(store.sink()),
            Arc::new(ManualClock::new(10)),
        );
        let mut writer = emitter.line_writer();
        writer.write(b"bad \xff byte\n").await.unwrap();
        assert_eq!(messages(&store), vec!["bad \u{fffd} byte"]);
    }

    #[tokio::test]
    async fn test_finish_without_pending_emits_nothing() {
        let store = MemoryLogStore::new();
        let emitter = LogEmitter::new(
            LogKey::new("job", "1"),
            None,
            Arc::new(store.sink()),
            Arc::new(ManualClock::new(10)),
        );
        let mut writer = emitter.line_writer();
        writer.write(b"done\n").await.unwrap();
        writer.finish().await.unwrap();
        assert_eq!(messages(&store), vec!["done"]);
    }

    #[tokio::test]
    async fn test_oversized_line_is_shipped_in_pieces() {
        let store = MemoryLogStore::new();
        let emitter = LogEmitter::new(
            LogKey::new("job", "1"),
            None,
            Arc::new(store.sink()),
            Arc::new(ManualClock::new(10)),
        );
        let mut writer = LineWriter::with_max_line(&emitter, 4);

        assert_eq!(writer.write(b"abcdefghij").await.unwrap(), 2);
        assert_eq!(writer.write(b"\nok\n").await.unwrap(), 2);
        writer.finish().await.unwrap();

        assert_eq!(messages(&store), vec!["abcd", "efgh", "ij", "ok"]);
    }

    #[tokio::test]
    async fn test_oversized_line_cut_keeps_characters_whole() {
        let store = MemoryLogStore::new();
        let emitter = LogEmitter::new(
            LogKey::new("job", "1"),
            None,
            Arc::new(store.sink()),
            Arc::new(ManualClock::new(10)),
        );
        let mut writer = LineWriter::with_max_line(&emitter, 4);

        writer.write("ab\u{20ac}d\n".as_bytes()).await.unwrap();
        assert_eq!(messages(&store), vec!["ab", "\u{20ac}d"]);
    }
}
