use super::{IngestSink, SinkError, SinkFactory};
use crate::record::LogRecord;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

#[derive(Debug)]
enum Connection {
    Idle,
    Open(TcpStream),
    Closed,
}

/// Ships records to a Fluentd `in_forward` listener.
///
/// Each record goes out as a JSON forward message `[tag, time, record]`, which
/// `in_forward` accepts alongside msgpack. The connection is opened lazily,
/// dropped on any write failure and reopened by the next send; nothing is
/// retried here.
#[derive(Debug)]
pub struct FluentForwardSink {
    addr: String,
    connect_timeout: Duration,
    conn: Mutex<Connection>,
}

impl FluentForwardSink {
    pub fn new(host: &str, port: u16, connect_timeout: Duration) -> Self {
        Self {
            addr: format!("{}:{}", host, port),
            connect_timeout,
            conn: Mutex::new(Connection::Idle),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn connect(&self) -> Result<TcpStream, SinkError> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| SinkError::ConnectTimeout(self.addr.clone()))?
            .map_err(|source| SinkError::Connect {
                addr: self.addr.clone(),
                source,
            })?;
        stream.set_nodelay(true)?;
        tracing::info!(addr = %self.addr, "Connected to fluentd");
        Ok(stream)
    }
}

/// Opens a [`FluentForwardSink`] with its own connection per emitter.
#[derive(Debug, Clone)]
pub struct FluentForwardFactory {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
}

impl SinkFactory for FluentForwardFactory {
    fn open(&self, _tag: &str) -> Arc<dyn IngestSink> {
        Arc::new(FluentForwardSink::new(
            &self.host,
            self.port,
            self.connect_timeout,
        ))
    }
}

/// Encode one forward-protocol message. Fluentd event time is whole seconds;
/// the exact millisecond stays in the record's own `timestamp`.
pub fn encode_message(tag: &str, record: &LogRecord) -> Result<Vec<u8>, SinkError> {
    let time = record.timestamp.div_euclid(1000);
    let mut buf = serde_json::to_vec(&(tag, time, record))?;
    buf.push(b'\n');
    Ok(buf)
}

#[async_trait]
impl IngestSink for FluentForwardSink {
    async fn send(&self, tag: &str, record: &LogRecord) -> Result<(), SinkError> {
        let message = encode_message(tag, record)?;
        let mut conn = self.conn.lock().await;

        let mut stream = match std::mem::replace(&mut *conn, Connection::Idle) {
            Connection::Open(stream) => stream,
            Connection::Idle => self.connect().await?,
            Connection::Closed => {
                *conn = Connection::Closed;
                return Err(SinkError::Closed);
            }
        };

        if let Err(e) = stream.write_all(&message).await {
            tracing::warn!(addr = %self.addr, error = %e, "Write to fluentd failed, dropping connection");
            return Err(e.into());
        }
        *conn = Connection::Open(stream);
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        let mut conn = self.conn.lock().await;
        match &mut *conn {
            Connection::Open(stream) => stream.flush().await?,
            Connection::Idle => {}
            Connection::Closed => return Err(SinkError::Closed),
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        let mut conn = self.conn.lock().await;
        match std::mem::replace(&mut *conn, Connection::Closed) {
            Connection::Open(mut stream) => {
                stream.flush().await?;
                stream.shutdown().await?;
                tracing::info!(addr = %self.addr, "Closed fluentd connection");
            }
            Connection::Idle | Connection::Closed => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    fn record(message: &str, timestamp: i64) -> LogRecord {
        LogRecord {
            build: "42".to_string(),
            node: Some("3".to_string()),
            message: message.to_string(),
            sender: None,
            timestamp,
        }
    }

    #[test]
    fn test_encode_message_shape() {
        let bytes = encode_message("folder/job", &record("hi", 1_700_000_000_123)).unwrap();
        assert_eq!(bytes.last(), Some(&b'\n'));
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value[0], "folder/job");
        assert_eq!(value[1], 1_700_000_000);
        assert_eq!(value[2]["timestamp"], 1_700_000_000_123_i64);
        assert_eq!(value[2]["node"], "3");
    }

    #[tokio::test]
    async fn test_send_writes_forward_messages() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut lines = BufReader::new(socket).lines();
            let mut received = Vec::new();
            while let Some(line) = lines.next_line().await.unwrap() {
                received.push(line);
            }
            received
        });

        let sink = FluentForwardSink::new("127.0.0.1", port, Duration::from_secs(5));
        sink.send("job", &record("first", 1_000)).await.unwrap();
        sink.send("job", &record("second", 2_000)).await.unwrap();
        sink.close().await.unwrap();

        let received = server.await.unwrap();
        assert_eq!(received.len(), 2);
        assert!(received[0].contains("\"first\""));
        assert!(received[1].contains("\"second\""));
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let sink = FluentForwardSink::new("127.0.0.1", 1, Duration::from_millis(100));
        sink.close().await.unwrap();
        let err = sink.send("job", &record("late", 1)).await.unwrap_err();
        assert!(matches!(err, SinkError::Closed));
    }

    #[tokio::test]
    async fn test_connect_failure_surfaces() {
        // Bind then drop to obtain a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let sink = FluentForwardSink::new("127.0.0.1", port, Duration::from_secs(2));
        let err = sink.send("job", &record("x", 1)).await.unwrap_err();
        assert!(matches!(err, SinkError::Connect { .. } | SinkError::ConnectTimeout(_)));
    }
}
