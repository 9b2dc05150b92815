//! Stream-based report source.
//!
//! Receives newline-delimited JSON reports from async byte streams, such as
//! the TCP connections `Output::Tcp` opens for every report.

use std::sync::Arc;

use freezewatch_types::LongEventReport;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::ReportSource;

/// A report source fed by background tasks reading async streams.
///
/// Must be created inside a tokio runtime.
///
/// # Example with a byte stream
///
/// ```
/// use std::io::Cursor;
/// use freezewatch::StreamSource;
///
/// # tokio_test::block_on(async {
/// let stream = Cursor::new(b"".to_vec());
/// let source = StreamSource::spawn(stream, "example");
/// # });
/// ```
#[derive(Debug)]
pub struct StreamSource {
    receiver: mpsc::Receiver<LongEventReport>,
    description: String,
    last_error: Arc<Mutex<Option<String>>>,
}

impl StreamSource {
    /// Spawn a task that reads reports from a single reader until EOF.
    pub fn spawn<R>(reader: R, description: &str) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(64);
        let last_error = Arc::new(Mutex::new(None));
        tokio::spawn(read_reports(reader, tx, last_error.clone()));

        Self {
            receiver: rx,
            description: format!("stream: {}", description),
            last_error,
        }
    }

    /// Accept connections on `addr`, reading reports from each one.
    ///
    /// This is the receiving end of `Output::Tcp`.
    pub async fn listen(addr: &str) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;
        let (tx, rx) = mpsc::channel(64);
        let last_error = Arc::new(Mutex::new(None));
        let error_handle = last_error.clone();

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        debug!(%peer, "report connection accepted");
                        tokio::spawn(read_reports(stream, tx.clone(), error_handle.clone()));
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        *error_handle.lock() = Some(format!("Accept error: {}", e));
                    }
                }
                if tx.is_closed() {
                    break;
                }
            }
        });

        Ok(Self {
            receiver: rx,
            description: format!("listening: {}", local),
            last_error,
        })
    }
}

async fn read_reports<R>(
    reader: R,
    tx: mpsc::Sender<LongEventReport>,
    last_error: Arc<Mutex<Option<String>>>,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => match serde_json::from_str::<LongEventReport>(&line) {
                Ok(report) => {
                    if tx.send(report).await.is_err() {
                        break;
                    }
                }
                Err(e) => *last_error.lock() = Some(format!("Parse error: {}", e)),
            },
            Ok(None) => break,
            Err(e) => {
                *last_error.lock() = Some(format!("Read error: {}", e));
                break;
            }
        }
    }
}

impl ReportSource for StreamSource {
    fn poll(&mut self) -> Vec<LongEventReport> {
        let mut reports = Vec::new();
        while let Ok(report) = self.receiver.try_recv() {
            reports.push(report);
        }
        reports
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::AsyncWriteExt;
    use tokio::time::{sleep, Duration};

    fn report_line(duration_ms: u64) -> String {
        let report = LongEventReport::builder()
            .start_time_ms(1_703_160_000_000)
            .duration_ms(duration_ms)
            .build();
        serde_json::to_string(&report).unwrap()
    }

    #[tokio::test]
    async fn test_stream_source_reads_every_line() {
        let data = format!("{}\n\n{}\n", report_line(600), report_line(900));
        let mut source = StreamSource::spawn(Cursor::new(data), "test");

        sleep(Duration::from_millis(50)).await;

        let reports = source.poll();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1].duration.as_millis(), 900);
        assert!(source.poll().is_empty());
    }

    #[tokio::test]
    async fn test_stream_source_skips_invalid_lines() {
        let data = format!("not valid json\n{}\n", report_line(600));
        let mut source = StreamSource::spawn(Cursor::new(data), "test");

        sleep(Duration::from_millis(50)).await;

        assert_eq!(source.poll().len(), 1);
        assert!(source.error().unwrap().starts_with("Parse error"));
    }

    #[tokio::test]
    async fn test_stream_source_description() {
        let source = StreamSource::spawn(Cursor::new(""), "tcp://localhost:9090");
        assert_eq!(source.description(), "stream: tcp://localhost:9090");
    }

    #[tokio::test]
    async fn test_listen_accepts_report_connections() {
        let mut source = StreamSource::listen("127.0.0.1:0").await.unwrap();
        let addr = source.description().trim_start_matches("listening: ").to_string();

        for duration in [600, 700] {
            let mut conn = tokio::net::TcpStream::connect(&addr).await.unwrap();
            conn.write_all(format!("{}\n", report_line(duration)).as_bytes())
                .await
                .unwrap();
        }

        let mut received = Vec::new();
        for _ in 0..50 {
            received.extend(source.poll());
            if received.len() == 2 {
                break;
            }
            sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(received.len(), 2);
    }
}
