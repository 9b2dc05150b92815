//! Built-in report destinations and the human-readable report format.

use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use freezewatch_types::{LockInfo, LongEventReport, ThreadStack};
use tracing::{error, warn};

use crate::error::LoggerError;
use crate::logger::EventLogger;

/// Bound on connecting to an `Output::Tcp` endpoint, which runs on the
/// monitor thread.
const TCP_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

fn connect(addr: &str) -> Option<TcpStream> {
    addr.to_socket_addrs()
        .ok()?
        .find_map(|socket| TcpStream::connect_timeout(&socket, TCP_CONNECT_TIMEOUT).ok())
}

/// Destination for long event reports.
///
/// Every variant is an [`EventLogger`], so outputs can be registered with
/// `EventLoopMonitor::add_logger` directly.
#[derive(Debug)]
pub enum Output {
    /// Render the report as text and emit it through `tracing`.
    ///
    /// Completed events are logged at `WARN`, still-running ones at `ERROR`.
    /// This is the logger enabled by `MonitorParameters::log_locally`.
    Tracing,

    /// Append each report to a file as one line of JSON.
    File(PathBuf),

    /// Send each report to a TCP server as newline-delimited JSON.
    ///
    /// Delivery is best effort: connection failures are ignored.
    Tcp(String),

    /// Send reports through a channel.
    ///
    /// Use `Output::channel()` to create this variant and get the receiver.
    #[cfg(feature = "tokio")]
    Channel(tokio::sync::mpsc::Sender<LongEventReport>),
}

impl Output {
    /// Create a JSON lines file output.
    ///
    /// # Example
    ///
    /// ```rust
    /// use freezewatch_sdk::Output;
    ///
    /// let output = Output::file("freezes.jsonl");
    /// ```
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Output::File(path.into())
    }

    /// Create a TCP output.
    pub fn tcp(addr: impl Into<String>) -> Self {
        Output::Tcp(addr.into())
    }

    /// Create a channel output and return both the output and receiver.
    ///
    /// Reports are dropped when the channel is full; the output is removed
    /// from the monitor once the receiver is dropped.
    ///
    /// # Example
    ///
    /// ```rust
    /// use freezewatch_sdk::Output;
    ///
    /// let (output, mut rx) = Output::channel(16);
    ///
    /// // Later, on any thread or task:
    /// // while let Some(report) = rx.blocking_recv() { ... }
    /// ```
    #[cfg(feature = "tokio")]
    pub fn channel(
        buffer: usize,
    ) -> (Self, tokio::sync::mpsc::Receiver<LongEventReport>) {
        let (tx, rx) = tokio::sync::mpsc::channel(buffer);
        (Output::Channel(tx), rx)
    }
}

impl EventLogger for Output {
    fn log(&self, report: &LongEventReport) -> Result<(), LoggerError> {
        match self {
            Output::Tracing => {
                let text = format_report(report);
                if report.still_running {
                    error!(
                        start_time_ms = report.start_time_ms,
                        duration_ms = report.duration.as_millis(),
                        samples = report.samples.len(),
                        "{}",
                        text
                    );
                } else {
                    warn!(
                        start_time_ms = report.start_time_ms,
                        duration_ms = report.duration.as_millis(),
                        samples = report.samples.len(),
                        "{}",
                        text
                    );
                }
            }
            Output::File(path) => {
                let json = serde_json::to_string(report)?;
                let mut file = OpenOptions::new().create(true).append(true).open(path)?;
                writeln!(file, "{}", json)?;
            }
            Output::Tcp(addr) => {
                // Best effort
                if let Some(mut stream) = connect(addr) {
                    let _ = stream.set_write_timeout(Some(Duration::from_secs(1)));
                    let json = serde_json::to_string(report)?;
                    let _ = stream.write_all(json.as_bytes());
                    let _ = stream.write_all(b"\n");
                }
            }
            #[cfg(feature = "tokio")]
            Output::Channel(tx) => {
                use tokio::sync::mpsc::error::TrySendError;

                match tx.try_send(report.clone()) {
                    Ok(()) | Err(TrySendError::Full(_)) => {}
                    Err(TrySendError::Closed(_)) => return Err(LoggerError::Closed),
                }
            }
        }
        Ok(())
    }
}

/// Render a report with wall-clock times in the local timezone.
pub fn format_report(report: &LongEventReport) -> String {
    render(report, |ms| {
        DateTime::<Utc>::from_timestamp_millis(ms as i64)
            .map(|t| t.with_timezone(&Local).format("%H:%M:%S%.3f").to_string())
            .unwrap_or_else(|| ms.to_string())
    })
}

/// Render a report with wall-clock times in UTC.
pub fn format_report_utc(report: &LongEventReport) -> String {
    render(report, |ms| {
        DateTime::<Utc>::from_timestamp_millis(ms as i64)
            .map(|t| t.format("%H:%M:%S%.3f").to_string())
            .unwrap_or_else(|| ms.to_string())
    })
}

fn render(report: &LongEventReport, time: impl Fn(u64) -> String) -> String {
    let mut out = String::new();
    let secs = report.duration.as_secs_f64();

    if report.still_running {
        let _ = writeln!(
            out,
            "Possible UI deadlock: UI thread unresponsive for {:.2}s since {}",
            secs,
            time(report.start_time_ms)
        );
    } else {
        let _ = writeln!(out, "UI freeze of {:.2}s at {}", secs, time(report.start_time_ms));
    }

    for sample in &report.samples {
        let delta = sample.timestamp_ms.saturating_sub(report.start_time_ms) as f64 / 1000.0;
        let _ = writeln!(
            out,
            "Sample at {} (+{:.3}s)",
            time(sample.timestamp_ms),
            delta
        );
        for thread in &sample.threads {
            render_thread(&mut out, thread);
        }
    }

    // Drop the trailing newline so log sinks don't print an empty line.
    if out.ends_with('\n') {
        out.pop();
    }
    out
}

fn render_thread(out: &mut String, thread: &ThreadStack) {
    let _ = writeln!(
        out,
        "Thread \"{}\" id={} state={}",
        thread.name,
        thread.id,
        thread.state.label()
    );
    if let Some(lock) = &thread.waiting_on {
        let _ = writeln!(out, "  waiting for: {}", describe_lock(lock));
    }
    for frame in &thread.frames {
        let _ = writeln!(out, "  at {}", frame);
    }
    for lock in &thread.held_locks {
        let _ = writeln!(out, "  holds: {}", describe_lock(lock));
    }
}

fn describe_lock(lock: &LockInfo) -> String {
    match (&lock.owner_name, lock.owner_id) {
        (Some(name), Some(id)) => format!("{} owned by \"{}\" id={}", lock.name, name, id),
        (Some(name), None) => format!("{} owned by \"{}\"", lock.name, name),
        _ => lock.name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freezewatch_types::{StackFrame, ThreadState};
    use std::io::BufRead;

    // 2023-12-21 12:00:00.000 UTC
    const START: u64 = 1_703_160_000_000;

    fn sample_report(still_running: bool) -> LongEventReport {
        LongEventReport::builder()
            .start_time_ms(START)
            .duration_ms(1_250)
            .still_running(still_running)
            .sample(START + 500, |s| {
                s.thread(
                    ThreadStack::new(1, "main")
                        .state(ThreadState::Blocked)
                        .waiting_on(LockInfo::new("IndexLock").owned_by("indexer", 4))
                        .frame(StackFrame::new("app.Editor", "reflow").at("editor.rs", 10))
                        .frame(StackFrame::new("app.Shell", "dispatch"))
                        .holding(LockInfo::new("ModelLock")),
                )
                .thread(ThreadStack::new(4, "indexer").frame(StackFrame::new("idx.Index", "build")))
            })
            .build()
    }

    #[test]
    fn completed_report_layout() {
        let text = format_report_utc(&sample_report(false));
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(
            lines,
            [
                "UI freeze of 1.25s at 12:00:00.000",
                "Sample at 12:00:00.500 (+0.500s)",
                "Thread \"main\" id=1 state=BLOCKED",
                "  waiting for: IndexLock owned by \"indexer\" id=4",
                "  at app.Editor.reflow(editor.rs:10)",
                "  at app.Shell.dispatch",
                "  holds: ModelLock",
                "Thread \"indexer\" id=4 state=RUNNABLE",
                "  at idx.Index.build",
            ]
        );
    }

    #[test]
    fn still_running_report_has_deadlock_header() {
        let text = format_report_utc(&sample_report(true));
        assert!(text.starts_with(
            "Possible UI deadlock: UI thread unresponsive for 1.25s since 12:00:00.000"
        ));
    }

    #[test]
    fn local_format_has_same_shape() {
        let text = format_report(&sample_report(false));
        assert!(text.starts_with("UI freeze of 1.25s at "));
        assert!(!text.ends_with('\n'));
    }

    #[test]
    fn file_output_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("freezes.jsonl");
        let output = Output::file(&path);

        output.log(&sample_report(false)).unwrap();
        output.log(&sample_report(true)).unwrap();

        let file = std::fs::File::open(&path).unwrap();
        let reports: Vec<LongEventReport> = std::io::BufReader::new(file)
            .lines()
            .map(|line| serde_json::from_str(&line.unwrap()).unwrap())
            .collect();

        assert_eq!(reports.len(), 2);
        assert!(!reports[0].still_running);
        assert!(reports[1].still_running);
        assert_eq!(reports[0], sample_report(false));
    }

    #[test]
    fn file_output_fails_for_missing_directory() {
        let output = Output::file("/nonexistent/dir/freezes.jsonl");
        assert!(matches!(
            output.log(&sample_report(false)),
            Err(LoggerError::Io(_))
        ));
    }

    #[test]
    fn tcp_output_ignores_unreachable_server() {
        let output = Output::tcp("127.0.0.1:1");
        assert!(output.log(&sample_report(false)).is_ok());
    }

    #[test]
    fn tcp_output_gives_up_on_unresponsive_address() {
        // Non-routable, so the connect either fails fast or times out
        let output = Output::tcp("10.255.255.1:7878");
        let started = std::time::Instant::now();
        assert!(output.log(&sample_report(false)).is_ok());
        assert!(started.elapsed() < TCP_CONNECT_TIMEOUT * 3);
    }

    #[test]
    fn tcp_output_ignores_unresolvable_address() {
        assert!(Output::tcp("not an address").log(&sample_report(false)).is_ok());
    }

    #[test]
    fn tracing_output_never_fails() {
        assert!(Output::Tracing.log(&sample_report(false)).is_ok());
        assert!(Output::Tracing.log(&sample_report(true)).is_ok());
    }

    #[cfg(feature = "tokio")]
    #[test]
    fn channel_output_delivers_and_reports_closed_receiver() {
        let (output, mut rx) = Output::channel(1);

        output.log(&sample_report(false)).unwrap();
        // Full channel: dropped, not an error
        output.log(&sample_report(true)).unwrap();

        let received = rx.try_recv().unwrap();
        assert!(!received.still_running);
        assert!(rx.try_recv().is_err());

        drop(rx);
        assert!(matches!(
            output.log(&sample_report(false)),
            Err(LoggerError::Closed)
        ));
    }
}
