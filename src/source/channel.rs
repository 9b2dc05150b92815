//! Channel-based report source.
//!
//! Receives reports pushed through a tokio mpsc channel, typically the
//! receiving half of `Output::channel` registered on an in-process monitor.

use freezewatch_types::LongEventReport;
use tokio::sync::mpsc::{self, error::TryRecvError};

use super::ReportSource;

/// A report source fed by an in-process channel.
///
/// # Example
///
/// ```
/// use freezewatch::ChannelSource;
/// use freezewatch_sdk::Output;
///
/// // Hand `output` to `EventLoopMonitor::add_logger`
/// let (output, rx) = Output::channel(64);
/// let source = ChannelSource::new(rx, "in-process monitor");
/// ```
#[derive(Debug)]
pub struct ChannelSource {
    receiver: mpsc::Receiver<LongEventReport>,
    description: String,
    disconnected: bool,
}

impl ChannelSource {
    pub fn new(receiver: mpsc::Receiver<LongEventReport>, source_description: &str) -> Self {
        Self {
            receiver,
            description: format!("channel: {}", source_description),
            disconnected: false,
        }
    }

    /// Create a channel pair. Returns `(sender, source)`.
    pub fn create(
        source_description: &str,
        buffer: usize,
    ) -> (mpsc::Sender<LongEventReport>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self::new(rx, source_description))
    }
}

impl ReportSource for ChannelSource {
    fn poll(&mut self) -> Vec<LongEventReport> {
        let mut reports = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(report) => reports.push(report),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    break;
                }
            }
        }
        reports
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<String> {
        self.disconnected.then(|| "Channel closed".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(duration_ms: u64) -> LongEventReport {
        LongEventReport::builder()
            .start_time_ms(1)
            .duration_ms(duration_ms)
            .build()
    }

    #[test]
    fn test_channel_source_drains_everything_pending() {
        let (tx, mut source) = ChannelSource::create("test", 8);
        assert!(source.poll().is_empty());

        tx.try_send(report(600)).unwrap();
        tx.try_send(report(700)).unwrap();

        let reports = source.poll();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].duration.as_millis(), 600);
        assert!(source.poll().is_empty());
        assert!(source.error().is_none());
    }

    #[test]
    fn test_channel_source_reports_closed_sender() {
        let (tx, mut source) = ChannelSource::create("test", 8);
        tx.try_send(report(600)).unwrap();
        drop(tx);

        assert_eq!(source.poll().len(), 1);
        assert!(source.poll().is_empty());
        assert_eq!(source.error().as_deref(), Some("Channel closed"));
        assert_eq!(source.description(), "channel: test");
    }
}
