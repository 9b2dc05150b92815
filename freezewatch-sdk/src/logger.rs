//! Report consumers and their registry.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use freezewatch_types::LongEventReport;
use parking_lot::RwLock;
use tracing::warn;

use crate::error::LoggerError;

/// Receives long event reports on the monitor thread.
///
/// A logger that returns an error or panics is removed from the monitor and
/// never called again.
pub trait EventLogger: Send + Sync {
    fn log(&self, report: &LongEventReport) -> Result<(), LoggerError>;
}

impl<F> EventLogger for F
where
    F: Fn(&LongEventReport) -> Result<(), LoggerError> + Send + Sync,
{
    fn log(&self, report: &LongEventReport) -> Result<(), LoggerError> {
        self(report)
    }
}

/// Identifies a registered logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoggerId(u64);

/// The loggers reports are delivered to, in registration order.
#[derive(Default)]
pub struct LoggerSet {
    next_id: AtomicU64,
    loggers: RwLock<Vec<(LoggerId, Arc<dyn EventLogger>)>>,
}

impl LoggerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, logger: Arc<dyn EventLogger>) -> LoggerId {
        let id = LoggerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.loggers.write().push((id, logger));
        id
    }

    /// Returns `true` if the logger was registered.
    pub fn remove(&self, id: LoggerId) -> bool {
        let mut loggers = self.loggers.write();
        let before = loggers.len();
        loggers.retain(|(existing, _)| *existing != id);
        loggers.len() != before
    }

    pub fn len(&self) -> usize {
        self.loggers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.loggers.read().is_empty()
    }

    /// Deliver a report to every logger. Loggers that fail are dropped.
    ///
    /// Returns the number of loggers that accepted the report.
    pub fn deliver(&self, report: &LongEventReport) -> usize {
        // Loggers run without the lock held.
        let loggers: Vec<_> = self.loggers.read().clone();

        let mut delivered = 0;
        let mut failed = Vec::new();
        for (id, logger) in loggers {
            match invoke(logger.as_ref(), report) {
                Ok(()) => delivered += 1,
                Err(reason) => {
                    warn!(logger = ?id, %reason, "removing freeze logger after failure");
                    failed.push(id);
                }
            }
        }

        if !failed.is_empty() {
            self.loggers
                .write()
                .retain(|(id, _)| !failed.contains(id));
        }
        delivered
    }
}

/// Call a logger, turning both errors and panics into a description.
pub(crate) fn invoke(logger: &dyn EventLogger, report: &LongEventReport) -> Result<(), String> {
    match panic::catch_unwind(AssertUnwindSafe(|| logger.log(report))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err.to_string()),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

impl fmt::Debug for LoggerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerSet")
            .field("loggers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    impl EventLogger for Counting {
        fn log(&self, _report: &LongEventReport) -> Result<(), LoggerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing {
        calls: AtomicUsize,
        panic: bool,
    }

    impl EventLogger for Failing {
        fn log(&self, _report: &LongEventReport) -> Result<(), LoggerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.panic {
                panic!("logger exploded");
            }
            Err(LoggerError::Other("disk full".into()))
        }
    }

    fn report() -> LongEventReport {
        LongEventReport::builder().start_time_ms(1).duration_ms(900).build()
    }

    #[test]
    fn delivers_to_every_logger() {
        let set = LoggerSet::new();
        let a = Arc::new(Counting::default());
        let b = Arc::new(Counting::default());
        set.add(a.clone());
        set.add(b.clone());

        assert_eq!(set.deliver(&report()), 2);
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(b.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failing_logger_is_removed_and_others_still_receive() {
        for panic in [false, true] {
            let set = LoggerSet::new();
            let failing = Arc::new(Failing {
                calls: AtomicUsize::new(0),
                panic,
            });
            let healthy = Arc::new(Counting::default());
            set.add(failing.clone());
            set.add(healthy.clone());

            assert_eq!(set.deliver(&report()), 1);
            assert_eq!(set.deliver(&report()), 1);

            assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
            assert_eq!(healthy.calls.load(Ordering::SeqCst), 2);
            assert_eq!(set.len(), 1);
        }
    }

    #[test]
    fn closures_are_loggers() {
        let set = LoggerSet::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        set.add(Arc::new(move |r: &LongEventReport| {
            counter.fetch_add(r.duration.as_millis() as usize, Ordering::SeqCst);
            Ok::<(), LoggerError>(())
        }));

        set.deliver(&report());
        assert_eq!(seen.load(Ordering::SeqCst), 900);
    }

    #[test]
    fn remove_by_id() {
        let set = LoggerSet::new();
        let id = set.add(Arc::new(Counting::default()));
        assert!(set.remove(id));
        assert!(!set.remove(id));
        assert!(set.is_empty());
    }
}
