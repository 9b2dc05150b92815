//! The main EventLoopMonitor type.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use tracing::debug;

use crate::error::MonitorError;
use crate::filter::FilterSet;
use crate::listener::{EventDispatcher, EventLoopListener, ListenerId};
use crate::logger::{EventLogger, LoggerId, LoggerSet};
use crate::params::MonitorParameters;
use crate::poller::PollLoop;
use crate::sampler::StackSampler;
use crate::state::SharedState;

/// Name of the background thread. Samples taken with `dump_all_threads`
/// never include it.
pub const MONITOR_THREAD_NAME: &str = "freeze-monitor";

/// Watches a GUI event loop and reports events that keep it busy too long.
///
/// The monitor hooks four cheap callbacks into the host loop and does all
/// real work on a background thread: it samples the GUI thread's stack while
/// an event runs long, and hands a [`LongEventReport`] to every registered
/// logger once the event completes (or looks deadlocked).
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use freezewatch_sdk::{EventLoopMonitor, ListenerSet, MonitorParameters, ThreadRegistry};
///
/// let listeners = Arc::new(ListenerSet::new());
/// let registry = Arc::new(ThreadRegistry::new());
/// let gui = registry.register_current();
///
/// let mut monitor = EventLoopMonitor::start(
///     MonitorParameters::default(),
///     listeners.clone(),
///     registry.clone(),
///     gui.id(),
/// )
/// .unwrap();
///
/// // The host loop fires the hooks:
/// listeners.fire_dispatch_begin();
/// listeners.fire_dispatch_end();
///
/// monitor.shutdown().unwrap();
/// ```
///
/// [`LongEventReport`]: freezewatch_types::LongEventReport
pub struct EventLoopMonitor {
    shared: Arc<SharedState>,
    loggers: Arc<LoggerSet>,
    dispatcher: Arc<dyn EventDispatcher>,
    listener: Option<ListenerId>,
    gui_thread: ThreadId,
    handle: Option<JoinHandle<()>>,
}

impl EventLoopMonitor {
    /// Validate `parameters`, hook into `dispatcher` and start the monitor thread.
    ///
    /// Must be called on the GUI thread; the calling thread is remembered as
    /// the only one allowed to call [`shutdown`](Self::shutdown).
    /// `gui_thread` is the id `sampler` knows the GUI thread by.
    ///
    /// Nothing is registered or spawned when the parameters are invalid.
    pub fn start(
        parameters: MonitorParameters,
        dispatcher: Arc<dyn EventDispatcher>,
        sampler: Arc<dyn StackSampler>,
        gui_thread: u64,
    ) -> Result<Self, MonitorError> {
        parameters.validate()?;
        let filters = FilterSet::parse(&parameters.filter_traces)?
            .with_dispatch_shims(&parameters.dispatch_shims)?;
        let idle_threads = FilterSet::parse(&parameters.idle_thread_filter)?;

        let shared = Arc::new(SharedState::new(parameters.logging_threshold_ms));
        let loggers = Arc::new(LoggerSet::new());

        let poll_loop = PollLoop::new(
            shared.clone(),
            sampler,
            loggers.clone(),
            filters,
            idle_threads,
            gui_thread,
            parameters,
        );
        let handle = thread::Builder::new()
            .name(MONITOR_THREAD_NAME.to_string())
            .spawn(move || poll_loop.run())?;

        let listener = dispatcher.add_listener(Arc::new(GuiHooks {
            shared: shared.clone(),
        }));

        Ok(Self {
            shared,
            loggers,
            dispatcher,
            listener: Some(listener),
            gui_thread: thread::current().id(),
            handle: Some(handle),
        })
    }

    /// Register a logger. Reports are delivered in registration order.
    pub fn add_logger(&self, logger: Arc<dyn EventLogger>) -> LoggerId {
        self.loggers.add(logger)
    }

    /// Returns `true` if the logger was still registered.
    pub fn remove_logger(&self, id: LoggerId) -> bool {
        self.loggers.remove(id)
    }

    pub fn logger_count(&self) -> usize {
        self.loggers.len()
    }

    /// `false` once the monitor was shut down or stopped by itself
    /// because the GUI thread went away.
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Unhook from the event loop, stop the monitor thread and wait for it.
    ///
    /// Fails with [`MonitorError::WrongThread`] off the GUI thread. Calling
    /// it again after a successful shutdown is a no-op.
    pub fn shutdown(&mut self) -> Result<(), MonitorError> {
        if thread::current().id() != self.gui_thread {
            return Err(MonitorError::WrongThread);
        }
        self.stop()
    }

    fn stop(&mut self) -> Result<(), MonitorError> {
        if let Some(id) = self.listener.take() {
            self.dispatcher.remove_listener(id);
        }
        self.shared.cancel();

        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| MonitorError::ThreadPanicked),
            None => Ok(()),
        }
    }
}

impl Drop for EventLoopMonitor {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            debug!(error = %err, "freeze monitor did not stop cleanly");
        }
    }
}

impl fmt::Debug for EventLoopMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoopMonitor")
            .field("running", &self.is_running())
            .field("loggers", &self.loggers.len())
            .finish()
    }
}

/// The listener installed on the host loop. Runs on the GUI thread.
struct GuiHooks {
    shared: Arc<SharedState>,
}

impl EventLoopListener for GuiHooks {
    fn on_dispatch_begin(&self) {
        self.shared.transition(true, true);
    }

    fn on_dispatch_end(&self) {
        self.shared.transition(true, true);
    }

    fn on_enter_idle(&self) {
        self.shared.transition(true, false);
    }

    // Time spent asleep is never a freeze.
    fn on_exit_idle(&self) {
        self.shared.transition(false, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::listener::ListenerSet;
    use crate::sampler::{ThreadProbe, ThreadRegistry};

    fn fixtures() -> (Arc<ListenerSet>, Arc<ThreadRegistry>) {
        (Arc::new(ListenerSet::new()), Arc::new(ThreadRegistry::new()))
    }

    fn start_default(
        listeners: &Arc<ListenerSet>,
        registry: &Arc<ThreadRegistry>,
        gui: &ThreadProbe,
    ) -> EventLoopMonitor {
        EventLoopMonitor::start(
            MonitorParameters::default(),
            listeners.clone(),
            registry.clone(),
            gui.id(),
        )
        .unwrap()
    }

    #[test]
    fn start_registers_hooks_and_shutdown_removes_them() {
        let (listeners, registry) = fixtures();
        let gui = registry.register_current();

        let mut monitor = start_default(&listeners, &registry, &gui);
        assert_eq!(listeners.len(), 1);
        assert!(monitor.is_running());

        monitor.shutdown().unwrap();
        assert!(listeners.is_empty());
        assert!(!monitor.is_running());

        // Second shutdown is a no-op
        monitor.shutdown().unwrap();
    }

    #[test]
    fn invalid_parameters_register_nothing() {
        let (listeners, registry) = fixtures();
        let params = MonitorParameters::builder().polling_delay_ms(0).build();

        let err = EventLoopMonitor::start(params, listeners.clone(), registry, 1).unwrap_err();
        assert!(matches!(
            err,
            MonitorError::Config(ConfigError::NotPositive { field: "polling delay" })
        ));
        assert!(listeners.is_empty());
    }

    #[test]
    fn malformed_filter_is_a_config_error() {
        let (listeners, registry) = fixtures();
        let params = MonitorParameters::builder().filter_traces("nodot").build();

        let err = EventLoopMonitor::start(params, listeners.clone(), registry, 1).unwrap_err();
        assert!(matches!(err, MonitorError::Config(ConfigError::InvalidFilter(_))));
        assert!(listeners.is_empty());
    }

    #[test]
    fn shutdown_off_gui_thread_is_rejected() {
        let (listeners, registry) = fixtures();
        let gui = registry.register_current();
        let mut monitor = start_default(&listeners, &registry, &gui);

        let (monitor, result) = thread::spawn(move || {
            let result = monitor.shutdown();
            (monitor, result)
        })
        .join()
        .unwrap();

        assert!(matches!(result, Err(MonitorError::WrongThread)));
        assert!(monitor.is_running());
        drop(monitor);
        assert!(listeners.is_empty());
    }

    #[test]
    fn drop_stops_the_monitor() {
        let (listeners, registry) = fixtures();
        let gui = registry.register_current();
        let monitor = start_default(&listeners, &registry, &gui);

        drop(monitor);
        assert!(listeners.is_empty());
    }

    #[test]
    fn loggers_can_be_added_and_removed() {
        let (listeners, registry) = fixtures();
        let gui = registry.register_current();
        let monitor = start_default(&listeners, &registry, &gui);

        let id = monitor.add_logger(Arc::new(crate::Output::Tracing));
        assert_eq!(monitor.logger_count(), 1);
        assert!(monitor.remove_logger(id));
        assert_eq!(monitor.logger_count(), 0);
    }
}
