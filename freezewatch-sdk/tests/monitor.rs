//! End-to-end tests driving a real monitor thread from a scripted GUI loop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use freezewatch_sdk::{
    EventLoopMonitor, ListenerSet, LoggerError, LongEventReport, MonitorParameters, ThreadProbe,
    ThreadRegistry,
};

/// Long enough that scheduler hiccups on a busy machine do not count as starvation.
fn params() -> MonitorParameters {
    MonitorParameters::builder()
        .logging_threshold_ms(400)
        .sampling_threshold_ms(100)
        .polling_delay_ms(50)
        .max_stack_samples(3)
        .log_locally(false)
        .build()
}

struct Harness {
    listeners: Arc<ListenerSet>,
    registry: Arc<ThreadRegistry>,
    gui: ThreadProbe,
    monitor: EventLoopMonitor,
    reports: Receiver<LongEventReport>,
}

impl Harness {
    fn start(params: MonitorParameters) -> Self {
        let listeners = Arc::new(ListenerSet::new());
        let registry = Arc::new(ThreadRegistry::new());
        let gui = registry.register("main");

        let monitor =
            EventLoopMonitor::start(params, listeners.clone(), registry.clone(), gui.id()).unwrap();

        let (tx, reports) = mpsc::channel();
        monitor.add_logger(Arc::new(move |report: &LongEventReport| {
            tx.send(report.clone()).map_err(|_| LoggerError::Closed)
        }));

        Self {
            listeners,
            registry,
            gui,
            monitor,
            reports,
        }
    }

    /// One event handled inside `class.method`, taking `millis`.
    fn event(&self, class: &str, method: &str, millis: u64) {
        self.listeners.fire_exit_idle();
        self.listeners.fire_dispatch_begin();
        {
            let _outer = self.gui.enter("app.Shell", "dispatch");
            let _frame = self.gui.enter(class, method);
            thread::sleep(Duration::from_millis(millis));
        }
        self.listeners.fire_dispatch_end();
        self.listeners.fire_enter_idle();
    }

    fn next_report(&self) -> LongEventReport {
        self.reports
            .recv_timeout(Duration::from_secs(5))
            .expect("a report within 5s")
    }

    fn assert_quiet(&self, millis: u64) {
        if let Ok(report) = self.reports.recv_timeout(Duration::from_millis(millis)) {
            panic!("unexpected report: {:?}", report);
        }
    }
}

#[test]
fn fast_events_are_never_reported() {
    let harness = Harness::start(params());

    for _ in 0..50 {
        harness.event("app.Editor", "keystroke", 2);
    }

    harness.assert_quiet(600);
}

#[test]
fn long_dispatch_is_reported_once_with_samples() {
    let harness = Harness::start(params());

    let before = Instant::now();
    harness.event("app.Editor", "reflow", 1_000);
    let measured = before.elapsed().as_millis() as u64;

    let report = harness.next_report();
    assert!(!report.still_running);
    assert!(report.duration.as_millis() >= 1_000);
    assert!(report.duration.as_millis() <= measured + 5);

    assert!(!report.samples.is_empty());
    assert!(report.samples.len() <= 3);
    for sample in &report.samples {
        assert!(sample.timestamp_ms >= report.start_time_ms);
        assert!(sample.timestamp_ms <= report.end_time_ms());

        let gui = sample.gui_thread().unwrap();
        assert_eq!(gui.name, "main");
        assert_eq!(gui.top_frame().unwrap().method_name, "reflow");
    }
    let mut timestamps: Vec<_> = report.samples.iter().map(|s| s.timestamp_ms).collect();
    timestamps.dedup();
    assert_eq!(timestamps.len(), report.samples.len());

    harness.assert_quiet(600);
}

#[test]
fn time_spent_idle_is_not_a_freeze() {
    let harness = Harness::start(params());

    harness.listeners.fire_enter_idle();
    thread::sleep(Duration::from_millis(800));
    harness.listeners.fire_exit_idle();
    harness.listeners.fire_dispatch_begin();
    harness.listeners.fire_dispatch_end();
    harness.listeners.fire_enter_idle();

    harness.assert_quiet(600);
}

#[test]
fn deadlock_is_reported_while_running_then_completion_follows() {
    let harness = Harness::start(
        MonitorParameters::builder()
            .logging_threshold_ms(400)
            .sampling_threshold_ms(100)
            .polling_delay_ms(50)
            .deadlock_threshold_ms(500)
            .log_locally(false)
            .build(),
    );

    harness.event("app.Index", "waitForLock", 1_200);

    let deadlock = harness.next_report();
    assert!(deadlock.still_running);
    assert!(deadlock.duration.as_millis() > 500);
    assert!(deadlock.duration.as_millis() < 1_200);

    let completed = harness.next_report();
    assert!(!completed.still_running);
    assert!(completed.duration.as_millis() >= 1_200);
    assert_eq!(completed.start_time_ms, deadlock.start_time_ms);

    harness.assert_quiet(400);
}

#[test]
fn filtered_top_frame_suppresses_the_report() {
    let harness = Harness::start(
        MonitorParameters::builder()
            .logging_threshold_ms(400)
            .sampling_threshold_ms(100)
            .polling_delay_ms(50)
            .filter_traces("app.Dialog.run")
            .log_locally(false)
            .build(),
    );

    harness.event("app.Dialog", "run", 1_000);
    harness.assert_quiet(600);

    // The monitor is still alive for unfiltered work
    harness.event("app.Editor", "reflow", 800);
    let report = harness.next_report();
    assert_eq!(
        report.samples[0].gui_thread().unwrap().top_frame().unwrap().method_name,
        "reflow"
    );
}

#[test]
fn failing_logger_is_dropped_and_others_keep_receiving() {
    let harness = Harness::start(params());

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    harness.monitor.add_logger(Arc::new(move |_: &LongEventReport| -> Result<(), LoggerError> {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(LoggerError::Other("rejected".into()))
    }));
    assert_eq!(harness.monitor.logger_count(), 2);

    harness.event("app.Editor", "reflow", 600);
    harness.next_report();
    harness.event("app.Editor", "reflow", 600);
    harness.next_report();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.monitor.logger_count(), 1);
}

#[test]
fn dump_all_threads_puts_gui_first_and_skips_idle_threads() {
    let harness = Harness::start(
        MonitorParameters::builder()
            .logging_threshold_ms(400)
            .sampling_threshold_ms(100)
            .polling_delay_ms(50)
            .dump_all_threads(true)
            .idle_thread_filter("pool.Worker.park")
            .log_locally(false)
            .build(),
    );

    let indexer = harness.registry.register("indexer");
    let _indexing = indexer.enter("idx.Index", "build");
    let pooled = harness.registry.register("pool-1");
    let _parked = pooled.enter("pool.Worker", "park");

    harness.event("app.Editor", "reflow", 1_000);

    let report = harness.next_report();
    assert!(!report.samples.is_empty());
    for sample in &report.samples {
        let names: Vec<_> = sample.threads.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["main", "indexer"]);
    }
}

#[test]
fn gui_thread_going_away_stops_the_monitor() {
    let Harness {
        listeners,
        gui,
        monitor,
        ..
    } = Harness::start(params());

    listeners.fire_exit_idle();
    listeners.fire_dispatch_begin();
    drop(gui);

    let deadline = Instant::now() + Duration::from_secs(5);
    while monitor.is_running() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(20));
    }
    assert!(!monitor.is_running());
}

#[test]
fn gui_thread_going_away_while_idle_stops_the_monitor() {
    let Harness {
        listeners,
        gui,
        monitor,
        ..
    } = Harness::start(params());

    listeners.fire_exit_idle();
    listeners.fire_dispatch_begin();
    listeners.fire_dispatch_end();
    listeners.fire_enter_idle();
    drop(gui);

    let deadline = Instant::now() + Duration::from_secs(5);
    while monitor.is_running() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(20));
    }
    assert!(!monitor.is_running());
}

#[test]
fn shutdown_wakes_a_sleeping_monitor_promptly() {
    let mut harness = Harness::start(
        MonitorParameters::builder()
            .logging_threshold_ms(60_000)
            .sampling_threshold_ms(30_000)
            .polling_delay_ms(20_000)
            .log_locally(false)
            .build(),
    );
    // Let the monitor settle into its long sleep
    thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    harness.monitor.shutdown().unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(harness.listeners.is_empty());
}
