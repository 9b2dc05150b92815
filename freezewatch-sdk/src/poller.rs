//! The monitor thread's polling loop.
//!
//! Runs on its own thread, never on the GUI thread. Each cycle sleeps until
//! the next sample is due (or it is woken), checks whether the GUI thread
//! moved on, samples stacks while an event is running long, and delivers
//! reports.

use std::sync::Arc;
use std::time::Duration;

use freezewatch_types::{LongEventReport, Milliseconds, StackSample};
use tracing::{debug, info, trace, warn};

use crate::decimate::decimate;
use crate::error::SampleError;
use crate::filter::FilterSet;
use crate::logger::{invoke, LoggerSet};
use crate::monitor::MONITOR_THREAD_NAME;
use crate::output::Output;
use crate::params::MonitorParameters;
use crate::sampler::StackSampler;
use crate::state::{PublishedEvent, SharedState};

/// A cycle that overslept or overran by more than `logging_threshold / 2`
/// counts as starved.
const STARVATION_SLACK_DIVISOR: u64 = 2;

pub(crate) struct PollLoop {
    shared: Arc<SharedState>,
    sampler: Arc<dyn StackSampler>,
    loggers: Arc<LoggerSet>,
    local: Option<Output>,
    filters: FilterSet,
    idle_threads: FilterSet,
    gui_thread: u64,
    params: MonitorParameters,

    tracking: Tracking,
}

/// Per-event bookkeeping, reset whenever the GUI thread makes a transition.
#[derive(Debug, Default)]
struct Tracking {
    /// Transition instant of the event being observed; `0` while idle.
    start: u64,
    samples: Vec<StackSample>,
    /// While idle, when the GUI thread's liveness is next checked.
    next_sample_due: u64,
    polling_delay: u64,
    deadlock_reported: bool,
}

enum Step {
    Continue,
    Stop,
}

impl PollLoop {
    pub fn new(
        shared: Arc<SharedState>,
        sampler: Arc<dyn StackSampler>,
        loggers: Arc<LoggerSet>,
        filters: FilterSet,
        idle_threads: FilterSet,
        gui_thread: u64,
        params: MonitorParameters,
    ) -> Self {
        let local = params.log_locally.then_some(Output::Tracing);
        Self {
            shared,
            sampler,
            loggers,
            local,
            filters,
            idle_threads,
            gui_thread,
            params,
            tracking: Tracking::default(),
        }
    }

    /// Samples kept before the buffer is halved.
    fn buffer_capacity(&self) -> usize {
        2 * self.params.max_stack_samples.saturating_sub(1).max(1)
    }

    pub fn run(mut self) {
        info!(
            gui_thread = self.gui_thread,
            logging_threshold_ms = self.params.logging_threshold_ms,
            "freeze monitor started"
        );

        let nyquist = (self.params.polling_delay_ms / 2).max(1);
        let slack = self.params.logging_threshold_ms / STARVATION_SLACK_DIVISOR;

        let mut last_wake = self.shared.clock.now_ms();
        let current = self.shared.last_transition();
        self.reset(current);

        while !self.shared.is_cancelled() {
            let before_sleep = self.shared.clock.now_ms();
            let awake_for = before_sleep.saturating_sub(last_wake);

            let sleep_for = if self.tracking.start == 0 {
                nyquist
            } else {
                nyquist
                    .min(self.tracking.next_sample_due.saturating_sub(before_sleep))
                    .max(1)
            };
            self.shared.sleep(Duration::from_millis(sleep_for));
            if self.shared.is_cancelled() {
                break;
            }

            let now = self.shared.clock.now_ms();
            let slept_for = now.saturating_sub(before_sleep);
            let starved = slept_for > sleep_for + slack || awake_for > slack;
            last_wake = now;

            if let Step::Stop = self.poll(now, starved) {
                self.shared.cancel();
                break;
            }
        }

        info!("freeze monitor stopped");
    }

    fn poll(&mut self, now: u64, starved: bool) -> Step {
        let current = self.shared.last_transition();

        if let Some(event) = self.shared.handoff.take() {
            self.complete_event(event, starved);
        }

        if starved {
            debug!("freeze monitor starved; discarding samples for this cycle");
            self.reset(current);
            return Step::Continue;
        }

        if current != self.tracking.start {
            self.reset(current);
            return Step::Continue;
        }

        if current == 0 {
            // Nothing is sampled while idle, so check the GUI thread directly
            if now >= self.tracking.next_sample_due {
                if !self.sampler.is_alive(self.gui_thread) {
                    info!("GUI thread is gone; stopping freeze monitor");
                    return Step::Stop;
                }
                self.tracking.next_sample_due = now + self.tracking.polling_delay;
            }
            return Step::Continue;
        }

        let running_for = now.saturating_sub(current);
        if !self.tracking.deadlock_reported && running_for > self.params.deadlock_threshold_ms {
            self.tracking.deadlock_reported = true;
            let samples = std::mem::take(&mut self.tracking.samples);
            let report = self.build_report(current, running_for, samples, true);
            self.deliver(report);
        }

        if now >= self.tracking.next_sample_due {
            match self.capture(now) {
                Ok(sample) => self.tracking.samples.push(sample),
                Err(SampleError::ThreadGone(_)) => {
                    info!("GUI thread is gone; stopping freeze monitor");
                    return Step::Stop;
                }
                Err(err) => debug!(error = %err, "stack sample failed"),
            }
            self.tracking.next_sample_due = now + self.tracking.polling_delay;

            let capacity = self.buffer_capacity();
            if self.tracking.samples.len() >= capacity {
                decimate(&mut self.tracking.samples, capacity / 2);
                self.tracking.polling_delay *= 2;
                trace!(
                    polling_delay_ms = self.tracking.polling_delay,
                    "sample buffer full; halved and slowed down"
                );
            }
        }

        Step::Continue
    }

    fn reset(&mut self, current: u64) {
        self.tracking = Tracking {
            start: current,
            samples: Vec::new(),
            next_sample_due: current + self.params.sampling_threshold_ms,
            polling_delay: self.params.polling_delay_ms,
            deadlock_reported: false,
        };
    }

    /// Finish a long event the GUI thread published.
    fn complete_event(&mut self, event: PublishedEvent, starved: bool) {
        let mut samples = if !starved && event.start_ms == self.tracking.start {
            std::mem::take(&mut self.tracking.samples)
        } else {
            Vec::new()
        };

        let end = self.shared.clock.to_epoch_ms(event.start_ms + event.duration_ms);
        samples.retain(|s| s.timestamp_ms <= end);
        if samples
            .last()
            .is_some_and(|s| s.timestamp_ms + self.tracking.polling_delay > end)
        {
            samples.pop();
        }
        decimate(&mut samples, self.params.max_stack_samples);

        let report = self.build_report(event.start_ms, event.duration_ms, samples, false);
        self.deliver(report);
    }

    fn build_report(
        &self,
        start_ms: u64,
        duration_ms: u64,
        samples: Vec<StackSample>,
        still_running: bool,
    ) -> LongEventReport {
        let mut report = LongEventReport::new(
            self.shared.clock.to_epoch_ms(start_ms),
            Milliseconds::from_millis(duration_ms),
            still_running,
        );
        report.samples = samples;
        report
    }

    fn capture(&self, now: u64) -> Result<StackSample, SampleError> {
        let mut threads = vec![self.sampler.sample_thread(self.gui_thread)?];

        if self.params.dump_all_threads {
            match self.sampler.sample_all() {
                Ok(all) => threads.extend(all.into_iter().filter(|t| {
                    t.id != self.gui_thread
                        && t.name != MONITOR_THREAD_NAME
                        && !self.idle_threads.matches_stack(t)
                })),
                Err(err) => debug!(error = %err, "full thread dump failed; keeping GUI stack only"),
            }
        }

        Ok(StackSample::new(self.shared.clock.to_epoch_ms(now), threads))
    }

    fn deliver(&self, report: LongEventReport) {
        if !self.filters.should_log(&report) {
            debug!(
                duration_ms = report.duration.as_millis(),
                "long event suppressed by filter"
            );
            return;
        }

        if let Some(local) = &self.local {
            if let Err(reason) = invoke(local, &report) {
                warn!(%reason, "local freeze logger failed");
            }
        }
        self.loggers.deliver(&report);
    }
}
