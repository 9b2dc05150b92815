//! State shared between the GUI thread and the monitor thread.
//!
//! The GUI thread only ever performs atomic stores, a compare-and-swap and a
//! condvar notify here; it never waits on a lock held by the monitor thread.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::{Condvar, Mutex};

/// Monotonic millisecond clock with a fixed epoch anchor.
///
/// `now_ms` never returns `0`, which is reserved to mean "idle".
#[derive(Debug)]
pub struct Clock {
    origin: Instant,
    epoch_origin_ms: u64,
}

impl Clock {
    pub fn new() -> Self {
        let epoch_origin_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            origin: Instant::now(),
            epoch_origin_ms,
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64 + 1
    }

    /// Convert a `now_ms` reading to milliseconds since the Unix epoch.
    pub fn to_epoch_ms(&self, monotonic_ms: u64) -> u64 {
        self.epoch_origin_ms + monotonic_ms.saturating_sub(1)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// A long event measured by the GUI thread itself, in monotonic milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishedEvent {
    pub start_ms: u64,
    pub duration_ms: u64,
}

const SLOT_EMPTY: u8 = 0;
const SLOT_WRITING: u8 = 1;
const SLOT_READY: u8 = 2;

/// Lock-free single-slot handoff from the GUI thread to the monitor thread.
///
/// The writer claims the slot with a CAS, fills the payload and marks it
/// ready; the reader drains it. A publish while the slot is occupied is
/// dropped and reported to the caller.
#[derive(Debug, Default)]
pub struct EventHandoff {
    slot: AtomicU8,
    start_ms: AtomicU64,
    duration_ms: AtomicU64,
}

impl EventHandoff {
    /// Returns `false` if an earlier event has not been drained yet.
    pub fn publish(&self, event: PublishedEvent) -> bool {
        if self
            .slot
            .compare_exchange(SLOT_EMPTY, SLOT_WRITING, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }
        self.start_ms.store(event.start_ms, Ordering::Relaxed);
        self.duration_ms.store(event.duration_ms, Ordering::Relaxed);
        self.slot.store(SLOT_READY, Ordering::Release);
        true
    }

    pub fn take(&self) -> Option<PublishedEvent> {
        if self.slot.load(Ordering::Acquire) != SLOT_READY {
            return None;
        }
        let event = PublishedEvent {
            start_ms: self.start_ms.load(Ordering::Relaxed),
            duration_ms: self.duration_ms.load(Ordering::Relaxed),
        };
        self.slot.store(SLOT_EMPTY, Ordering::Release);
        Some(event)
    }
}

/// Everything both threads touch.
#[derive(Debug)]
pub struct SharedState {
    pub clock: Clock,
    logging_threshold_ms: u64,
    /// Instant of the latest event transition; `0` while the loop is idle.
    last_transition: AtomicU64,
    pub handoff: EventHandoff,
    cancelled: AtomicBool,
    wake_flag: Mutex<bool>,
    wake: Condvar,
}

impl SharedState {
    pub fn new(logging_threshold_ms: u64) -> Self {
        let clock = Clock::new();
        let start = clock.now_ms();
        Self {
            clock,
            logging_threshold_ms,
            last_transition: AtomicU64::new(start),
            handoff: EventHandoff::default(),
            cancelled: AtomicBool::new(false),
            wake_flag: Mutex::new(false),
            wake: Condvar::new(),
        }
    }

    pub fn last_transition(&self) -> u64 {
        self.last_transition.load(Ordering::Acquire)
    }

    /// Record a transition on the GUI thread.
    ///
    /// With `check_delay`, the stretch since the previous transition is
    /// published as a long event when it reached the logging threshold.
    /// `resume` records the current instant; otherwise the loop is idle.
    pub fn transition(&self, check_delay: bool, resume: bool) {
        let now = self.clock.now_ms();

        if check_delay {
            let previous = self.last_transition.load(Ordering::Relaxed);
            if previous != 0 {
                let duration_ms = now.saturating_sub(previous);
                if duration_ms >= self.logging_threshold_ms {
                    let published = self.handoff.publish(PublishedEvent {
                        start_ms: previous,
                        duration_ms,
                    });
                    if published {
                        self.wake();
                    }
                }
            }
        }

        self.last_transition
            .store(if resume { now } else { 0 }, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Stop the poll loop. Unlike [`wake`](Self::wake) this may block briefly.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        *self.wake_flag.lock() = true;
        self.wake.notify_one();
    }

    /// Wake the monitor thread early.
    pub fn wake(&self) {
        // Never block the GUI thread; a missed flag only delays the monitor
        // until its sleep times out.
        if let Some(mut flag) = self.wake_flag.try_lock() {
            *flag = true;
        }
        self.wake.notify_one();
    }

    /// Sleep up to `timeout` or until woken. Returns immediately if a wake
    /// was signalled since the last call.
    pub fn sleep(&self, timeout: Duration) {
        let mut flag = self.wake_flag.lock();
        if !*flag && !self.is_cancelled() {
            self.wake.wait_for(&mut flag, timeout);
        }
        *flag = false;
    }
}
