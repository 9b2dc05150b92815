//! Stack capture.
//!
//! [`StackSampler`] is the seam to whatever thread introspection the host
//! has. [`ThreadRegistry`] is a cooperative implementation: threads register
//! a [`ThreadProbe`] and mark the work they are doing with RAII guards, so the
//! monitor can read a stack of named frames from another thread.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use freezewatch_types::{LockInfo, StackFrame, ThreadStack, ThreadState};
use parking_lot::RwLock;

use crate::error::SampleError;

/// Captures thread stacks on behalf of the monitor thread.
pub trait StackSampler: Send + Sync {
    /// Capture one thread's stack.
    fn sample_thread(&self, thread_id: u64) -> Result<ThreadStack, SampleError>;

    /// Capture every live thread the sampler knows about, including lock details.
    fn sample_all(&self) -> Result<Vec<ThreadStack>, SampleError>;

    /// `false` once the thread has gone away. Polled while the loop is idle,
    /// so implementations should answer without capturing a full stack.
    fn is_alive(&self, thread_id: u64) -> bool {
        !matches!(self.sample_thread(thread_id), Err(SampleError::ThreadGone(_)))
    }
}

fn state_to_u8(state: ThreadState) -> u8 {
    match state {
        ThreadState::New => 0,
        ThreadState::Runnable => 1,
        ThreadState::Blocked => 2,
        ThreadState::Waiting => 3,
        ThreadState::TimedWaiting => 4,
        ThreadState::Terminated => 5,
    }
}

fn state_from_u8(value: u8) -> ThreadState {
    match value {
        0 => ThreadState::New,
        2 => ThreadState::Blocked,
        3 => ThreadState::Waiting,
        4 => ThreadState::TimedWaiting,
        5 => ThreadState::Terminated,
        _ => ThreadState::Runnable,
    }
}

/// Per-thread state written by the owning thread and read by samplers.
#[derive(Debug)]
struct ProbeState {
    id: u64,
    name: String,
    /// Outermost frame first; reversed when sampled.
    frames: RwLock<Vec<StackFrame>>,
    state: AtomicU8,
    waiting_on: RwLock<Option<LockInfo>>,
    held_locks: RwLock<Vec<LockInfo>>,
}

impl ProbeState {
    fn snapshot(&self) -> ThreadStack {
        let frames = self.frames.read().iter().rev().cloned().collect();
        ThreadStack {
            id: self.id,
            name: self.name.clone(),
            state: state_from_u8(self.state.load(Ordering::Relaxed)),
            frames,
            waiting_on: self.waiting_on.read().clone(),
            held_locks: self.held_locks.read().clone(),
        }
    }
}

/// Registry of cooperatively sampled threads.
///
/// # Example
///
/// ```rust
/// use freezewatch_sdk::{StackSampler, ThreadRegistry};
///
/// let registry = ThreadRegistry::new();
/// let probe = registry.register("main");
///
/// let _outer = probe.enter("app.Shell", "dispatch");
/// let _inner = probe.enter("app.Editor", "reflow");
///
/// let stack = registry.sample_thread(probe.id()).unwrap();
/// assert_eq!(stack.top_frame().unwrap().method_name, "reflow");
/// ```
#[derive(Debug)]
pub struct ThreadRegistry {
    next_id: AtomicU64,
    threads: RwLock<BTreeMap<u64, Weak<ProbeState>>>,
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            threads: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register a thread under `name` and get the probe it reports through.
    pub fn register(&self, name: &str) -> ThreadProbe {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let state = Arc::new(ProbeState {
            id,
            name: name.to_string(),
            frames: RwLock::new(Vec::new()),
            state: AtomicU8::new(state_to_u8(ThreadState::Runnable)),
            waiting_on: RwLock::new(None),
            held_locks: RwLock::new(Vec::new()),
        });
        self.threads.write().insert(id, Arc::downgrade(&state));
        ThreadProbe { state }
    }

    /// Register the calling thread under its std thread name.
    pub fn register_current(&self) -> ThreadProbe {
        let current = std::thread::current();
        self.register(current.name().unwrap_or("unnamed"))
    }

    /// Number of registered threads that are still alive.
    pub fn live_threads(&self) -> usize {
        self.threads
            .read()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    fn prune(&self) {
        self.threads.write().retain(|_, weak| weak.strong_count() > 0);
    }

    /// Ids are handed out in order, so a missing id below `next_id` was
    /// registered once and has since been pruned.
    fn lookup(&self, thread_id: u64) -> Result<Arc<ProbeState>, SampleError> {
        let weak = self.threads.read().get(&thread_id).cloned();
        match weak {
            Some(weak) => weak.upgrade().ok_or_else(|| {
                self.prune();
                SampleError::ThreadGone(thread_id)
            }),
            None if thread_id > 0 && thread_id < self.next_id.load(Ordering::Relaxed) => {
                Err(SampleError::ThreadGone(thread_id))
            }
            None => Err(SampleError::UnknownThread(thread_id)),
        }
    }
}

impl Default for ThreadRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StackSampler for ThreadRegistry {
    fn sample_thread(&self, thread_id: u64) -> Result<ThreadStack, SampleError> {
        self.lookup(thread_id).map(|state| state.snapshot())
    }

    fn sample_all(&self) -> Result<Vec<ThreadStack>, SampleError> {
        let live: Vec<Arc<ProbeState>> = self
            .threads
            .read()
            .values()
            .filter_map(Weak::upgrade)
            .collect();

        if live.len() != self.threads.read().len() {
            self.prune();
        }

        Ok(live.iter().map(|state| state.snapshot()).collect())
    }

    fn is_alive(&self, thread_id: u64) -> bool {
        !matches!(self.lookup(thread_id), Err(SampleError::ThreadGone(_)))
    }
}

/// Handle a thread uses to publish what it is doing.
///
/// Dropping the last clone marks the thread as gone.
#[derive(Debug, Clone)]
pub struct ThreadProbe {
    state: Arc<ProbeState>,
}

impl ThreadProbe {
    pub fn id(&self) -> u64 {
        self.state.id
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// Push a frame; it is popped when the guard drops.
    pub fn enter(&self, class_name: &str, method_name: &str) -> FrameGuard {
        self.enter_frame(StackFrame::new(class_name, method_name))
    }

    pub fn enter_frame(&self, frame: StackFrame) -> FrameGuard {
        let mut frames = self.state.frames.write();
        let depth = frames.len();
        frames.push(frame);
        FrameGuard {
            state: self.state.clone(),
            depth,
        }
    }

    pub fn set_state(&self, state: ThreadState) {
        self.state.state.store(state_to_u8(state), Ordering::Relaxed);
    }

    /// Mark the thread as blocked on `lock` until the guard drops.
    pub fn wait_for(&self, lock: LockInfo) -> LockGuard {
        self.wait_with_state(lock, ThreadState::Blocked)
    }

    /// Like [`wait_for`](Self::wait_for) with an explicit waiting state.
    pub fn wait_with_state(&self, lock: LockInfo, state: ThreadState) -> LockGuard {
        *self.state.waiting_on.write() = Some(lock);
        self.set_state(state);
        LockGuard {
            state: self.state.clone(),
            kind: LockKind::Waiting,
        }
    }

    /// Record that the thread holds `lock` until the guard drops.
    pub fn hold(&self, lock: LockInfo) -> LockGuard {
        let name = lock.name.clone();
        self.state.held_locks.write().push(lock);
        LockGuard {
            state: self.state.clone(),
            kind: LockKind::Held(name),
        }
    }
}

/// Guard that pops a frame (and anything pushed after it) when dropped.
pub struct FrameGuard {
    state: Arc<ProbeState>,
    depth: usize,
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        self.state.frames.write().truncate(self.depth);
    }
}

enum LockKind {
    Waiting,
    Held(String),
}

/// Guard that clears a lock annotation when dropped.
pub struct LockGuard {
    state: Arc<ProbeState>,
    kind: LockKind,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        match &self.kind {
            LockKind::Waiting => {
                *self.state.waiting_on.write() = None;
                self.state
                    .state
                    .store(state_to_u8(ThreadState::Runnable), Ordering::Relaxed);
            }
            LockKind::Held(name) => {
                let mut held = self.state.held_locks.write();
                if let Some(pos) = held.iter().rposition(|lock| &lock.name == name) {
                    held.remove(pos);
                }
            }
        }
    }
}
