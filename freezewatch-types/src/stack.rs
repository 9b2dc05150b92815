//! Thread stacks captured while the event loop is blocked.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// A single frame of a captured call stack.
///
/// Frames are identified by a `class_name` (the owning type, module or
/// namespace) and a `method_name`. Filter rules match on exactly this pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StackFrame {
    pub class_name: String,
    pub method_name: String,

    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub file_name: Option<String>,

    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub line_number: Option<u32>,
}

impl StackFrame {
    /// Create a frame without source location.
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
            file_name: None,
            line_number: None,
        }
    }

    /// Attach a source location.
    pub fn at(mut self, file_name: impl Into<String>, line_number: u32) -> Self {
        self.file_name = Some(file_name.into());
        self.line_number = Some(line_number);
        self
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class_name, self.method_name)?;
        match (&self.file_name, self.line_number) {
            (Some(file), Some(line)) => write!(f, "({}:{})", file, line),
            (Some(file), None) => write!(f, "({})", file),
            _ => Ok(()),
        }
    }
}

/// Execution state of a thread at the moment it was sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ThreadState {
    New,
    #[default]
    Runnable,
    Blocked,
    Waiting,
    TimedWaiting,
    Terminated,
}

impl ThreadState {
    /// Upper-case label used in rendered reports.
    pub fn label(&self) -> &'static str {
        match self {
            ThreadState::New => "NEW",
            ThreadState::Runnable => "RUNNABLE",
            ThreadState::Blocked => "BLOCKED",
            ThreadState::Waiting => "WAITING",
            ThreadState::TimedWaiting => "TIMED_WAITING",
            ThreadState::Terminated => "TERMINATED",
        }
    }
}

/// A lock a thread is waiting for or holding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LockInfo {
    /// Human-readable lock identity (type name plus address, or a label).
    pub name: String,

    /// Name of the thread currently owning the lock, if known.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub owner_name: Option<String>,

    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub owner_id: Option<u64>,
}

impl LockInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner_name: None,
            owner_id: None,
        }
    }

    /// Record which thread owns the lock.
    pub fn owned_by(mut self, name: impl Into<String>, id: u64) -> Self {
        self.owner_name = Some(name.into());
        self.owner_id = Some(id);
        self
    }
}

/// The call stack of one thread within a [`StackSample`](crate::StackSample).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThreadStack {
    pub id: u64,
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub state: ThreadState,

    /// Frames with the innermost (currently executing) frame first.
    #[cfg_attr(feature = "serde", serde(default))]
    pub frames: Vec<StackFrame>,

    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub waiting_on: Option<LockInfo>,

    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Vec::is_empty")
    )]
    pub held_locks: Vec<LockInfo>,
}

impl ThreadStack {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            state: ThreadState::Runnable,
            frames: Vec::new(),
            waiting_on: None,
            held_locks: Vec::new(),
        }
    }

    pub fn state(mut self, state: ThreadState) -> Self {
        self.state = state;
        self
    }

    /// Append a frame below the ones already present.
    pub fn frame(mut self, frame: StackFrame) -> Self {
        self.frames.push(frame);
        self
    }

    pub fn waiting_on(mut self, lock: LockInfo) -> Self {
        self.waiting_on = Some(lock);
        self
    }

    pub fn holding(mut self, lock: LockInfo) -> Self {
        self.held_locks.push(lock);
        self
    }

    /// The innermost frame, if the stack is not empty.
    pub fn top_frame(&self) -> Option<&StackFrame> {
        self.frames.first()
    }
}
