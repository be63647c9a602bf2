//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
//! Stack snapshots for blocked threads
//!
//! Safe Rust has no portable way to walk the native stack of *another* thread,
//! so the default sampling mechanism is a cooperative shadow stack: a thread
//! that is registered with the watchdog pushes named frames as it enters
//! interesting regions, and the reporting thread copies that stack when a
//! blockage is confirmed.
//!
//! ```rust
//! use anr_pulse::stack::ShadowStack;
//! use anr_pulse::StackSampler;
//! use std::sync::Arc;
//!
//! let stack = Arc::new(ShadowStack::new());
//! let _outer = stack.enter("render_frame");
//! let _inner = stack.enter("layout");
//!
//! let trace = stack.sample().unwrap();
//! assert_eq!(trace.frames()[0].name(), "layout");
//! assert_eq!(trace.frames()[1].name(), "render_frame");
//! ```

#![forbid(unsafe_code)]

use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use parking_lot::Mutex;

/// Errors raised while collecting threads or their stacks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// The thread provider could not produce a thread list
    #[error("Thread provider failed: {0}")]
    Provider(String),

    /// A single thread's stack could not be sampled
    #[error("Stack sampling failed for thread '{thread}': {reason}")]
    Sampler {
        /// Name of the thread being sampled
        thread: String,
        /// Sampler-specific failure description
        reason: String,
    },

    /// The monitored thread has not started running its loop yet
    #[error("Monitored thread is not bound yet")]
    NotBound,

    /// A provider or sampler panicked
    #[error("Capture panicked: {0}")]
    Panicked(String),
}

/// A single named frame of a captured stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    name: Cow<'static, str>,
    location: Option<&'static Location<'static>>,
}

impl StackFrame {
    /// Create a frame without source location
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            location: None,
        }
    }

    /// Create a frame that remembers where it was entered
    pub fn with_location(
        name: impl Into<Cow<'static, str>>,
        location: &'static Location<'static>,
    ) -> Self {
        Self {
            name: name.into(),
            location: Some(location),
        }
    }

    /// Frame name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source location the frame was entered at, if recorded
    pub fn location(&self) -> Option<&'static Location<'static>> {
        self.location
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(f, "{} ({}:{})", self.name, loc.file(), loc.line()),
            None => f.write_str(&self.name),
        }
    }
}

/// Captured call stack, innermost frame first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackTrace {
    frames: Vec<StackFrame>,
}

impl StackTrace {
    /// Build a trace from frames ordered innermost first
    pub fn new(frames: Vec<StackFrame>) -> Self {
        Self { frames }
    }

    /// Frames, innermost first
    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True when nothing was captured
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl fmt::Display for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.frames.is_empty() {
            return writeln!(f, "    <no frames>");
        }
        for frame in &self.frames {
            writeln!(f, "    at {frame}")?;
        }
        Ok(())
    }
}

/// Source of a thread's current call stack
///
/// Implementations are invoked from the reporting thread, never from the
/// thread being sampled.
pub trait StackSampler: Send + Sync {
    /// Capture the current stack of the sampled thread
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError`] when the stack is not obtainable right now.
    fn sample(&self) -> Result<StackTrace, CaptureError>;
}

/// Cooperative stack maintained by the thread it describes
#[derive(Debug, Default)]
pub struct ShadowStack {
    frames: Mutex<Vec<StackFrame>>,
}

impl ShadowStack {
    /// Create an empty stack
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a frame and return a guard that unwinds to the previous depth
    #[track_caller]
    pub fn enter(self: &Arc<Self>, name: impl Into<Cow<'static, str>>) -> FrameGuard {
        let depth = self.push(StackFrame::with_location(name, Location::caller()));
        FrameGuard {
            stack: Some(Arc::clone(self)),
            depth,
        }
    }

    /// Push a frame, returning the depth before the push
    pub fn push(&self, frame: StackFrame) -> usize {
        let mut frames = self.frames.lock();
        let depth = frames.len();
        frames.push(frame);
        depth
    }

    /// Pop the innermost frame
    pub fn pop(&self) -> Option<StackFrame> {
        self.frames.lock().pop()
    }

    /// Current number of frames
    pub fn depth(&self) -> usize {
        self.frames.lock().len()
    }

    /// Copy the stack, innermost frame first
    pub fn snapshot(&self) -> StackTrace {
        let frames = self.frames.lock();
        StackTrace::new(frames.iter().rev().cloned().collect())
    }

    fn unwind_to(&self, depth: usize) {
        self.frames.lock().truncate(depth);
    }
}

impl StackSampler for ShadowStack {
    fn sample(&self) -> Result<StackTrace, CaptureError> {
        Ok(self.snapshot())
    }
}

/// Pops a shadow frame when dropped
///
/// Dropping guards out of order truncates to the oldest guard's depth, so a
/// leaked inner guard never leaves stale frames behind its parent.
#[must_use = "the frame is popped as soon as the guard is dropped"]
#[derive(Debug)]
pub struct FrameGuard {
    stack: Option<Arc<ShadowStack>>,
    depth: usize,
}

impl FrameGuard {
    /// Guard that does nothing, handed out on unregistered threads
    fn inert() -> Self {
        Self {
            stack: None,
            depth: 0,
        }
    }

    /// True when the guard actually pushed a frame
    pub fn is_recording(&self) -> bool {
        self.stack.is_some()
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        if let Some(stack) = self.stack.take() {
            stack.unwind_to(self.depth);
        }
    }
}

thread_local! {
    static CURRENT_STACK: RefCell<Option<Arc<ShadowStack>>> = const { RefCell::new(None) };
}

/// Install the shadow stack for the calling thread, returning the previous one
pub(crate) fn install_current(stack: Option<Arc<ShadowStack>>) -> Option<Arc<ShadowStack>> {
    CURRENT_STACK.with(|cell| cell.replace(stack))
}

/// Shadow stack of the calling thread, if it is registered
pub fn current_stack() -> Option<Arc<ShadowStack>> {
    CURRENT_STACK.with(|cell| cell.borrow().clone())
}

/// Enter a named frame on the calling thread's shadow stack
///
/// On threads that never registered with the watchdog this is a no-op.
///
/// ```rust
/// let _frame = anr_pulse::frame("decode_image");
/// // ... work that may block ...
/// ```
#[track_caller]
pub fn frame(name: impl Into<Cow<'static, str>>) -> FrameGuard {
    let location = Location::caller();
    match current_stack() {
        Some(stack) => {
            let depth = stack.push(StackFrame::with_location(name, location));
            FrameGuard {
                stack: Some(stack),
                depth,
            }
        }
        None => FrameGuard::inert(),
    }
}
