//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
//! Blocked-thread events delivered to listeners

#![forbid(unsafe_code)]

use std::fmt;
use std::thread::ThreadId;
use std::time::Duration;

use crate::stack::StackTrace;

/// Stack captured for one thread at report time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadStackTrace {
    /// Identifier of the captured thread
    pub thread_id: ThreadId,
    /// Name of the captured thread
    pub thread_name: String,
    /// Stack at capture time, innermost frame first
    pub stack: StackTrace,
}

/// A confirmed blockage of the monitored thread
///
/// One event is produced per blockage episode. It is immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedThreadEvent {
    duration_blocked: Duration,
    threshold: Duration,
    stack_traces: Vec<ThreadStackTrace>,
}

impl BlockedThreadEvent {
    pub(crate) fn new(
        duration_blocked: Duration,
        threshold: Duration,
        stack_traces: Vec<ThreadStackTrace>,
    ) -> Self {
        Self {
            duration_blocked,
            threshold,
            stack_traces,
        }
    }

    /// Time the unacknowledged ping had been pending when the report fired
    pub fn duration_blocked(&self) -> Duration {
        self.duration_blocked
    }

    /// [`duration_blocked`](Self::duration_blocked) in whole milliseconds
    pub fn duration_blocked_millis(&self) -> u64 {
        duration_millis(self.duration_blocked)
    }

    /// Threshold in effect for the detector
    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// [`threshold`](Self::threshold) in whole milliseconds
    pub fn threshold_millis(&self) -> u64 {
        duration_millis(self.threshold)
    }

    /// Captured stacks in provider order
    pub fn stack_traces(&self) -> &[ThreadStackTrace] {
        &self.stack_traces
    }

    /// Take ownership of the captured stacks
    pub fn into_stack_traces(self) -> Vec<ThreadStackTrace> {
        self.stack_traces
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl fmt::Display for BlockedThreadEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Thread blocked for {}ms (threshold {}ms)",
            self.duration_blocked_millis(),
            self.threshold_millis()
        )?;
        for trace in &self.stack_traces {
            writeln!(f, "\"{}\" ({:?})", trace.thread_name, trace.thread_id)?;
            write!(f, "{}", trace.stack)?;
        }
        Ok(())
    }
}
