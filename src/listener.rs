//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
//! Consumers of blocked-thread events

#![forbid(unsafe_code)]

use crossbeam::channel::Sender;

use crate::event::BlockedThreadEvent;

#[cfg(feature = "tracing")]
use tracing::warn;

/// Receives confirmed blockages
///
/// Called on the detector's reporting thread, never on the monitored thread
/// or the timer thread. A panic inside the listener is caught and logged and
/// only loses that one event.
pub trait BlockedThreadListener: Send + Sync {
    /// Handle a blockage event
    fn on_blocked_thread_detected(&self, event: BlockedThreadEvent);
}

impl<F> BlockedThreadListener for F
where
    F: Fn(BlockedThreadEvent) + Send + Sync,
{
    fn on_blocked_thread_detected(&self, event: BlockedThreadEvent) {
        self(event);
    }
}

/// Forwards events into a channel; a disconnected receiver drops them
impl BlockedThreadListener for Sender<BlockedThreadEvent> {
    fn on_blocked_thread_detected(&self, event: BlockedThreadEvent) {
        let _ = self.send(event);
    }
}

/// Default listener writing each event to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockedThreadLogWriter;

impl BlockedThreadListener for BlockedThreadLogWriter {
    fn on_blocked_thread_detected(&self, event: BlockedThreadEvent) {
        #[cfg(feature = "tracing")]
        warn!(
            duration_ms = event.duration_blocked_millis(),
            threshold_ms = event.threshold_millis(),
            threads = event.stack_traces().len(),
            "Blocked thread detected\n{event}"
        );

        #[cfg(not(feature = "tracing"))]
        eprintln!("{event}");
    }
}
