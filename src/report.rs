//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
//! Dedicated reporting thread
//!
//! Stack capture and listener calls run here so the poll loop keeps its
//! cadence no matter how slow a provider, sampler or listener is. Jobs queued
//! by a run that has since been stopped are discarded; a job already being
//! processed always completes.

#![forbid(unsafe_code)]

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::Receiver;

use crate::detector::DetectorShared;
use crate::event::{BlockedThreadEvent, ThreadStackTrace};
use crate::listener::BlockedThreadListener;
use crate::stack::CaptureError;
use crate::threads::ThreadSnapshotProvider;

#[cfg(feature = "tracing")]
use tracing::{debug, error, info, warn};

/// Breach handed from the poll loop to the reporting thread
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReportJob {
    /// Sequence number of the unacknowledged ping
    pub seq: u64,
    /// Run epoch the breach was detected in
    pub epoch: u64,
    /// Elapsed time at the poll that triggered the report
    pub duration_blocked: Duration,
    /// Threshold in effect
    pub threshold: Duration,
}

pub(crate) enum ReporterMessage {
    Report(ReportJob),
    Shutdown,
}

pub(crate) struct Reporter {
    provider: Arc<dyn ThreadSnapshotProvider>,
    listener: Arc<dyn BlockedThreadListener>,
    shared: Arc<DetectorShared>,
}

impl Reporter {
    pub(crate) fn new(
        provider: Arc<dyn ThreadSnapshotProvider>,
        listener: Arc<dyn BlockedThreadListener>,
        shared: Arc<DetectorShared>,
    ) -> Self {
        Self {
            provider,
            listener,
            shared,
        }
    }

    /// Run the reporter on a new named thread
    pub(crate) fn spawn(
        self,
        name: String,
        messages: Receiver<ReporterMessage>,
    ) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(name)
            .spawn(move || self.run(messages))
    }

    fn run(self, messages: Receiver<ReporterMessage>) {
        #[cfg(feature = "tracing")]
        debug!("Reporter thread started");

        for message in messages.iter() {
            let job = match message {
                ReporterMessage::Report(job) => job,
                ReporterMessage::Shutdown => break,
            };

            if job.epoch != self.shared.epoch.load(Ordering::Acquire) {
                self.shared.metrics.record_job_cancelled();

                #[cfg(feature = "tracing")]
                debug!(seq = job.seq, "Detection stopped before report started; dropping it");

                continue;
            }

            self.process(job);
        }

        #[cfg(feature = "tracing")]
        debug!("Reporter thread exiting");
    }

    fn process(&self, job: ReportJob) {
        match capture_threads(self.provider.as_ref()) {
            Ok(stack_traces) => {
                let event = BlockedThreadEvent::new(job.duration_blocked, job.threshold, stack_traces);
                self.deliver(event);
            }
            Err(err) => {
                self.shared.metrics.record_sample_failure();

                #[cfg(feature = "tracing")]
                warn!(seq = job.seq, error = %err, "Stack capture failed; retrying on next poll");
                #[cfg(not(feature = "tracing"))]
                let _ = err;

                // Lets the poll loop re-arm the same ping
                let _ = self.shared.retry_tx.send(job.seq);
            }
        }
    }

    fn deliver(&self, event: BlockedThreadEvent) {
        #[cfg(feature = "tracing")]
        info!(
            duration_ms = event.duration_blocked_millis(),
            threads = event.stack_traces().len(),
            "Delivering blocked thread event"
        );

        let listener = &self.listener;
        match panic::catch_unwind(AssertUnwindSafe(|| listener.on_blocked_thread_detected(event))) {
            Ok(()) => self.shared.metrics.record_event_delivered(),
            Err(payload) => {
                self.shared.metrics.record_listener_failure();

                #[cfg(feature = "tracing")]
                error!(panic = %panic_message(payload.as_ref()), "Listener panicked; event dropped");
                #[cfg(not(feature = "tracing"))]
                let _ = payload;
            }
        }
    }
}

/// Ask the provider for threads and capture each stack in provider order
///
/// Any provider or sampler failure, including a panic, fails the whole sample.
pub(crate) fn capture_threads(
    provider: &dyn ThreadSnapshotProvider,
) -> Result<Vec<ThreadStackTrace>, CaptureError> {
    let threads = guarded(|| provider.threads())?;

    threads
        .iter()
        .map(|thread| {
            let stack = guarded(|| thread.capture())?;
            Ok(ThreadStackTrace {
                thread_id: thread.id(),
                thread_name: thread.name().to_string(),
                stack,
            })
        })
        .collect()
}

fn guarded<T>(capture: impl FnOnce() -> Result<T, CaptureError>) -> Result<T, CaptureError> {
    panic::catch_unwind(AssertUnwindSafe(capture))
        .unwrap_or_else(|payload| Err(CaptureError::Panicked(panic_message(payload.as_ref()))))
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}
