//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
//! Blocked-thread detection engine
//!
//! A timer thread posts a marker task ("ping") onto the monitored thread and
//! polls until the marker has run. A ping still pending after the threshold is
//! a blockage: unless an exemption is active, one report is queued for the
//! reporting thread, which captures stacks and calls the listener. The same
//! ping is never reported twice; the next ping is posted only after the
//! current one was acknowledged.
//!
//! # Threads
//!
//! - monitored thread: only runs marker tasks
//! - `<prefix>-timer`: one per running detector, owns the poll state
//! - `<prefix>-reporter`: one per detector, stack capture and listener calls
//!
//! # Example
//!
//! ```rust,no_run
//! use anr_pulse::DetectorBuilder;
//! use anr_pulse::event_loop::EventLoop;
//! use std::time::Duration;
//!
//! let (ui, _worker) = EventLoop::spawn("ui").unwrap();
//! let detector = DetectorBuilder::for_loop(&ui)
//!     .threshold(Duration::from_millis(500))
//!     .build()
//!     .unwrap();
//!
//! detector.start_detection().unwrap();
//! // ... the ui thread runs ...
//! detector.stop_detection();
//! ```

#![forbid(unsafe_code)]

use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;

use crate::accessor::{PostError, Task, ThreadAccessor};
use crate::config::{ConfigError, DetectorConfig};
use crate::exemption::DetectionExemption;
use crate::listener::BlockedThreadListener;
use crate::metrics::{DetectorMetrics, DetectorMetricsSnapshot};
use crate::report::{self, ReportJob, Reporter, ReporterMessage};
use crate::threads::ThreadSnapshotProvider;

#[cfg(feature = "tracing")]
use tracing::{debug, error, info, trace, warn};

/// Errors raised while building or starting a detector
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    /// Configuration rejected at build time
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A timer or reporter thread could not be created
    #[error("Failed to spawn detector thread: {0}")]
    Spawn(#[source] io::Error),

    /// A control request could not be handed to the control thread
    #[error("Failed to reach control thread: {0}")]
    Post(#[from] PostError),
}

/// Pluggable collaborators of a detector
pub(crate) struct Capabilities {
    pub accessor: Arc<dyn ThreadAccessor>,
    pub provider: Arc<dyn ThreadSnapshotProvider>,
    pub listener: Arc<dyn BlockedThreadListener>,
    pub exemption: Option<Arc<dyn DetectionExemption>>,
}

/// State shared by the detector, its timer thread and its reporter thread
pub(crate) struct DetectorShared {
    /// Highest ping sequence whose marker has run on the monitored thread
    pub acked_seq: Arc<AtomicU64>,
    /// Last ping sequence handed out
    pub next_seq: AtomicU64,
    /// Incremented by every stop; reports from older epochs are cancelled
    pub epoch: AtomicU64,
    pub metrics: DetectorMetrics,
    /// Pings whose report failed to sample and may be reported again
    pub retry_tx: Sender<u64>,
    pub retry_rx: Receiver<u64>,
}

struct TimerHandle {
    /// Dropped to stop the timer
    stop: Sender<()>,
    worker: JoinHandle<()>,
}

/// Watches one thread and reports when it stops responding
///
/// Start and stop may be called from any thread, any number of times.
pub struct BlockedThreadDetector {
    config: DetectorConfig,
    interval: Duration,
    accessor: Arc<dyn ThreadAccessor>,
    exemption: Option<Arc<dyn DetectionExemption>>,
    shared: Arc<DetectorShared>,
    timer: Mutex<Option<TimerHandle>>,
    reports: Sender<ReporterMessage>,
    reporter: Option<JoinHandle<()>>,
}

impl BlockedThreadDetector {
    pub(crate) fn from_parts(
        config: DetectorConfig,
        capabilities: Capabilities,
    ) -> Result<Self, DetectorError> {
        let (retry_tx, retry_rx) = channel::unbounded();
        let shared = Arc::new(DetectorShared {
            acked_seq: Arc::new(AtomicU64::new(0)),
            next_seq: AtomicU64::new(0),
            epoch: AtomicU64::new(0),
            metrics: DetectorMetrics::new(),
            retry_tx,
            retry_rx,
        });

        let (reports, report_rx) = channel::unbounded();
        let reporter = Reporter::new(capabilities.provider, capabilities.listener, shared.clone())
            .spawn(format!("{}-reporter", config.thread_name_prefix), report_rx)
            .map_err(DetectorError::Spawn)?;

        let interval = config.effective_inspection_interval();

        #[cfg(feature = "tracing")]
        debug!(
            threshold_ms = config.threshold.as_millis(),
            interval_ms = interval.as_millis(),
            exemption = capabilities.exemption.is_some(),
            "Blocked thread detector created"
        );

        Ok(Self {
            config,
            interval,
            accessor: capabilities.accessor,
            exemption: capabilities.exemption,
            shared,
            timer: Mutex::new(None),
            reports,
            reporter: Some(reporter),
        })
    }

    /// Start polling after the configured start delay
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError::Spawn`] if the timer thread cannot be created.
    pub fn start_detection(&self) -> Result<(), DetectorError> {
        self.start_detection_after(self.config.start_delay)
    }

    /// Start polling after `delay`
    ///
    /// A no-op while already running; never creates a second poll loop.
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError::Spawn`] if the timer thread cannot be created.
    pub fn start_detection_after(&self, delay: Duration) -> Result<(), DetectorError> {
        let mut timer = self.timer.lock();
        if timer.is_some() {
            #[cfg(feature = "tracing")]
            debug!("Detection already running");
            return Ok(());
        }

        let (stop, stop_rx) = channel::bounded::<()>(0);
        let inspector = Inspector {
            accessor: self.accessor.clone(),
            exemption: self.exemption.clone(),
            threshold: self.config.threshold,
            epoch: self.shared.epoch.load(Ordering::Acquire),
            shared: self.shared.clone(),
            reports: self.reports.clone(),
            outstanding: None,
        };
        let interval = self.interval;

        let worker = thread::Builder::new()
            .name(format!("{}-timer", self.config.thread_name_prefix))
            .spawn(move || inspector.run(delay, interval, stop_rx))
            .map_err(DetectorError::Spawn)?;
        *timer = Some(TimerHandle { stop, worker });

        #[cfg(feature = "tracing")]
        info!(
            threshold_ms = self.config.threshold.as_millis(),
            interval_ms = interval.as_millis(),
            delay_ms = delay.as_millis(),
            "Blocked thread detection started"
        );

        Ok(())
    }

    /// Stop polling
    ///
    /// Reports not yet started are cancelled; a report already being captured
    /// or delivered still completes. A no-op when already stopped.
    pub fn stop_detection(&self) {
        let handle = {
            let mut timer = self.timer.lock();
            let handle = timer.take();
            if handle.is_some() {
                self.shared.epoch.fetch_add(1, Ordering::AcqRel);
            }
            handle
        };
        let Some(TimerHandle { stop, worker }) = handle else {
            return;
        };

        // Joined without the slot lock: the timer thread may query it
        drop(stop);

        if worker.thread().id() == thread::current().id() {
            #[cfg(feature = "tracing")]
            debug!("Stop requested from the timer thread; not joining");
        } else if worker.join().is_err() {
            #[cfg(feature = "tracing")]
            error!("Timer thread panicked");
        }

        #[cfg(feature = "tracing")]
        info!("Blocked thread detection stopped");
    }

    /// True between a start and the following stop
    pub fn is_running(&self) -> bool {
        self.timer.lock().is_some()
    }

    /// Configuration the detector was built with
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Threshold in effect
    pub fn threshold(&self) -> Duration {
        self.config.threshold
    }

    /// Poll period in effect
    pub fn inspection_interval(&self) -> Duration {
        self.interval
    }

    /// Counter snapshot
    pub fn metrics(&self) -> DetectorMetricsSnapshot {
        self.shared.metrics.snapshot()
    }
}

impl fmt::Debug for BlockedThreadDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockedThreadDetector")
            .field("config", &self.config)
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl Drop for BlockedThreadDetector {
    fn drop(&mut self) {
        self.stop_detection();

        let _ = self.reports.send(ReporterMessage::Shutdown);
        if let Some(worker) = self.reporter.take() {
            // Dropped from inside a listener: the reporter exits on its own
            if worker.thread().id() != thread::current().id() && worker.join().is_err() {
                #[cfg(feature = "tracing")]
                error!("Reporter thread panicked");
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingPing {
    seq: u64,
    posted_at: Instant,
    reported: bool,
}

/// Poll state owned by the timer thread
struct Inspector {
    accessor: Arc<dyn ThreadAccessor>,
    exemption: Option<Arc<dyn DetectionExemption>>,
    threshold: Duration,
    epoch: u64,
    shared: Arc<DetectorShared>,
    reports: Sender<ReporterMessage>,
    outstanding: Option<PendingPing>,
}

impl Inspector {
    fn run(mut self, delay: Duration, interval: Duration, stop: Receiver<()>) {
        if !delay.is_zero() {
            match stop.recv_timeout(delay) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
            }
        }

        let ticker = channel::tick(interval);
        loop {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| self.inspect())) {
                #[cfg(feature = "tracing")]
                error!(panic = %report::panic_message(payload.as_ref()), "Poll step panicked; continuing");
                #[cfg(not(feature = "tracing"))]
                let _ = payload;
            }

            let stopped = channel::select! {
                recv(stop) -> _ => true,
                recv(ticker) -> _ => matches!(stop.try_recv(), Err(TryRecvError::Disconnected)),
            };
            if stopped {
                break;
            }
        }

        #[cfg(feature = "tracing")]
        debug!("Timer thread exiting");
    }

    /// One poll cycle
    fn inspect(&mut self) {
        self.shared.metrics.record_poll();
        self.rearm_failed_reports();

        match self.outstanding {
            None => self.post_ping(),
            Some(ping) => self.check_ping(ping),
        }
    }

    fn post_ping(&mut self) {
        let seq = self.shared.next_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let acked = self.shared.acked_seq.clone();
        let marker: Task = Box::new(move || {
            acked.fetch_max(seq, Ordering::Release);
        });

        let posted_at = Instant::now();
        let accessor = &self.accessor;
        match panic::catch_unwind(AssertUnwindSafe(|| accessor.post(marker))) {
            Ok(Ok(())) => {
                self.outstanding = Some(PendingPing {
                    seq,
                    posted_at,
                    reported: false,
                });
                self.shared.metrics.record_ping_posted();

                #[cfg(feature = "tracing")]
                trace!(seq, "Ping posted");
            }
            Ok(Err(err)) => {
                self.shared.metrics.record_post_failure();

                #[cfg(feature = "tracing")]
                warn!(seq, error = %err, "Failed to post ping; retrying next poll");
                #[cfg(not(feature = "tracing"))]
                let _ = err;
            }
            Err(payload) => {
                self.shared.metrics.record_post_failure();

                #[cfg(feature = "tracing")]
                warn!(seq, panic = %report::panic_message(payload.as_ref()), "Accessor panicked while posting ping");
                #[cfg(not(feature = "tracing"))]
                let _ = payload;
            }
        }
    }

    fn check_ping(&mut self, mut ping: PendingPing) {
        if self.shared.acked_seq.load(Ordering::Acquire) >= ping.seq {
            self.outstanding = None;
            self.shared.metrics.record_ping_acknowledged();

            #[cfg(feature = "tracing")]
            trace!(seq = ping.seq, latency_ms = ping.posted_at.elapsed().as_millis(), "Ping acknowledged");

            return;
        }

        let elapsed = ping.posted_at.elapsed();
        if ping.reported || elapsed < self.threshold {
            return;
        }

        if let Some(exemption) = &self.exemption {
            match panic::catch_unwind(AssertUnwindSafe(|| exemption.is_exemption_active())) {
                Ok(false) => {}
                Ok(true) => {
                    self.shared.metrics.record_exempted();

                    #[cfg(feature = "tracing")]
                    trace!(seq = ping.seq, elapsed_ms = elapsed.as_millis(), "Breach suppressed by exemption");

                    return;
                }
                Err(payload) => {
                    #[cfg(feature = "tracing")]
                    warn!(panic = %report::panic_message(payload.as_ref()), "Exemption panicked; skipping this poll");
                    #[cfg(not(feature = "tracing"))]
                    let _ = payload;

                    return;
                }
            }
        }

        ping.reported = true;
        self.outstanding = Some(ping);
        self.dispatch(ping.seq, elapsed);
    }

    fn dispatch(&self, seq: u64, elapsed: Duration) {
        self.shared.metrics.record_blockage();

        #[cfg(feature = "tracing")]
        warn!(
            seq,
            elapsed_ms = elapsed.as_millis(),
            threshold_ms = self.threshold.as_millis(),
            "Monitored thread blocked"
        );

        let job = ReportJob {
            seq,
            epoch: self.epoch,
            duration_blocked: elapsed,
            threshold: self.threshold,
        };
        if self.reports.send(ReporterMessage::Report(job)).is_err() {
            #[cfg(feature = "tracing")]
            warn!(seq, "Reporter thread is gone; report dropped");
        }
    }

    /// Clear the reported flag when the reporter could not sample this ping
    fn rearm_failed_reports(&mut self) {
        for seq in self.shared.retry_rx.try_iter() {
            if let Some(ping) = self.outstanding.as_mut() {
                if ping.seq == seq {
                    ping.reported = false;

                    #[cfg(feature = "tracing")]
                    debug!(seq, "Re-arming report after failed sample");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::BlockedThreadEvent;
    use crate::stack::CaptureError;
    use crate::threads::{PredefinedThreadProvider, ThreadHandle};
    use std::sync::atomic::AtomicBool;

    /// Accessor that parks tasks until the test releases them
    #[derive(Default)]
    struct ManualAccessor {
        queue: Mutex<Vec<Task>>,
        fail: AtomicBool,
    }

    impl ManualAccessor {
        fn run_all(&self) -> usize {
            let tasks: Vec<Task> = std::mem::take(&mut *self.queue.lock());
            let count = tasks.len();
            for task in tasks {
                task();
            }
            count
        }
    }

    impl ThreadAccessor for ManualAccessor {
        fn post(&self, task: Task) -> Result<(), PostError> {
            if self.fail.load(Ordering::Relaxed) {
                return Err(PostError::Disconnected);
            }
            self.queue.lock().push(task);
            Ok(())
        }

        fn is_current_thread(&self) -> bool {
            false
        }
    }

    fn inspector(
        accessor: Arc<ManualAccessor>,
        exemption: Option<Arc<dyn DetectionExemption>>,
        threshold: Duration,
    ) -> (Inspector, Receiver<ReporterMessage>) {
        let (retry_tx, retry_rx) = channel::unbounded();
        let shared = Arc::new(DetectorShared {
            acked_seq: Arc::new(AtomicU64::new(0)),
            next_seq: AtomicU64::new(0),
            epoch: AtomicU64::new(0),
            metrics: DetectorMetrics::new(),
            retry_tx,
            retry_rx,
        });
        let (reports, report_rx) = channel::unbounded();
        let inspector = Inspector {
            accessor,
            exemption,
            threshold,
            epoch: 0,
            shared,
            reports,
            outstanding: None,
        };
        (inspector, report_rx)
    }

    fn backdate(inspector: &mut Inspector, by: Duration) {
        let ping = inspector.outstanding.as_mut().unwrap();
        ping.posted_at = Instant::now().checked_sub(by).unwrap();
    }

    #[test]
    fn test_first_poll_posts_ping() {
        let accessor = Arc::new(ManualAccessor::default());
        let (mut inspector, _reports) = inspector(accessor.clone(), None, Duration::from_millis(100));

        inspector.inspect();
        assert_eq!(inspector.outstanding.unwrap().seq, 1);
        assert_eq!(accessor.queue.lock().len(), 1);

        // Still outstanding: no second ping
        inspector.inspect();
        assert_eq!(accessor.queue.lock().len(), 1);
    }

    #[test]
    fn test_ack_clears_then_next_poll_reposts() {
        let accessor = Arc::new(ManualAccessor::default());
        let (mut inspector, reports) = inspector(accessor.clone(), None, Duration::from_millis(100));

        inspector.inspect();
        assert_eq!(accessor.run_all(), 1);

        inspector.inspect();
        assert!(inspector.outstanding.is_none());

        inspector.inspect();
        assert_eq!(inspector.outstanding.unwrap().seq, 2);
        assert!(reports.try_recv().is_err());
        assert_eq!(inspector.shared.metrics.snapshot().pings_acknowledged, 1);
    }

    #[test]
    fn test_breach_reported_once_per_ping() {
        let accessor = Arc::new(ManualAccessor::default());
        let (mut inspector, reports) = inspector(accessor, None, Duration::from_millis(100));

        inspector.inspect();
        backdate(&mut inspector, Duration::from_millis(150));

        inspector.inspect();
        inspector.inspect();
        inspector.inspect();

        let jobs: Vec<_> = reports.try_iter().collect();
        assert_eq!(jobs.len(), 1);
        match &jobs[0] {
            ReporterMessage::Report(job) => {
                assert_eq!(job.seq, 1);
                assert!(job.duration_blocked >= Duration::from_millis(150));
                assert_eq!(job.threshold, Duration::from_millis(100));
            }
            ReporterMessage::Shutdown => panic!("unexpected shutdown"),
        }
    }

    #[test]
    fn test_exemption_defers_report() {
        let accessor = Arc::new(ManualAccessor::default());
        let exempt = Arc::new(AtomicBool::new(true));
        let flag = exempt.clone();
        let exemption: Arc<dyn DetectionExemption> =
            Arc::new(move || flag.load(Ordering::Relaxed));
        let (mut inspector, reports) =
            inspector(accessor, Some(exemption), Duration::from_millis(100));

        inspector.inspect();
        backdate(&mut inspector, Duration::from_millis(200));

        inspector.inspect();
        inspector.inspect();
        assert!(reports.try_recv().is_err());
        assert_eq!(inspector.shared.metrics.snapshot().exempted_breaches, 2);

        exempt.store(false, Ordering::Relaxed);
        inspector.inspect();
        inspector.inspect();
        assert_eq!(reports.try_iter().count(), 1);
    }

    #[test]
    fn test_failed_sample_rearms_same_ping() {
        let accessor = Arc::new(ManualAccessor::default());
        let (mut inspector, reports) = inspector(accessor, None, Duration::from_millis(100));

        inspector.inspect();
        backdate(&mut inspector, Duration::from_millis(150));
        inspector.inspect();
        assert_eq!(reports.try_iter().count(), 1);

        inspector.shared.retry_tx.send(1).unwrap();
        inspector.inspect();
        assert_eq!(reports.try_iter().count(), 1);
    }

    #[test]
    fn test_stale_retry_ignored() {
        let accessor = Arc::new(ManualAccessor::default());
        let (mut inspector, reports) = inspector(accessor, None, Duration::from_millis(100));

        inspector.inspect();
        backdate(&mut inspector, Duration::from_millis(150));
        inspector.inspect();
        assert_eq!(reports.try_iter().count(), 1);

        inspector.shared.retry_tx.send(99).unwrap();
        inspector.inspect();
        assert!(reports.try_recv().is_err());
    }

    #[test]
    fn test_post_failure_leaves_no_outstanding_ping() {
        let accessor = Arc::new(ManualAccessor::default());
        accessor.fail.store(true, Ordering::Relaxed);
        let (mut inspector, _reports) = inspector(accessor.clone(), None, Duration::from_millis(100));

        inspector.inspect();
        assert!(inspector.outstanding.is_none());
        assert_eq!(inspector.shared.metrics.snapshot().post_failures, 1);

        accessor.fail.store(false, Ordering::Relaxed);
        inspector.inspect();
        assert!(inspector.outstanding.is_some());
    }

    #[test]
    fn test_stale_marker_does_not_ack_newer_ping() {
        let accessor = Arc::new(ManualAccessor::default());
        let (mut inspector, _reports) = inspector(accessor.clone(), None, Duration::from_millis(100));

        inspector.inspect();
        let stale: Vec<Task> = std::mem::take(&mut *accessor.queue.lock());

        // Simulate a restart that abandoned ping 1
        inspector.outstanding = None;
        inspector.inspect();
        assert_eq!(inspector.outstanding.unwrap().seq, 2);

        for task in stale {
            task();
        }
        inspector.inspect();
        assert!(inspector.outstanding.is_some());
    }

    struct SlowAccessorLoop;

    impl ThreadAccessor for SlowAccessorLoop {
        fn post(&self, _task: Task) -> Result<(), PostError> {
            // Never runs the marker: permanently blocked thread
            Ok(())
        }

        fn is_current_thread(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_detector_start_is_idempotent() {
        let (tx, rx) = channel::unbounded::<BlockedThreadEvent>();
        let provider = PredefinedThreadProvider::new(Vec::<ThreadHandle>::new());
        let detector = crate::DetectorBuilder::new()
            .thread_accessor(SlowAccessorLoop)
            .thread_provider(provider)
            .listener(tx)
            .no_exemption()
            .threshold(Duration::from_millis(50))
            .inspection_interval(Duration::from_millis(10))
            .build()
            .unwrap();

        detector.start_detection().unwrap();
        detector.start_detection().unwrap();
        detector.start_detection_after(Duration::from_millis(5)).unwrap();
        assert!(detector.is_running());

        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(event.duration_blocked() >= Duration::from_millis(50));
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

        detector.stop_detection();
        detector.stop_detection();
        assert!(!detector.is_running());
        assert_eq!(detector.metrics().pings_posted, 1);
    }

    #[test]
    fn test_exemption_may_query_detector_during_stop() {
        use std::sync::{OnceLock, Weak};

        let slot: Arc<OnceLock<Weak<BlockedThreadDetector>>> = Arc::new(OnceLock::new());
        let (queried_tx, queried_rx) = channel::unbounded::<bool>();
        let lookup = slot.clone();

        let detector = Arc::new(
            crate::DetectorBuilder::new()
                .thread_accessor(SlowAccessorLoop)
                .thread_provider(PredefinedThreadProvider::new(Vec::<ThreadHandle>::new()))
                .listener(|_event: BlockedThreadEvent| {})
                .exemption(move || {
                    let running = lookup
                        .get()
                        .and_then(Weak::upgrade)
                        .is_some_and(|detector| detector.is_running());
                    let _ = queried_tx.send(running);
                    thread::sleep(Duration::from_millis(20));
                    true
                })
                .threshold(Duration::from_millis(20))
                .inspection_interval(Duration::from_millis(5))
                .build()
                .unwrap(),
        );
        assert!(slot.set(Arc::downgrade(&detector)).is_ok());

        detector.start_detection().unwrap();
        assert!(queried_rx.recv_timeout(Duration::from_secs(2)).unwrap());

        let (done_tx, done_rx) = channel::bounded(1);
        let stopper = detector.clone();
        thread::spawn(move || {
            stopper.stop_detection();
            let _ = done_tx.send(());
        });

        done_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(!detector.is_running());
    }

    #[test]
    fn test_debug_omits_capabilities() {
        let detector = crate::DetectorBuilder::new()
            .thread_accessor(SlowAccessorLoop)
            .threshold(Duration::from_millis(300))
            .build()
            .unwrap();

        let rendered = format!("{detector:?}");
        assert!(rendered.starts_with("BlockedThreadDetector"));
        assert!(rendered.contains("running: false"));
        assert!(rendered.ends_with(".. }"));
    }

    #[test]
    fn test_error_display() {
        let err = DetectorError::from(ConfigError::ZeroThreshold);
        assert_eq!(err.to_string(), "Invalid configuration: Threshold must be greater than zero");
        let _ = CaptureError::NotBound.to_string();
    }
}
