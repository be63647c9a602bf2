//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
//! Binding detection to host foreground/background transitions
//!
//! A [`LifecycleBinding`] pauses detection while the host is in the
//! background. Explicit [`start`](LifecycleBinding::start) and
//! [`stop`](LifecycleBinding::stop) attach and detach the binding, so an
//! application that stopped detection on purpose is not restarted by the
//! next foreground transition.

#![forbid(unsafe_code)]

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::Receiver;
use parking_lot::Mutex;

use crate::accessor::ThreadAccessor;
use crate::detector::{BlockedThreadDetector, DetectorError};

#[cfg(feature = "tracing")]
use tracing::{debug, warn};

/// Host lifecycle transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Host became visible / active
    Foreground,
    /// Host moved to the background
    Background,
}

/// Forwards lifecycle transitions to a detector
pub struct LifecycleBinding {
    detector: Arc<BlockedThreadDetector>,
    control: Option<Arc<dyn ThreadAccessor>>,
    attached: Mutex<bool>,
}

impl LifecycleBinding {
    /// Bind `detector`; transitions are applied on the calling thread
    pub fn new(detector: Arc<BlockedThreadDetector>) -> Arc<Self> {
        Arc::new(Self {
            detector,
            control: None,
            attached: Mutex::new(false),
        })
    }

    /// Bind `detector`, applying transitions on the host's control thread
    ///
    /// Events raised on any other thread are posted to `control`.
    pub fn with_control_thread(
        detector: Arc<BlockedThreadDetector>,
        control: impl ThreadAccessor + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            detector,
            control: Some(Arc::new(control)),
            attached: Mutex::new(false),
        })
    }

    /// The bound detector
    pub fn detector(&self) -> &Arc<BlockedThreadDetector> {
        &self.detector
    }

    /// True while lifecycle events drive the detector
    pub fn is_attached(&self) -> bool {
        *self.attached.lock()
    }

    /// Start detection after `delay` and follow lifecycle events from now on
    ///
    /// # Errors
    ///
    /// Propagates [`DetectorError::Spawn`] from the detector.
    pub fn start(&self, delay: Duration) -> Result<(), DetectorError> {
        let mut attached = self.attached.lock();
        self.detector.start_detection_after(delay)?;
        *attached = true;
        Ok(())
    }

    /// Stop detection and ignore lifecycle events until the next start
    pub fn stop(&self) {
        let mut attached = self.attached.lock();
        self.detector.stop_detection();
        *attached = false;
    }

    /// Handle a transition
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError::Post`] if the event had to be handed to the
    /// control thread and could not be, or the detector's start error when
    /// applied inline.
    pub fn on_event(self: &Arc<Self>, event: LifecycleEvent) -> Result<(), DetectorError> {
        match &self.control {
            Some(control) if !control.is_current_thread() => {
                let binding = self.clone();
                control.post(Box::new(move || {
                    if let Err(err) = binding.apply(event) {
                        #[cfg(feature = "tracing")]
                        warn!(?event, error = %err, "Lifecycle transition failed");
                        #[cfg(not(feature = "tracing"))]
                        let _ = err;
                    }
                }))?;
                Ok(())
            }
            _ => self.apply(event),
        }
    }

    /// Consume transitions from `events` on a dedicated thread
    ///
    /// The thread exits once every sender of `events` is dropped.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be created.
    pub fn forward(self: &Arc<Self>, events: Receiver<LifecycleEvent>) -> io::Result<JoinHandle<()>> {
        let binding = self.clone();
        thread::Builder::new()
            .name(format!("{}-lifecycle", self.detector.config().thread_name_prefix))
            .spawn(move || {
                for event in events.iter() {
                    if let Err(err) = binding.on_event(event) {
                        #[cfg(feature = "tracing")]
                        warn!(?event, error = %err, "Lifecycle transition failed");
                        #[cfg(not(feature = "tracing"))]
                        let _ = err;
                    }
                }
            })
    }

    fn apply(&self, event: LifecycleEvent) -> Result<(), DetectorError> {
        let attached = self.attached.lock();
        if !*attached {
            #[cfg(feature = "tracing")]
            debug!(?event, "Binding detached; ignoring lifecycle event");
            return Ok(());
        }

        match event {
            LifecycleEvent::Foreground => self.detector.start_detection_after(Duration::ZERO),
            LifecycleEvent::Background => {
                self.detector.stop_detection();
                Ok(())
            }
        }
    }
}
