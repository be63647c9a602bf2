//! ANR-Pulse: thread-liveness watchdog
//!
//! Detects when a monitored thread (usually an application's main or UI
//! thread) stops processing work, and reports each blockage once with stack
//! snapshots of the threads you care about.
//!
//! # How it works
//!
//! - A timer thread posts a no-op "ping" to the monitored thread through a
//!   [`ThreadAccessor`] and polls whether it has run.
//! - A ping pending for longer than the threshold is a blockage. Unless a
//!   [`DetectionExemption`] is active (by default: a debugger is attached),
//!   the blockage is handed to a reporting thread.
//! - The reporting thread asks the [`ThreadSnapshotProvider`] which threads to
//!   capture, samples their stacks and hands a [`BlockedThreadEvent`] to the
//!   [`BlockedThreadListener`].
//!
//! Detection only observes; it never tries to unblock the monitored thread.
//!
//! # Example
//!
//! ```rust,no_run
//! use anr_pulse::event_loop::EventLoop;
//! use anr_pulse::{BlockedThreadEvent, DetectorBuilder, ThreadAccessor};
//! use std::time::Duration;
//!
//! let (ui, _ui_thread) = EventLoop::spawn("ui").unwrap();
//!
//! let detector = DetectorBuilder::for_loop(&ui)
//!     .threshold(Duration::from_secs(1))
//!     .listener(|event: BlockedThreadEvent| eprintln!("{event}"))
//!     .build()
//!     .unwrap();
//! detector.start_detection().unwrap();
//!
//! ui.post(Box::new(|| {
//!     let _frame = anr_pulse::frame("slow_handler");
//!     std::thread::sleep(Duration::from_secs(3));
//! }))
//! .unwrap();
//! ```
//!
//! # Features
//!
//! - `tracing` (default): structured logs through `tracing`
//! - `metrics`: mirror [`DetectorMetrics`] counters to the `metrics` facade

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![warn(rust_2018_idioms)]

//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
// Blocked thread detection
/// Posting work onto the monitored thread
pub mod accessor;
/// Detector configuration and builder
pub mod config;
/// Detection engine
pub mod detector;
/// Blocked-thread events
pub mod event;
/// Task loop for monitored threads
pub mod event_loop;
/// Reporting exemptions
pub mod exemption;
/// Lifecycle binding
pub mod lifecycle;
/// Event listeners
pub mod listener;
/// Detector counters
pub mod metrics;
/// Stack snapshots
pub mod stack;
/// Thread handles and providers
pub mod threads;

mod report;

// Public API exports
pub use accessor::{PostError, Task, ThreadAccessor};
pub use config::{ConfigError, DetectorBuilder, DetectorConfig};
pub use detector::{BlockedThreadDetector, DetectorError};
pub use event::{BlockedThreadEvent, ThreadStackTrace};
pub use exemption::{DebuggerExemption, DetectionExemption, ExemptionFlag};
pub use lifecycle::{LifecycleBinding, LifecycleEvent};
pub use listener::{BlockedThreadListener, BlockedThreadLogWriter};
pub use metrics::{DetectorMetrics, DetectorMetricsSnapshot};
pub use stack::{CaptureError, StackFrame, StackSampler, StackTrace, frame};
pub use threads::{
    ActiveThreadProvider, FilteredThreadProvider, PredefinedThreadProvider, RegistrationGuard,
    ThreadHandle, ThreadSnapshotProvider, register_current_thread,
};
