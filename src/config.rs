//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
//! Detector configuration and builder
//!
//! All tunables are fixed at construction. The inspection interval defaults
//! to a fifth of the threshold clamped to `[100ms, 500ms]`; an interval set
//! explicitly is used as given.

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use crate::accessor::ThreadAccessor;
use crate::detector::{BlockedThreadDetector, Capabilities, DetectorError};
use crate::event_loop::LoopHandle;
use crate::exemption::{DebuggerExemption, DetectionExemption};
use crate::listener::{BlockedThreadListener, BlockedThreadLogWriter};
use crate::threads::{ActiveThreadProvider, ThreadSnapshotProvider};

/// Threshold used when none is configured
pub const DEFAULT_THRESHOLD: Duration = Duration::from_millis(1_000);

/// Lower clamp for the derived inspection interval
pub const MIN_DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// Upper clamp for the derived inspection interval
pub const MAX_DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

/// Invalid detector configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Threshold must be positive
    #[error("Threshold must be greater than zero")]
    ZeroThreshold,

    /// An explicit inspection interval must be positive
    #[error("Inspection interval must be greater than zero")]
    ZeroInspectionInterval,

    /// No way to reach the monitored thread was configured
    #[error("A thread accessor is required")]
    MissingAccessor,
}

/// Timing configuration for a detector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorConfig {
    /// Minimum time a ping must stay unacknowledged before it is reported
    pub threshold: Duration,

    /// Period of the poll loop; `None` derives it from the threshold
    pub inspection_interval: Option<Duration>,

    /// Delay before the first poll after each start
    pub start_delay: Duration,

    /// Prefix for the timer and reporter thread names
    pub thread_name_prefix: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            inspection_interval: None,
            start_delay: Duration::ZERO,
            thread_name_prefix: "anr-pulse".to_string(),
        }
    }
}

impl DetectorConfig {
    /// Interval the poll loop actually runs at
    pub fn effective_inspection_interval(&self) -> Duration {
        self.inspection_interval.unwrap_or_else(|| {
            (self.threshold / 5).clamp(MIN_DEFAULT_INTERVAL, MAX_DEFAULT_INTERVAL)
        })
    }

    /// Reject non-positive timings
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threshold.is_zero() {
            return Err(ConfigError::ZeroThreshold);
        }
        if self.inspection_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(ConfigError::ZeroInspectionInterval);
        }
        Ok(())
    }
}

/// Builder for [`BlockedThreadDetector`]
///
/// ```rust,no_run
/// use anr_pulse::DetectorBuilder;
/// use anr_pulse::event_loop::EventLoop;
/// use std::time::Duration;
///
/// let (ui, _worker) = EventLoop::spawn("ui").unwrap();
/// let detector = DetectorBuilder::for_loop(&ui)
///     .threshold(Duration::from_secs(2))
///     .listener(|event: anr_pulse::BlockedThreadEvent| eprintln!("{event}"))
///     .build()
///     .unwrap();
/// detector.start_detection().unwrap();
/// ```
pub struct DetectorBuilder {
    config: DetectorConfig,
    accessor: Option<Arc<dyn ThreadAccessor>>,
    provider: Arc<dyn ThreadSnapshotProvider>,
    listener: Arc<dyn BlockedThreadListener>,
    exemption: Option<Arc<dyn DetectionExemption>>,
}

impl DetectorBuilder {
    /// Start from the defaults
    ///
    /// Defaults: [`ActiveThreadProvider`], [`BlockedThreadLogWriter`],
    /// [`DebuggerExemption`]. An accessor must be supplied.
    pub fn new() -> Self {
        Self {
            config: DetectorConfig::default(),
            accessor: None,
            provider: Arc::new(ActiveThreadProvider),
            listener: Arc::new(BlockedThreadLogWriter),
            exemption: Some(Arc::new(DebuggerExemption)),
        }
    }

    /// Monitor the thread running an event loop and capture only that thread
    pub fn for_loop(handle: &LoopHandle) -> Self {
        Self::new()
            .thread_provider(handle.thread_provider())
            .thread_accessor(handle.clone())
    }

    /// Replace the whole timing configuration
    pub fn config(mut self, config: DetectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Accessor used to post pings on the monitored thread
    pub fn thread_accessor(mut self, accessor: impl ThreadAccessor + 'static) -> Self {
        self.accessor = Some(Arc::new(accessor));
        self
    }

    /// Provider of the threads captured in each event
    pub fn thread_provider(mut self, provider: impl ThreadSnapshotProvider + 'static) -> Self {
        self.provider = Arc::new(provider);
        self
    }

    /// Receiver of blocked-thread events
    pub fn listener(mut self, listener: impl BlockedThreadListener + 'static) -> Self {
        self.listener = Arc::new(listener);
        self
    }

    /// Exemption consulted on threshold breach
    pub fn exemption(mut self, exemption: impl DetectionExemption + 'static) -> Self {
        self.exemption = Some(Arc::new(exemption));
        self
    }

    /// Report every breach, even under a debugger
    pub fn no_exemption(mut self) -> Self {
        self.exemption = None;
        self
    }

    /// Minimum blockage duration that is reported
    pub fn threshold(mut self, threshold: Duration) -> Self {
        self.config.threshold = threshold;
        self
    }

    /// Poll period, used as given
    pub fn inspection_interval(mut self, interval: Duration) -> Self {
        self.config.inspection_interval = Some(interval);
        self
    }

    /// Delay before the first poll after each start
    pub fn start_delay(mut self, delay: Duration) -> Self {
        self.config.start_delay = delay;
        self
    }

    /// Prefix for worker thread names
    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    /// Validate and build the detector; detection is not started
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError::Config`] for invalid settings and
    /// [`DetectorError::Spawn`] if the reporting thread cannot be created.
    pub fn build(self) -> Result<BlockedThreadDetector, DetectorError> {
        self.config.validate()?;
        let accessor = self.accessor.ok_or(ConfigError::MissingAccessor)?;

        BlockedThreadDetector::from_parts(
            self.config,
            Capabilities {
                accessor,
                provider: self.provider,
                listener: self.listener,
                exemption: self.exemption,
            },
        )
    }
}

impl Default for DetectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DetectorConfig::default();
        assert_eq!(config.threshold, Duration::from_millis(1000));
        assert_eq!(config.effective_inspection_interval(), Duration::from_millis(200));
        assert_eq!(config.start_delay, Duration::ZERO);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_derived_interval_is_clamped() {
        let short = DetectorConfig {
            threshold: Duration::from_millis(200),
            ..DetectorConfig::default()
        };
        assert_eq!(short.effective_inspection_interval(), MIN_DEFAULT_INTERVAL);

        let long = DetectorConfig {
            threshold: Duration::from_secs(10),
            ..DetectorConfig::default()
        };
        assert_eq!(long.effective_inspection_interval(), MAX_DEFAULT_INTERVAL);
    }

    #[test]
    fn test_explicit_interval_not_clamped() {
        let config = DetectorConfig {
            threshold: Duration::from_secs(10),
            inspection_interval: Some(Duration::from_millis(5)),
            ..DetectorConfig::default()
        };
        assert_eq!(config.effective_inspection_interval(), Duration::from_millis(5));

        let wide = DetectorConfig {
            inspection_interval: Some(Duration::from_secs(3)),
            ..DetectorConfig::default()
        };
        assert_eq!(wide.effective_inspection_interval(), Duration::from_secs(3));
    }

    #[test]
    fn test_validation_errors() {
        let zero_threshold = DetectorConfig {
            threshold: Duration::ZERO,
            ..DetectorConfig::default()
        };
        assert_eq!(zero_threshold.validate(), Err(ConfigError::ZeroThreshold));

        let zero_interval = DetectorConfig {
            inspection_interval: Some(Duration::ZERO),
            ..DetectorConfig::default()
        };
        assert_eq!(zero_interval.validate(), Err(ConfigError::ZeroInspectionInterval));
    }

    #[test]
    fn test_build_requires_accessor() {
        let result = DetectorBuilder::new().build();
        assert!(matches!(
            result,
            Err(DetectorError::Config(ConfigError::MissingAccessor))
        ));
    }

    #[test]
    fn test_build_rejects_zero_threshold() {
        let (_event_loop, handle) = crate::event_loop::EventLoop::new();
        let result = DetectorBuilder::for_loop(&handle)
            .threshold(Duration::ZERO)
            .build();
        assert!(matches!(
            result,
            Err(DetectorError::Config(ConfigError::ZeroThreshold))
        ));
    }
}
