//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
//! Exemptions that suppress reporting without pausing detection

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Predicate checked when a ping first crosses the threshold
///
/// Runs on the detector's timer thread; implementations must not block.
pub trait DetectionExemption: Send + Sync {
    /// True while blockages should not be reported
    fn is_exemption_active(&self) -> bool;
}

impl<F> DetectionExemption for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_exemption_active(&self) -> bool {
        self()
    }
}

/// Suppresses reports while a debugger or tracer is attached
///
/// Breakpoints stop the monitored thread and would otherwise be reported as
/// blockages. On Linux the `TracerPid` field of `/proc/self/status` is used;
/// other targets never report a debugger.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebuggerExemption;

impl DebuggerExemption {
    /// True if a tracer is attached to this process
    pub fn debugger_attached() -> bool {
        #[cfg(target_os = "linux")]
        {
            std::fs::read_to_string("/proc/self/status")
                .map(|status| tracer_attached(&status))
                .unwrap_or(false)
        }

        #[cfg(not(target_os = "linux"))]
        {
            false
        }
    }
}

impl DetectionExemption for DebuggerExemption {
    fn is_exemption_active(&self) -> bool {
        Self::debugger_attached()
    }
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn tracer_attached(status: &str) -> bool {
    status
        .lines()
        .find_map(|line| line.strip_prefix("TracerPid:"))
        .and_then(|pid| pid.trim().parse::<u32>().ok())
        .is_some_and(|pid| pid != 0)
}

/// Shared on/off switch for exemptions decided at runtime
#[derive(Debug, Clone, Default)]
pub struct ExemptionFlag {
    active: Arc<AtomicBool>,
}

impl ExemptionFlag {
    /// Create an inactive flag
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn the exemption on or off
    pub fn set(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    /// Current state
    pub fn is_set(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl DetectionExemption for ExemptionFlag {
    fn is_exemption_active(&self) -> bool {
        self.is_set()
    }
}
