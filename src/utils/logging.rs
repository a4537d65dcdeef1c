//! Switchable logging macros for tracker instrumentation.
//!
//! Visit tracking runs on every navigation, so its chatter is gated behind a
//! process-wide switch instead of relying on `RUST_LOG` alone. The switch is
//! flipped from `TrackerSettings::verbose_logs` (or `PORTAL_TRACKER_DEBUG`).
//!
//! Usage:
//! ```rust
//! use portal_tracker_lib::log_info;
//!
//! portal_tracker_lib::utils::logging::set_enabled(true);
//! log_info!("tracked {} pages", 3);
//! ```
//!
//! `log_warn!` is never gated: a warning is worth seeing even in quiet mode.

use std::sync::atomic::{AtomicBool, Ordering};

static TRACKER_LOGS: AtomicBool = AtomicBool::new(true);

/// Turn the gated macros on or off for the whole process.
pub fn set_enabled(enabled: bool) {
    TRACKER_LOGS.store(enabled, Ordering::Relaxed);
}

pub fn enabled() -> bool {
    TRACKER_LOGS.load(Ordering::Relaxed)
}

/// Debug logging, suppressed when tracker logs are switched off.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if $crate::utils::logging::enabled() {
            log::debug!(target: "portal_tracker", $($arg)*);
        }
    };
}

/// Info logging, suppressed when tracker logs are switched off.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if $crate::utils::logging::enabled() {
            log::info!(target: "portal_tracker", $($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        log::warn!(target: "portal_tracker", $($arg)*);
    };
}
