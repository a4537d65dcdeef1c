//! Page visit tracking for the course membership portal.
//!
//! A [`TrackerRegistry`] owns the one [`PageTracker`] of an application. The
//! host reports navigation, visibility and unload either by calling the
//! tracker directly or by publishing on [`HostEvents`]; finished visits are
//! posted to the portal's analytics endpoint on a strictly best-effort basis.

pub mod classifier;
pub mod dispatch;
pub mod environment;
pub mod models;
pub mod settings;
pub mod tracker;
pub mod utils;

mod driver;

pub use classifier::{classify, PageMeta};
pub use dispatch::{Delivery, HttpSink, NullSink, VisitDispatcher, VisitSink};
pub use driver::{parse_line, run, run_script, Cli, ScriptCommand};
pub use environment::{device_type_for, HostEnvironment};
pub use models::{DeviceType, PageType, PageVisit, SessionId};
pub use settings::{SettingsStore, TrackerSettings};
pub use tracker::{
    HostEvent, HostEvents, PageTracker, TrackerOptions, TrackerRegistry, Visibility,
};
