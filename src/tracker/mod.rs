pub mod controller;
pub mod events;
pub mod registry;
pub mod state;

pub use controller::{PageTracker, TrackerOptions};
pub use events::{HostEvent, HostEvents};
pub use registry::TrackerRegistry;
pub use state::{DwellTimer, TrackerState, TrackerStatus, Visibility};
