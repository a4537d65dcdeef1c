pub mod session;
pub mod visit;

pub use session::SessionId;
pub use visit::{DeviceType, PageType, PageVisit};
