//! Host-supplied facts about the current document: title, referrer, user
//! agent and visibility. The host updates them as it navigates; the tracker
//! reads them when it opens a new visit record.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{models::DeviceType, tracker::Visibility};

#[derive(Debug, Default, Clone)]
struct EnvironmentData {
    title: Option<String>,
    referrer: Option<String>,
    user_agent: Option<String>,
    visibility: Visibility,
}

#[derive(Debug, Default, Clone)]
pub struct HostEnvironment {
    inner: Arc<RwLock<EnvironmentData>>,
}

impl HostEnvironment {
    pub fn new(user_agent: Option<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(EnvironmentData {
                user_agent,
                ..EnvironmentData::default()
            })),
        }
    }

    pub fn title(&self) -> Option<String> {
        self.read().title.clone()
    }

    pub fn referrer(&self) -> Option<String> {
        self.read().referrer.clone()
    }

    pub fn user_agent(&self) -> Option<String> {
        self.read().user_agent.clone()
    }

    pub fn device_type(&self) -> DeviceType {
        self.read()
            .user_agent
            .as_deref()
            .map(device_type_for)
            .unwrap_or_default()
    }

    /// Last visibility the host reported. Outlives any single tracker, so a
    /// tracker created while the page is hidden starts paused.
    pub fn visibility(&self) -> Visibility {
        self.read().visibility
    }

    pub fn set_visibility(&self, visibility: Visibility) {
        self.write().visibility = visibility;
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.write().title = non_empty(title.into());
    }

    pub fn set_referrer(&self, referrer: impl Into<String>) {
        self.write().referrer = non_empty(referrer.into());
    }

    pub fn set_user_agent(&self, user_agent: impl Into<String>) {
        self.write().user_agent = non_empty(user_agent.into());
    }

    // A poisoned lock still holds plain strings, so keep using them.
    fn read(&self) -> RwLockReadGuard<'_, EnvironmentData> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, EnvironmentData> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

const TABLET_MARKERS: &[&str] = &["ipad", "tablet", "playbook", "silk"];
const MOBILE_MARKERS: &[&str] = &[
    "mobi",
    "iphone",
    "ipod",
    "android",
    "blackberry",
    "opera mini",
    "iemobile",
];

/// Classify a user agent by substring. Tablet markers win, and an Android
/// agent without "mobi" is a tablet.
pub fn device_type_for(user_agent: &str) -> DeviceType {
    let ua = user_agent.to_ascii_lowercase();

    let android_tablet = ua.contains("android") && !ua.contains("mobi");
    if android_tablet || TABLET_MARKERS.iter().any(|m| ua.contains(m)) {
        return DeviceType::Tablet;
    }
    if MOBILE_MARKERS.iter().any(|m| ua.contains(m)) {
        return DeviceType::Mobile;
    }
    DeviceType::Desktop
}
