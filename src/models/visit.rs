use serde::Serialize;

use super::SessionId;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Onboarding,
    News,
    Event,
    Instruction,
    Recording,
    Faq,
    Profile,
    Favorites,
    Notes,
    Unknown,
}

impl Default for PageType {
    fn default() -> Self {
        PageType::Unknown
    }
}

impl PageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::Onboarding => "onboarding",
            PageType::News => "news",
            PageType::Event => "event",
            PageType::Instruction => "instruction",
            PageType::Recording => "recording",
            PageType::Faq => "faq",
            PageType::Profile => "profile",
            PageType::Favorites => "favorites",
            PageType::Notes => "notes",
            PageType::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Mobile,
    Tablet,
    Desktop,
}

impl Default for DeviceType {
    fn default() -> Self {
        DeviceType::Desktop
    }
}

/// One page view as posted to the analytics endpoint.
///
/// Field names follow the wire format. Absent optionals are left out of the
/// JSON body entirely rather than sent as `null`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PageVisit {
    pub page_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,
    pub page_type: PageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    pub session_id: SessionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_spent_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub device_type: DeviceType,
}
