//! Maps portal routes to a coarse page type and, for single-resource routes,
//! the numeric id they address.

use crate::models::PageType;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMeta {
    pub page_type: Option<PageType>,
    pub page_id: Option<String>,
}

impl PageMeta {
    fn new(page_type: PageType, page_id: Option<String>) -> Self {
        Self {
            page_type: Some(page_type),
            page_id,
        }
    }
}

/// Route prefixes in match order. The flag says whether a trailing numeric
/// segment is read as the resource id.
const ROUTES: &[(&str, PageType, bool)] = &[
    ("/news", PageType::News, true),
    ("/events", PageType::Event, true),
    ("/calendar", PageType::Event, true),
    ("/instructions", PageType::Instruction, true),
    ("/library", PageType::Instruction, true),
    ("/recordings", PageType::Recording, true),
    ("/faq", PageType::Faq, true),
    ("/profile", PageType::Profile, false),
    ("/favorites", PageType::Favorites, false),
    ("/notes", PageType::Notes, false),
];

/// Classify a route. The query string never influences the result, whether it
/// arrives in `_search` or still attached to `path`.
pub fn classify(path: &str, _search: Option<&str>) -> PageMeta {
    let path = strip_query(path);

    if path.is_empty() || path == "/" {
        return PageMeta::new(PageType::Onboarding, None);
    }

    ROUTES
        .iter()
        .find(|(prefix, _, _)| path.starts_with(prefix))
        .map(|(_, page_type, has_id)| {
            let page_id = if *has_id { trailing_id(path) } else { None };
            PageMeta::new(*page_type, page_id)
        })
        .unwrap_or_default()
}

fn strip_query(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    &path[..end]
}

fn trailing_id(path: &str) -> Option<String> {
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .filter(|segment| segment.bytes().all(|b| b.is_ascii_digit()))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(page_type: PageType, id: Option<&str>) -> PageMeta {
        PageMeta {
            page_type: Some(page_type),
            page_id: id.map(str::to_string),
        }
    }

    #[test]
    fn root_is_onboarding() {
        assert_eq!(classify("/", None), meta(PageType::Onboarding, None));
        assert_eq!(classify("", None), meta(PageType::Onboarding, None));
        assert_eq!(classify("/?welcome=1", None), meta(PageType::Onboarding, None));
    }

    #[test]
    fn news_id_only_for_numeric_tail() {
        assert_eq!(classify("/news", None), meta(PageType::News, None));
        assert_eq!(classify("/news/", None), meta(PageType::News, None));
        assert_eq!(classify("/news/42", None), meta(PageType::News, Some("42")));
    }

    #[test]
    fn calendar_with_query_is_event() {
        assert_eq!(
            classify("/calendar/7?x=1", None),
            meta(PageType::Event, Some("7"))
        );
        assert_eq!(
            classify("/calendar/7", Some("?x=1")),
            meta(PageType::Event, Some("7"))
        );
        assert_eq!(classify("/events/19/", None), meta(PageType::Event, Some("19")));
    }

    #[test]
    fn library_aliases_instructions() {
        assert_eq!(
            classify("/library/3", None),
            meta(PageType::Instruction, Some("3"))
        );
        assert_eq!(
            classify("/instructions", None),
            meta(PageType::Instruction, None)
        );
    }

    #[test]
    fn recordings_and_faq_take_ids() {
        assert_eq!(
            classify("/recordings/88", None),
            meta(PageType::Recording, Some("88"))
        );
        assert_eq!(classify("/faq/5", None), meta(PageType::Faq, Some("5")));
    }

    #[test]
    fn member_pages_never_carry_ids() {
        assert_eq!(classify("/profile/12", None), meta(PageType::Profile, None));
        assert_eq!(classify("/favorites", None), meta(PageType::Favorites, None));
        assert_eq!(classify("/notes/3", None), meta(PageType::Notes, None));
    }

    #[test]
    fn non_numeric_tail_has_no_id() {
        assert_eq!(classify("/news/abc", None), meta(PageType::News, None));
        assert_eq!(classify("/news/42/edit", None), meta(PageType::News, None));
    }

    #[test]
    fn unknown_routes_are_empty() {
        assert_eq!(classify("/unknown/thing", None), PageMeta::default());
        assert_eq!(classify("/admin/products/4", None), PageMeta::default());
        assert_eq!(classify("news", None), PageMeta::default());
    }
}
