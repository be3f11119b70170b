//! Page based list navigation

use serde::{Deserialize, Serialize};

/// Page selection for list endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
    pub page: u32,
    pub per_page: u32,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 200,
        }
    }
}

impl ListOptions {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page }
    }

    pub(crate) fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("page", self.page.to_string()),
            ("per_page", self.per_page.to_string()),
        ]
    }

    pub fn next(self) -> Self {
        Self {
            page: self.page + 1,
            ..self
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pages {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Links {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<Pages>,
}

impl Links {
    /// True when there is no page after this one
    pub fn is_last_page(&self) -> bool {
        self.pages
            .as_ref()
            .and_then(|p| p.next.as_deref())
            .is_none_or(str::is_empty)
    }

    /// The page number these links were returned for
    ///
    /// Derived from the `prev` link; the first page has none.
    pub fn current_page(&self) -> u32 {
        self.pages
            .as_ref()
            .and_then(|p| p.prev.as_deref())
            .and_then(page_param)
            .map(|prev| prev + 1)
            .unwrap_or(1)
    }

    pub fn with_next(url: impl Into<String>) -> Self {
        Self {
            pages: Some(Pages {
                next: Some(url.into()),
                ..Pages::default()
            }),
        }
    }
}

fn page_param(url: &str) -> Option<u32> {
    let query = url.split_once('?')?.1;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == "page")
        .and_then(|(_, v)| v.parse().ok())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub total: u64,
}

/// One page of a list response
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub links: Links,
    pub meta: Meta,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            links: Links::default(),
            meta: Meta::default(),
        }
    }

    pub fn is_last(&self) -> bool {
        self.links.is_last_page()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links(prev: Option<&str>, next: Option<&str>) -> Links {
        Links {
            pages: Some(Pages {
                prev: prev.map(str::to_string),
                next: next.map(str::to_string),
                ..Pages::default()
            }),
        }
    }

    #[test]
    fn test_is_last_page() {
        assert!(Links::default().is_last_page());
        assert!(links(Some("https://x/v2/droplets?page=1"), None).is_last_page());
        assert!(!links(None, Some("https://x/v2/droplets?page=2")).is_last_page());
    }

    #[test]
    fn test_current_page() {
        assert_eq!(Links::default().current_page(), 1);
        assert_eq!(
            links(Some("https://x/v2/droplets?page=2&per_page=20"), None).current_page(),
            3
        );
        assert_eq!(
            links(Some("https://x/v2/droplets?per_page=20&page=4"), None).current_page(),
            5
        );
    }

    #[test]
    fn test_links_deserialize() {
        let json = r#"{"pages":{"last":"https://x/v2/images?page=3","next":"https://x/v2/images?page=2"}}"#;
        let links: Links = serde_json::from_str(json).unwrap();
        assert!(!links.is_last_page());
        assert_eq!(links.current_page(), 1);
    }
}
