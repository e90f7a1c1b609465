//! Page context from the host environment.
//!
//! The assistant answers questions about "the current page". Where that page
//! comes from is the host's business: a browser tab, a URL given on the
//! command line, or nothing at all. Retrieval is best-effort; callers fall
//! back to whatever tab information they have.

pub mod scraped;

pub use scraped::ScrapedPage;

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boxed future type for page context operations.
pub type PageFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors raised by the host message channel.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// The channel to the host or background service is unavailable.
    #[error("message channel unavailable: {0}")]
    ChannelUnavailable(String),
    /// The page cannot be reached (restricted or not ready).
    #[error("content script unreachable: {0}")]
    ContentUnreachable(String),
}

/// The active tab as reported by the host.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TabInfo {
    /// Tab URL.
    pub url: String,
    /// Tab title.
    pub title: String,
}

/// Page metadata sent alongside a question.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    /// Page URL.
    #[serde(default)]
    pub url: String,
    /// Page title.
    #[serde(default, rename = "pageTitle", alias = "title")]
    pub title: String,
    /// Extracted main text, when the page could be read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_content: Option<String>,
}

impl From<TabInfo> for PageMetadata {
    fn from(tab: TabInfo) -> Self {
        Self {
            url: tab.url,
            title: tab.title,
            main_content: None,
        }
    }
}

/// Source of page context.
pub trait PageContextProvider: Send + Sync {
    /// Report the active tab.
    fn active_tab(&self) -> PageFuture<'_, Result<TabInfo, MessagingError>>;

    /// Read the tab's content. `Ok(None)` means the page offers nothing.
    fn page_content<'a>(
        &'a self,
        tab: &'a TabInfo,
    ) -> PageFuture<'a, Result<Option<PageMetadata>, MessagingError>>;
}

/// A tab whose content is never read.
#[derive(Clone, Debug, Default)]
pub struct FixedPage {
    tab: TabInfo,
}

impl FixedPage {
    /// Report the given URL and title as the active tab.
    #[must_use]
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            tab: TabInfo {
                url: url.into(),
                title: title.into(),
            },
        }
    }
}

impl PageContextProvider for FixedPage {
    fn active_tab(&self) -> PageFuture<'_, Result<TabInfo, MessagingError>> {
        let tab = self.tab.clone();
        Box::pin(async move { Ok(tab) })
    }

    fn page_content<'a>(
        &'a self,
        _tab: &'a TabInfo,
    ) -> PageFuture<'a, Result<Option<PageMetadata>, MessagingError>> {
        Box::pin(async { Ok(None) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_wire_names() {
        let metadata = PageMetadata {
            url: "https://example.com".to_string(),
            title: "Example".to_string(),
            main_content: Some("Body".to_string()),
        };
        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["pageTitle"], "Example");
        assert_eq!(value["mainContent"], "Body");
    }

    #[test]
    fn test_metadata_accepts_tab_shape() {
        let metadata: PageMetadata =
            serde_json::from_str(r#"{"url":"https://a.b","title":"Tab"}"#).unwrap();
        assert_eq!(metadata.title, "Tab");
        assert!(metadata.main_content.is_none());
    }

    #[tokio::test]
    async fn test_fixed_page_has_no_content() {
        let page = FixedPage::new("https://example.com", "Example");
        let tab = page.active_tab().await.unwrap();
        assert_eq!(tab.title, "Example");
        assert!(page.page_content(&tab).await.unwrap().is_none());
    }
}
