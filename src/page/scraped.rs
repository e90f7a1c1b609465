//! Page context read by fetching the tab's URL.

use scraper::{Html, Selector};
use url::Url;

use super::{MessagingError, PageContextProvider, PageFuture, PageMetadata, TabInfo};

/// Selectors tried, in order, for the main content block.
const CONTENT_SELECTORS: [&str; 8] = [
    "article",
    "main",
    "[role='main']",
    ".post-content",
    ".article-content",
    ".entry-content",
    "#content",
    ".content",
];

/// Minimum word count for a content block to be preferred over the body.
const MIN_BLOCK_WORDS: usize = 50;

/// Page provider that downloads the page and extracts its text.
pub struct ScrapedPage {
    client: reqwest::Client,
    url: String,
}

impl ScrapedPage {
    /// Treat `url` as the active tab.
    #[must_use]
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    async fn fetch(&self, tab: &TabInfo) -> Result<Option<PageMetadata>, MessagingError> {
        let parsed = Url::parse(&tab.url)
            .map_err(|e| MessagingError::ContentUnreachable(format!("{}: {e}", tab.url)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Ok(None);
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| MessagingError::ContentUnreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MessagingError::ContentUnreachable(format!(
                "{} returned status {}",
                tab.url,
                response.status()
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| MessagingError::ContentUnreachable(e.to_string()))?;

        Ok(Some(extract_metadata(&html, tab)))
    }
}

impl PageContextProvider for ScrapedPage {
    fn active_tab(&self) -> PageFuture<'_, Result<TabInfo, MessagingError>> {
        let tab = TabInfo {
            url: self.url.clone(),
            title: String::new(),
        };
        Box::pin(async move { Ok(tab) })
    }

    fn page_content<'a>(
        &'a self,
        tab: &'a TabInfo,
    ) -> PageFuture<'a, Result<Option<PageMetadata>, MessagingError>> {
        Box::pin(self.fetch(tab))
    }
}

/// Build page metadata from an HTML document.
fn extract_metadata(html: &str, tab: &TabInfo) -> PageMetadata {
    let document = Html::parse_document(html);
    let title = extract_title(&document).unwrap_or_else(|| tab.title.clone());
    let text = extract_main_text(&document);

    PageMetadata {
        url: tab.url.clone(),
        title,
        main_content: (!text.is_empty()).then_some(text),
    }
}

fn extract_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let title = clean_text(&document.select(&selector).next()?.text().collect::<String>());
    (!title.is_empty()).then_some(title)
}

fn extract_main_text(document: &Html) -> String {
    for selector_str in CONTENT_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                let text = clean_text(&element.text().collect::<Vec<_>>().join(" "));
                if text.split_whitespace().count() > MIN_BLOCK_WORDS {
                    return text;
                }
            }
        }
    }

    let Ok(body_selector) = Selector::parse("body") else {
        return String::new();
    };
    document
        .select(&body_selector)
        .next()
        .map(|body| clean_text(&body.text().collect::<Vec<_>>().join(" ")))
        .unwrap_or_default()
}

/// Collapse whitespace runs into single spaces.
fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
