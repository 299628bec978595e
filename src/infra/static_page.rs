use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::app::ports::{BrowserPort, BrowserSession, HttpClientPort};
use crate::error::{Result, ScraperError};

static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("link selector"));

/// Stand-in for a browser that fetches raw HTML without running scripts.
///
/// Redirects are followed by hand so `current_url` reflects where the document came from.
/// Nothing is ever loaded lazily, so scrolling and clicking are no-ops.
pub struct StaticHtmlBrowser {
    http: Arc<dyn HttpClientPort>,
    max_redirects: usize,
}

impl StaticHtmlBrowser {
    pub fn new(http: Arc<dyn HttpClientPort>, max_redirects: usize) -> Self {
        Self { http, max_redirects }
    }
}

#[async_trait]
impl BrowserPort for StaticHtmlBrowser {
    async fn open(&self) -> Result<Box<dyn BrowserSession>> {
        Ok(Box::new(StaticSession {
            http: self.http.clone(),
            max_redirects: self.max_redirects,
            url: String::new(),
            html: String::new(),
        }))
    }
}

struct StaticSession {
    http: Arc<dyn HttpClientPort>,
    max_redirects: usize,
    url: String,
    html: String,
}

#[async_trait]
impl BrowserSession for StaticSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        let mut current = url.to_string();
        for _ in 0..=self.max_redirects {
            let response = self.http.get(&current).await?;
            match response.location.filter(|_| response.status >= 300 && response.status < 400) {
                Some(location) => {
                    current = Url::parse(&current)?.join(location.trim())?.to_string();
                    debug!(to = %current, "following redirect");
                }
                None if (200..300).contains(&response.status) => {
                    self.url = current;
                    self.html = response.body;
                    return Ok(());
                }
                None => {
                    return Err(ScraperError::Browser(format!(
                        "GET {current} returned status {}",
                        response.status
                    )))
                }
            }
        }
        Err(ScraperError::Browser(format!("too many redirects from {url}")))
    }

    async fn current_url(&mut self) -> Result<String> {
        Ok(self.url.clone())
    }

    async fn link_count(&mut self) -> Result<usize> {
        Ok(Html::parse_document(&self.html).select(&LINK_SELECTOR).count())
    }

    async fn scroll_to_bottom(&mut self) -> Result<()> {
        Ok(())
    }

    async fn click_matching(&mut self, _terms: &[&str]) -> Result<usize> {
        Ok(0)
    }

    async fn content(&mut self) -> Result<String> {
        Ok(self.html.clone())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }

    fn is_static(&self) -> bool {
        true
    }
}
