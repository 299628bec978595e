//! PageCollector: render one listing URL, expand lazy content, extract candidates.

pub mod detail;
pub mod extract;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::app::ports::{BrowserPort, BrowserSession};
use crate::config::Config;
use crate::constants::LOAD_MORE_TERMS;
use crate::error::Result;
use crate::types::RawCandidate;

use self::extract::{extract_candidates, ExtractionRules};

const ANCHOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub anchor_wait: Duration,
    pub settle_delay: Duration,
    pub max_rounds: usize,
    pub stable_rounds: usize,
    pub bare_slug_hosts: Vec<String>,
    pub max_items: usize,
}

impl CollectorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            anchor_wait: Duration::from_secs(config.browser.anchor_wait_secs),
            settle_delay: Duration::from_millis(config.browser.settle_delay_ms),
            max_rounds: config.browser.max_rounds,
            stable_rounds: config.browser.stable_rounds.max(1),
            bare_slug_hosts: config.extraction.bare_slug_hosts.clone(),
            max_items: config.extraction.max_items_per_page,
        }
    }
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct PageCollector {
    browser: Arc<dyn BrowserPort>,
    settings: CollectorSettings,
}

impl PageCollector {
    pub fn new(browser: Arc<dyn BrowserPort>, settings: CollectorSettings) -> Self {
        Self { browser, settings }
    }

    /// Render `url` and return the event-looking links on it.
    ///
    /// The browser session is closed on every path, including errors.
    #[instrument(skip(self, host_hints))]
    pub async fn collect(
        &self,
        source_key: &str,
        url: &str,
        host_hints: &[String],
    ) -> Result<Vec<RawCandidate>> {
        let mut session = self.browser.open().await?;
        let outcome = self.collect_in(session.as_mut(), source_key, url, host_hints).await;
        if let Err(e) = session.close().await {
            warn!(url, error = %e, "failed to close browser session");
        }
        outcome
    }

    async fn collect_in(
        &self,
        session: &mut dyn BrowserSession,
        source_key: &str,
        url: &str,
        host_hints: &[String],
    ) -> Result<Vec<RawCandidate>> {
        session.goto(url).await?;
        if session.is_static() {
            debug!(url, "static document, skipping anchor wait and expansion");
        } else {
            self.wait_for_anchors(session, url).await;
            if let Err(e) = self.expand(session).await {
                warn!(url, error = %e, "content expansion failed, extracting what is loaded");
            }
        }

        let html = session.content().await?;
        let current = session.current_url().await.unwrap_or_else(|_| url.to_string());
        let page_url = Url::parse(&current).or_else(|_| Url::parse(url))?;

        let rules = ExtractionRules {
            host_hints,
            bare_slug_hosts: &self.settings.bare_slug_hosts,
            max_items: self.settings.max_items,
        };
        let candidates = extract_candidates(&html, &page_url, source_key, &rules);
        info!(url, count = candidates.len(), "extracted candidates");
        Ok(candidates)
    }

    /// Bounded wait for the first hyperlink; running out is not an error.
    async fn wait_for_anchors(&self, session: &mut dyn BrowserSession, url: &str) {
        let deadline = tokio::time::Instant::now() + self.settings.anchor_wait;
        loop {
            match session.link_count().await {
                Ok(n) if n > 0 => return,
                Ok(_) => {}
                Err(e) => debug!(url, error = %e, "link count unavailable"),
            }
            if tokio::time::Instant::now() >= deadline {
                debug!(url, "no links appeared before the anchor wait ran out");
                return;
            }
            tokio::time::sleep(ANCHOR_POLL_INTERVAL).await;
        }
    }

    /// Scroll and press "load more" until the link count stops changing.
    async fn expand(&self, session: &mut dyn BrowserSession) -> Result<()> {
        let mut previous = session.link_count().await?;
        let mut unchanged = 0usize;

        for round in 1..=self.settings.max_rounds {
            session.scroll_to_bottom().await?;
            let clicked = session.click_matching(LOAD_MORE_TERMS).await?;
            tokio::time::sleep(self.settings.settle_delay).await;

            let count = session.link_count().await?;
            debug!(round, clicked, links = count, "expansion round");
            if count == previous {
                unchanged += 1;
                if unchanged >= self.settings.stable_rounds {
                    debug!(round, "link count stable");
                    return Ok(());
                }
            } else {
                unchanged = 0;
                previous = count;
            }
        }
        Ok(())
    }
}
