//! Headless Chrome over CDP. Every session launches its own browser process, so at most
//! one is alive while the pipeline runs sequentially.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::app::ports::{BrowserPort, BrowserSession};
use crate::config::BrowserConfig;
use crate::error::{Result, ScraperError};

const LINK_COUNT_JS: &str = "document.querySelectorAll('a[href]').length";
const SCROLL_JS: &str =
    "window.scrollTo(0, document.body ? document.body.scrollHeight : 0); true";

fn browser_err(e: impl std::fmt::Display) -> ScraperError {
    ScraperError::Browser(e.to_string())
}

/// Clicks visible buttons/links whose text contains a term; anchors that navigate
/// away are left alone.
fn click_script(terms: &[&str]) -> Result<String> {
    let terms = serde_json::to_string(terms)?;
    Ok(format!(
        r#"(() => {{
            const terms = {terms};
            let clicked = 0;
            for (const el of document.querySelectorAll('button, a, [role="button"]')) {{
                const text = (el.innerText || el.textContent || '').toLowerCase();
                if (!terms.some(t => text.includes(t))) continue;
                const href = el.getAttribute && el.getAttribute('href');
                if (el.tagName === 'A' && href && !href.startsWith('#') && !href.startsWith('javascript')) continue;
                const rect = el.getBoundingClientRect();
                if (rect.width === 0 || rect.height === 0) continue;
                try {{ el.click(); clicked++; }} catch (e) {{}}
            }}
            return clicked;
        }})()"#
    ))
}

pub struct ChromeBrowser {
    headless: bool,
    executable: Option<PathBuf>,
    navigation_timeout: Duration,
}

impl ChromeBrowser {
    pub fn new(config: &BrowserConfig) -> Self {
        Self {
            headless: config.headless,
            executable: config.chrome_executable.clone(),
            navigation_timeout: Duration::from_secs(config.navigation_timeout_secs),
        }
    }

    fn launch_config(&self) -> Result<CdpConfig> {
        let mut builder = CdpConfig::builder()
            .no_sandbox()
            .request_timeout(self.navigation_timeout);
        if !self.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        builder.build().map_err(ScraperError::Browser)
    }
}

#[async_trait]
impl BrowserPort for ChromeBrowser {
    async fn open(&self) -> Result<Box<dyn BrowserSession>> {
        let (mut browser, mut handler) = Browser::launch(self.launch_config()?)
            .await
            .map_err(browser_err)?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        match browser.new_page("about:blank").await {
            Ok(page) => Ok(Box::new(ChromeSession {
                browser,
                page,
                handler_task,
                navigation_timeout: self.navigation_timeout,
            })),
            Err(e) => {
                let _ = browser.close().await;
                handler_task.abort();
                Err(browser_err(e))
            }
        }
    }
}

struct ChromeSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    navigation_timeout: Duration,
}

impl ChromeSession {
    async fn eval<T: DeserializeOwned>(&self, script: &str) -> Result<T> {
        self.page
            .evaluate(script)
            .await
            .map_err(browser_err)?
            .into_value::<T>()
            .map_err(browser_err)
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        match tokio::time::timeout(self.navigation_timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(browser_err(format!("navigating to {url}: {e}"))),
            Err(_) => Err(ScraperError::Timeout {
                url: url.to_string(),
                seconds: self.navigation_timeout.as_secs(),
            }),
        }
    }

    async fn current_url(&mut self) -> Result<String> {
        self.page
            .url()
            .await
            .map_err(browser_err)?
            .ok_or_else(|| ScraperError::Browser("page has no url".into()))
    }

    async fn link_count(&mut self) -> Result<usize> {
        self.eval(LINK_COUNT_JS).await
    }

    async fn scroll_to_bottom(&mut self) -> Result<()> {
        self.eval::<bool>(SCROLL_JS).await.map(|_| ())
    }

    async fn click_matching(&mut self, terms: &[&str]) -> Result<usize> {
        let script = click_script(terms)?;
        self.eval(&script).await
    }

    async fn content(&mut self) -> Result<String> {
        self.page.content().await.map_err(browser_err)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let ChromeSession {
            mut browser,
            page,
            handler_task,
            ..
        } = *self;

        if let Err(e) = page.close().await {
            debug!(error = %e, "page close failed");
        }
        let closed = browser.close().await.map(|_| ()).map_err(browser_err);
        if let Err(e) = browser.wait().await {
            warn!(error = %e, "waiting for chrome to exit failed");
        }
        handler_task.abort();
        closed
    }
}
