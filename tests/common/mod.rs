#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use agenda_scraper::app::ports::{BrowserPort, BrowserSession, HttpClientPort, HttpGetResult};
use agenda_scraper::collect::{CollectorSettings, PageCollector};
use agenda_scraper::enrich::DetailEnricher;
use agenda_scraper::error::{Result, ScraperError};
use agenda_scraper::orchestrator::SourceOrchestrator;
use agenda_scraper::redirect::RedirectResolver;
use agenda_scraper::types::SourceDescriptor;

/// Browser stand-in serving canned HTML per URL; unknown URLs fail to load.
#[derive(Clone, Default)]
pub struct FakeBrowser {
    pages: HashMap<String, String>,
    visits: Arc<Mutex<Vec<String>>>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl FakeBrowser {
    pub fn with_page(mut self, url: &str, html: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), html.into());
        self
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn visited(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserPort for FakeBrowser {
    async fn open(&self) -> Result<Box<dyn BrowserSession>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            browser: self.clone(),
            url: String::new(),
            html: String::new(),
        }))
    }
}

struct FakeSession {
    browser: FakeBrowser,
    url: String,
    html: String,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        self.browser.visits.lock().unwrap().push(url.to_string());
        match self.browser.pages.get(url) {
            Some(html) => {
                self.url = url.to_string();
                self.html = html.clone();
                Ok(())
            }
            None => Err(ScraperError::Timeout {
                url: url.to_string(),
                seconds: 30,
            }),
        }
    }

    async fn current_url(&mut self) -> Result<String> {
        Ok(self.url.clone())
    }

    async fn link_count(&mut self) -> Result<usize> {
        Ok(self.html.matches("<a ").count())
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
        self.browser.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// HTTP stand-in: canned responses per URL, errors elsewhere.
#[derive(Default)]
pub struct FakeHttp {
    responses: HashMap<String, HttpGetResult>,
}

impl FakeHttp {
    pub fn with_body(mut self, url: &str, body: impl Into<String>) -> Self {
        self.responses.insert(
            url.to_string(),
            HttpGetResult {
                status: 200,
                location: None,
                body: body.into(),
            },
        );
        self
    }

    pub fn with_redirect(mut self, url: &str, location: &str) -> Self {
        self.responses.insert(
            url.to_string(),
            HttpGetResult {
                status: 301,
                location: Some(location.to_string()),
                body: String::new(),
            },
        );
        self
    }
}

#[async_trait]
impl HttpClientPort for FakeHttp {
    async fn get(&self, url: &str) -> Result<HttpGetResult> {
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| ScraperError::Api {
                message: format!("no canned response for {url}"),
            })
    }
}

pub fn fast_settings() -> CollectorSettings {
    CollectorSettings {
        anchor_wait: Duration::ZERO,
        settle_delay: Duration::ZERO,
        max_rounds: 2,
        stable_rounds: 1,
        bare_slug_hosts: vec!["outgo.com.br".to_string()],
        max_items: 300,
    }
}

pub fn orchestrator(browser: Arc<FakeBrowser>, http: FakeHttp) -> SourceOrchestrator {
    let browser: Arc<dyn BrowserPort> = browser;
    let resolver = Arc::new(RedirectResolver::new(Arc::new(http), 8));
    let collector = PageCollector::new(browser.clone(), fast_settings());
    let enricher = DetailEnricher::new(browser, resolver.clone());
    SourceOrchestrator::new(collector, resolver, enricher)
}

pub fn source(key: &str, primary: &str, hints: &[&str], fallbacks: &[&str]) -> SourceDescriptor {
    SourceDescriptor {
        key: key.to_string(),
        label: key.to_string(),
        primary_url: primary.to_string(),
        host_hints: hints.iter().map(|h| h.to_string()).collect(),
        fallback_urls: fallbacks.iter().map(|f| f.to_string()).collect(),
        paginated: false,
        page_param: "page".to_string(),
    }
}

/// Listing page with one event card per `(title, href, date)`.
pub fn listing(items: &[(&str, &str, &str)]) -> String {
    let cards: String = items
        .iter()
        .map(|(title, href, date)| {
            format!(
                r#"<li class="event-card"><a href="{href}"><h3>{title}</h3></a><span>{date}</span><span>Marco Zero, Recife</span></li>"#
            )
        })
        .collect();
    format!("<html><body><a href=\"/sobre\">Sobre</a><ul>{cards}</ul></body></html>")
}
