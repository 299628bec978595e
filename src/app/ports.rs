use async_trait::async_trait;

use crate::error::Result;
use crate::types::{AuditRecord, CanonicalEvent};

// Collection-side ports

/// Something that can open isolated rendering sessions (headless browser or a stand-in).
#[async_trait]
pub trait BrowserPort: Send + Sync {
    async fn open(&self) -> Result<Box<dyn BrowserSession>>;
}

/// One live page. Callers must `close` it on every exit path.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate and wait until the document is minimally loaded.
    async fn goto(&mut self, url: &str) -> Result<()>;

    /// URL of the current document after any client-side redirects.
    async fn current_url(&mut self) -> Result<String>;

    /// Number of `a[href]` elements in the rendered document.
    async fn link_count(&mut self) -> Result<usize>;

    async fn scroll_to_bottom(&mut self) -> Result<()>;

    /// Click every visible element whose text contains one of `terms` (case-insensitive).
    /// Returns how many elements were clicked.
    async fn click_matching(&mut self, terms: &[&str]) -> Result<usize>;

    /// Serialized HTML of the rendered document.
    async fn content(&mut self) -> Result<String>;

    async fn close(self: Box<Self>) -> Result<()>;

    /// True when the document can never change after `goto` (no scripts run).
    fn is_static(&self) -> bool {
        false
    }
}

/// Plain HTTP GET that never follows redirects and never runs scripts.
#[async_trait]
pub trait HttpClientPort: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpGetResult>;
}

#[derive(Clone, Debug, Default)]
pub struct HttpGetResult {
    pub status: u16,
    pub location: Option<String>,
    pub body: String,
}

impl HttpGetResult {
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }
}

// Persistence-side ports

#[async_trait]
pub trait EventStorePort: Send + Sync {
    /// Every stored record; an absent backing store reads as empty.
    async fn read_all(&self) -> Result<Vec<CanonicalEvent>>;

    /// Replace the whole store in one step. Returns how many records were kept.
    async fn replace_all(&self, records: Vec<CanonicalEvent>) -> Result<usize>;
}

#[async_trait]
pub trait AuditSinkPort: Send + Sync {
    /// Write this run's audit trail, replacing any previous run's.
    async fn write_run(&self, records: &[AuditRecord]) -> Result<()>;
}

#[async_trait]
pub trait RunLogPort: Send + Sync {
    async fn append(&self, summary: &crate::run_log::RunSummary) -> Result<()>;
}
