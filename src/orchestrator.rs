//! SourceOrchestrator: walks the configured sources, merges and dedups their output.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use metrics::counter;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{info, instrument, warn};
use url::Url;

use crate::collect::PageCollector;
use crate::enrich::DetailEnricher;
use crate::redirect::RedirectResolver;
use crate::types::{RawCandidate, ScrapeStats, SourceDescriptor};

static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("link selector"));

/// Upper bound on discovered listing pages per source
const MAX_PAGES: usize = 30;

/// Everything the web collection phase produced.
#[derive(Debug, Default)]
pub struct CollectionOutcome {
    pub candidates: Vec<RawCandidate>,
    pub stats: ScrapeStats,
}

/// Listing pages linked from `html`, keyed by page number.
///
/// The landing page itself counts as page 1 when no explicit `?<param>=1` link exists.
pub fn pagination_urls(html: &str, base: &Url, param: &str) -> BTreeMap<u32, String> {
    let document = Html::parse_document(html);
    let mut pages = BTreeMap::new();

    for anchor in document.select(&LINK_SELECTOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Ok(mut url) = base.join(href.trim()) else {
            continue;
        };
        if url.host_str() != base.host_str() {
            continue;
        }
        url.set_fragment(None);
        let page = url
            .query_pairs()
            .find(|(key, _)| key == param)
            .and_then(|(_, value)| value.trim().parse::<u32>().ok());
        if let Some(page) = page.filter(|p| *p > 0) {
            pages.entry(page).or_insert_with(|| url.to_string());
        }
    }

    pages.entry(1).or_insert_with(|| base.to_string());
    while pages.len() > MAX_PAGES {
        pages.pop_last();
    }
    pages
}

pub struct SourceOrchestrator {
    collector: PageCollector,
    resolver: Arc<RedirectResolver>,
    enricher: DetailEnricher,
}

impl SourceOrchestrator {
    pub fn new(
        collector: PageCollector,
        resolver: Arc<RedirectResolver>,
        enricher: DetailEnricher,
    ) -> Self {
        Self {
            collector,
            resolver,
            enricher,
        }
    }

    /// Collect one URL, treating any failure as an empty result.
    async fn collect_url(&self, source: &SourceDescriptor, url: &str) -> Vec<RawCandidate> {
        match self.collector.collect(&source.key, url, &source.host_hints).await {
            Ok(found) => found,
            Err(e) => {
                warn!(source = %source.label, url, error = %e, "page collection failed");
                Vec::new()
            }
        }
    }

    /// Listing page URLs of a paginated source, in page order.
    async fn discover_pages(&self, source: &SourceDescriptor) -> Vec<String> {
        let landing = self.resolver.resolve_final_url(&source.primary_url).await;
        let base = match Url::parse(&landing) {
            Ok(base) => base,
            Err(e) => {
                warn!(source = %source.label, url = %landing, error = %e, "unusable landing url");
                return vec![source.primary_url.clone()];
            }
        };
        match self.resolver.http().get(&landing).await {
            Ok(response) => pagination_urls(&response.body, &base, &source.page_param)
                .into_values()
                .collect(),
            Err(e) => {
                warn!(source = %source.label, url = %landing, error = %e, "pagination discovery failed");
                vec![landing]
            }
        }
    }

    async fn collect_primary(&self, source: &SourceDescriptor) -> Vec<RawCandidate> {
        if !source.paginated {
            return self.collect_url(source, &source.primary_url).await;
        }

        let pages = self.discover_pages(source).await;
        info!(source = %source.label, pages = pages.len(), "listing pages discovered");
        let mut all = Vec::new();
        for page in &pages {
            all.extend(self.collect_url(source, page).await);
        }
        all
    }

    /// Candidates of one source: the primary URL, else the first fallback that yields anything.
    #[instrument(skip(self, source), fields(source = %source.key))]
    pub async fn collect_source(&self, source: &SourceDescriptor) -> Vec<RawCandidate> {
        let primary = self.collect_primary(source).await;
        if !primary.is_empty() {
            info!(count = primary.len(), "primary url yielded candidates");
            return primary;
        }

        for fallback in &source.fallback_urls {
            let found = self.collect_url(source, fallback).await;
            if !found.is_empty() {
                info!(url = %fallback, count = found.len(), "fallback url yielded candidates");
                return found;
            }
            info!(url = %fallback, "fallback url yielded nothing");
        }

        warn!(source = %source.label, "no candidates from any url");
        Vec::new()
    }

    /// Run every source in order, dedup globally by link and enrich the survivors.
    pub async fn collect_all(&self, sources: &[SourceDescriptor]) -> CollectionOutcome {
        let mut merged = Vec::new();
        for source in sources {
            let found = self.collect_source(source).await;
            counter!("agenda_source_candidates_total", "source" => source.key.clone())
                .increment(found.len() as u64);
            merged.extend(found);
        }

        let raw_count = merged.len();
        let mut seen = HashSet::new();
        merged.retain(|c| seen.insert(c.link.clone()));
        let stats = ScrapeStats {
            raw_count,
            dedup_count: merged.len(),
        };
        counter!("agenda_candidates_raw_total").increment(stats.raw_count as u64);
        counter!("agenda_candidates_dedup_total").increment(stats.dedup_count as u64);
        info!(raw = stats.raw_count, deduplicated = stats.dedup_count, "web collection finished");

        self.enricher.enrich(&mut merged).await;

        CollectionOutcome {
            candidates: merged,
            stats,
        }
    }
}
