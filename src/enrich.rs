use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::app::ports::BrowserPort;
use crate::collect::detail::{extract_detail, DetailData};
use crate::constants::GATEWAY_MARKER;
use crate::error::Result;
use crate::redirect::RedirectResolver;
use crate::types::RawCandidate;

/// Whether a candidate came through the public-sector redirect gateway.
pub fn is_gateway_candidate(candidate: &RawCandidate) -> bool {
    candidate.original_link.contains(GATEWAY_MARKER)
        || Url::parse(&candidate.link)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.contains(GATEWAY_MARKER)))
            .unwrap_or(false)
}

fn enrichable(candidate: &RawCandidate) -> bool {
    !candidate.skip_enrich
        && Url::parse(&candidate.link)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false)
}

/// Revisits detail pages to replace coarse listing data with page-level data.
pub struct DetailEnricher {
    browser: Arc<dyn BrowserPort>,
    resolver: Arc<RedirectResolver>,
}

impl DetailEnricher {
    pub fn new(browser: Arc<dyn BrowserPort>, resolver: Arc<RedirectResolver>) -> Self {
        Self { browser, resolver }
    }

    /// Enrich every eligible candidate in place. A failing candidate keeps its
    /// listing data; the batch always completes.
    #[instrument(skip_all, fields(count = candidates.len()))]
    pub async fn enrich(&self, candidates: &mut [RawCandidate]) {
        let mut enriched = 0usize;
        let mut failed = 0usize;

        for candidate in candidates.iter_mut().filter(|c| enrichable(c)) {
            match self.enrich_one(candidate).await {
                Ok(()) => enriched += 1,
                Err(e) => {
                    failed += 1;
                    warn!(link = %candidate.link, title = %candidate.title, error = %e, "enrichment failed");
                }
            }
        }

        metrics::counter!("agenda_enrich_failures_total").increment(failed as u64);
        info!(enriched, failed, "detail enrichment finished");
    }

    async fn enrich_one(&self, candidate: &mut RawCandidate) -> Result<()> {
        let gateway = is_gateway_candidate(candidate);
        let (html, current) = self.fetch_detail(&candidate.link).await?;
        let page_url = Url::parse(&current).or_else(|_| Url::parse(&candidate.link))?;
        let detail = extract_detail(&html, &page_url, gateway);
        self.apply(candidate, detail, gateway).await;
        Ok(())
    }

    async fn fetch_detail(&self, link: &str) -> Result<(String, String)> {
        let mut session = self.browser.open().await?;
        let fetched = async {
            session.goto(link).await?;
            let html = session.content().await?;
            let current = session.current_url().await.unwrap_or_else(|_| link.to_string());
            Ok::<_, crate::error::ScraperError>((html, current))
        }
        .await;
        if let Err(e) = session.close().await {
            warn!(link, error = %e, "failed to close browser session");
        }
        fetched
    }

    async fn apply(&self, candidate: &mut RawCandidate, detail: DetailData, gateway: bool) {
        if !detail.title.trim().is_empty() {
            candidate.title = detail.title;
        }
        if !detail.date_text.trim().is_empty() {
            candidate.raw_date_text = detail.date_text;
        }
        if !detail.location.trim().is_empty() {
            candidate.raw_location_text = detail.location;
        }

        if gateway {
            match detail.outbound_link {
                Some(outbound) => {
                    let resolved = self.resolver.resolve_final_url(&outbound).await;
                    debug!(from = %candidate.original_link, to = %resolved, "gateway link resolved");
                    candidate.link = resolved;
                }
                None => candidate.link = candidate.original_link.clone(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_detection_uses_original_or_current_link() {
        let mut c = RawCandidate::new(
            "conecta_recife",
            "Oficina".into(),
            "https://conecta.recife.pe.gov.br/evento/1".into(),
        );
        assert!(is_gateway_candidate(&c));
        c.link = "https://bit.ly/abc".into();
        assert!(is_gateway_candidate(&c));

        let other = RawCandidate::new("sympla", "Show".into(), "https://www.sympla.com.br/evento/1".into());
        assert!(!is_gateway_candidate(&other));
    }

    #[test]
    fn only_http_links_without_skip_flag_are_enriched() {
        let mut c = RawCandidate::new("s", "Show".into(), "https://x.example/evento/1".into());
        assert!(enrichable(&c));
        c.skip_enrich = true;
        assert!(!enrichable(&c));
        let relative = RawCandidate::new("s", "Show".into(), "/evento/1".into());
        assert!(!enrichable(&relative));
    }
}
