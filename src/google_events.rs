//! Supplemental source: the Google Events engine of SerpApi.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, instrument, warn};
use url::Url;

use crate::app::ports::HttpClientPort;
use crate::config::GoogleEventsConfig;
use crate::constants::DEFAULT_LOCATION;
use crate::error::{Result, ScraperError};
use crate::types::{CandidateOrigin, RawCandidate};

const SERPAPI_ENDPOINT: &str = "https://serpapi.com/search.json";
const PAGE_SIZE: usize = 10;
pub const SOURCE_KEY: &str = "google_events";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    events_results: Vec<EventResult>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventDate {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub when: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventResult {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub date: Option<EventDate>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub address: Option<Vec<String>>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl EventResult {
    /// API results never go through detail enrichment.
    pub fn to_candidate(&self) -> RawCandidate {
        let link = self.link.clone().unwrap_or_else(|| "#".to_string());
        let mut candidate = RawCandidate::new(
            SOURCE_KEY,
            self.title.clone().unwrap_or_default().trim().to_string(),
            link,
        );
        candidate.raw_date_text = self
            .date
            .as_ref()
            .and_then(|d| d.when.clone())
            .unwrap_or_default();
        candidate.raw_location_text = match &self.address {
            Some(lines) => lines.first().cloned().unwrap_or_default(),
            None => DEFAULT_LOCATION.to_string(),
        };
        candidate.skip_enrich = true;

        let start_dates = [
            self.date.as_ref().and_then(|d| d.start_date.clone()),
            self.start_date.clone(),
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.trim().is_empty())
        .collect();
        candidate.origin = CandidateOrigin::GoogleEvents {
            start_dates,
            description: self.description.clone(),
        };
        candidate
    }
}

pub struct GoogleEventsClient {
    http: Arc<dyn HttpClientPort>,
    settings: GoogleEventsConfig,
    api_key: String,
}

impl GoogleEventsClient {
    pub fn new(http: Arc<dyn HttpClientPort>, settings: GoogleEventsConfig, api_key: String) -> Self {
        Self {
            http,
            settings,
            api_key,
        }
    }

    fn page_url(&self, offset: usize) -> Result<Url> {
        let offset = offset.to_string();
        Ok(Url::parse_with_params(
            SERPAPI_ENDPOINT,
            &[
                ("engine", "google_events"),
                ("q", self.settings.query.as_str()),
                ("hl", self.settings.language.as_str()),
                ("gl", self.settings.country.as_str()),
                ("start", offset.as_str()),
                ("api_key", self.api_key.as_str()),
            ],
        )?)
    }

    async fn fetch_page(&self, offset: usize) -> Result<Vec<EventResult>> {
        let url = self.page_url(offset)?;
        let response = self.http.get(url.as_str()).await?;
        if !(200..300).contains(&response.status) {
            return Err(ScraperError::Api {
                message: format!("serpapi returned status {}", response.status),
            });
        }
        let parsed: SearchResponse = serde_json::from_str(&response.body)?;
        if let Some(message) = parsed.error {
            return Err(ScraperError::Api { message });
        }
        Ok(parsed.events_results)
    }

    /// Page through results until an empty page, an error or the page limit.
    #[instrument(skip(self), fields(query = %self.settings.query))]
    pub async fn fetch_all(&self) -> Vec<RawCandidate> {
        let mut candidates = Vec::new();
        for page in 0..self.settings.max_pages {
            let offset = page * PAGE_SIZE;
            match self.fetch_page(offset).await {
                Ok(results) if results.is_empty() => {
                    info!(offset, "no more google events results");
                    break;
                }
                Ok(results) => {
                    info!(offset, count = results.len(), "google events page");
                    candidates.extend(results.iter().map(EventResult::to_candidate));
                }
                Err(e) => {
                    warn!(offset, error = %e, "google events page failed");
                    break;
                }
            }
        }
        metrics::counter!("agenda_google_events_total").increment(candidates.len() as u64);
        candidates
    }
}
