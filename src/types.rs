use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

fn default_page_param() -> String {
    "page".to_string()
}

/// One configured listing source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub key: String,
    pub label: String,
    pub primary_url: String,
    /// Substrings a link must contain to be considered same-origin or a known partner
    #[serde(default)]
    pub host_hints: Vec<String>,
    /// Tried in order, only when the primary URL yields nothing
    #[serde(default)]
    pub fallback_urls: Vec<String>,
    /// Listing is spread over `?<page_param>=N` pages discovered from the landing HTML
    #[serde(default)]
    pub paginated: bool,
    #[serde(default = "default_page_param")]
    pub page_param: String,
}

/// Where a candidate came from, which decides how its date is resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CandidateOrigin {
    #[default]
    Web,
    GoogleEvents {
        /// Structured start dates from the API, most specific first
        start_dates: Vec<String>,
        description: Option<String>,
    },
}

/// A scraped item before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCandidate {
    pub source_key: String,
    pub title: String,
    pub raw_date_text: String,
    pub raw_location_text: String,
    pub link: String,
    /// Link before any redirect substitution by the enricher
    pub original_link: String,
    pub skip_enrich: bool,
    pub origin: CandidateOrigin,
}

impl RawCandidate {
    pub fn new(source_key: &str, title: String, link: String) -> Self {
        Self {
            source_key: source_key.to_string(),
            title,
            original_link: link.clone(),
            link,
            ..Default::default()
        }
    }
}

/// The persisted event shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Always `dd-mm-yyyy`
    pub date: String,
    pub location: String,
    pub display_time: String,
    pub is_free: bool,
    pub category: String,
    pub link: String,
    /// Owned by whoever presents the records; carried through untouched
    pub saved: bool,
}

/// One row per candidate describing what happened to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub collected_at: DateTime<Utc>,
    pub origin_host: String,
    pub raw_title: String,
    pub raw_date: String,
    pub raw_location: String,
    /// Original gateway link, empty for non-gateway candidates
    pub gateway_link: String,
    pub final_link: String,
    pub link: String,
    pub parsed_date: Option<NaiveDate>,
    pub in_range: bool,
    pub duplicate_in_store: bool,
    pub duplicate_in_batch: bool,
    pub accepted: bool,
    pub reasons: Vec<&'static str>,
}

impl AuditRecord {
    pub fn reason_text(&self) -> String {
        self.reasons.join("|")
    }
}

/// Counters from the web collection phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScrapeStats {
    /// Candidates across all sources before the global link dedup
    pub raw_count: usize,
    /// Candidates left after the global link dedup
    pub dedup_count: usize,
}

/// Result of a complete pipeline run
#[derive(Debug, Serialize)]
pub struct PipelineResult {
    pub run_id: String,
    pub interval_start: NaiveDate,
    pub interval_end: NaiveDate,
    pub stats: ScrapeStats,
    pub audited: usize,
    pub accepted: usize,
    pub store_written: bool,
    pub records: Vec<CanonicalEvent>,
}
