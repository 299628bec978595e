//! NormalizationDedupEngine: raw candidates in, canonical records plus one audit row
//! per candidate out.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use metrics::counter;
use tracing::{debug, info};

use crate::constants::{
    DATE_PENDING, DEFAULT_DESCRIPTION, DEFAULT_LOCATION, DESCRIPTION_MAX_CHARS, GATEWAY_MARKER,
    GENERIC_TITLES, GOOGLE_CATEGORY, GOOGLE_ORIGIN_HOST, REASON_DATE_UNPARSED,
    REASON_DUPLICATE_BATCH, REASON_DUPLICATE_STORE, REASON_GENERIC_TITLE, REASON_NO_TITLE,
    REASON_OUT_OF_RANGE, WEB_CATEGORY,
};
use crate::dates::{
    format_ddmmyyyy, format_display_time, interval_end, parse_api_date_text, parse_date_text,
    parse_structured_date, ParseOptions,
};
use crate::enrich::is_gateway_candidate;
use crate::text::{fix_mojibake, host_from_link, normalize_text, truncate_chars};
use crate::types::{AuditRecord, CandidateOrigin, CanonicalEvent, RawCandidate};

/// Empty titles count as generic too.
pub fn is_generic_title(title: &str) -> bool {
    let folded = normalize_text(title.trim());
    folded.is_empty() || GENERIC_TITLES.iter().any(|pattern| folded.contains(pattern))
}

fn title_key(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Mutable state of one run, threaded explicitly through every candidate.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    pub next_id: u64,
    /// Titles already in the store
    pub stored_titles: HashSet<String>,
    /// Titles accepted earlier in this run
    pub accepted_titles: HashSet<String>,
    pub accepted: Vec<CanonicalEvent>,
}

impl RunState {
    pub fn from_store(existing: &[CanonicalEvent]) -> Self {
        let next_id = existing
            .iter()
            .filter_map(|e| e.id.trim().parse::<u64>().ok())
            .max()
            .map_or(1, |max| max + 1);
        let stored_titles = existing
            .iter()
            .map(|e| title_key(&e.name))
            .filter(|t| !t.is_empty())
            .collect();
        Self {
            next_id,
            stored_titles,
            ..Default::default()
        }
    }

    fn take_id(&mut self) -> String {
        let id = format!("{:03}", self.next_id);
        self.next_id += 1;
        id
    }
}

#[derive(Debug, Default)]
pub struct EngineOutput {
    pub accepted: Vec<CanonicalEvent>,
    pub audit: Vec<AuditRecord>,
}

pub struct NormalizationDedupEngine {
    reference: NaiveDate,
    window_end: NaiveDate,
    collected_at: DateTime<Utc>,
}

impl NormalizationDedupEngine {
    pub fn new(reference: NaiveDate) -> Self {
        Self {
            reference,
            window_end: interval_end(reference),
            collected_at: Utc::now(),
        }
    }

    pub fn with_collected_at(mut self, collected_at: DateTime<Utc>) -> Self {
        self.collected_at = collected_at;
        self
    }

    pub fn window(&self) -> (NaiveDate, NaiveDate) {
        (self.reference, self.window_end)
    }

    /// Validate `candidates` against the store contents, in order.
    pub fn process(&self, candidates: &[RawCandidate], existing: &[CanonicalEvent]) -> EngineOutput {
        let mut state = RunState::from_store(existing);
        let mut audit = Vec::with_capacity(candidates.len());
        self.process_into(candidates, &mut state, &mut audit);
        EngineOutput {
            accepted: state.accepted,
            audit,
        }
    }

    /// Same as [`process`](Self::process) but continuing an existing run state.
    pub fn process_into(
        &self,
        candidates: &[RawCandidate],
        state: &mut RunState,
        audit: &mut Vec<AuditRecord>,
    ) {
        let before = state.accepted.len();
        for candidate in candidates {
            audit.push(self.process_one(candidate, state));
        }
        let accepted = state.accepted.len() - before;
        let rejected = candidates.len() - accepted;
        counter!("agenda_candidates_accepted_total").increment(accepted as u64);
        counter!("agenda_candidates_rejected_total").increment(rejected as u64);
        info!(candidates = candidates.len(), accepted, rejected, "batch normalized");
    }

    fn process_one(&self, candidate: &RawCandidate, state: &mut RunState) -> AuditRecord {
        let raw_title = fix_mojibake(candidate.title.trim());
        let raw_date = fix_mojibake(&candidate.raw_date_text);
        let raw_location = fix_mojibake(&candidate.raw_location_text);
        let link = if candidate.link.trim().is_empty() {
            "#".to_string()
        } else {
            candidate.link.clone()
        };
        let google = matches!(candidate.origin, CandidateOrigin::GoogleEvents { .. });

        let mut reasons = Vec::new();
        if raw_title.is_empty() {
            reasons.push(REASON_NO_TITLE);
        }
        if is_generic_title(&raw_title) {
            reasons.push(REASON_GENERIC_TITLE);
        }

        let key = title_key(&raw_title);
        let duplicate_in_store = !key.is_empty() && state.stored_titles.contains(&key);
        let duplicate_in_batch = !key.is_empty() && state.accepted_titles.contains(&key);
        if duplicate_in_store {
            reasons.push(REASON_DUPLICATE_STORE);
        }
        if duplicate_in_batch {
            reasons.push(REASON_DUPLICATE_BATCH);
        }

        let parsed = if google {
            self.google_date(candidate, &raw_date)
        } else {
            self.web_date(candidate, &raw_title, &raw_date, &raw_location)
        };
        let in_range = parsed.is_some_and(|d| d >= self.reference && d <= self.window_end);
        match parsed {
            None => reasons.push(REASON_DATE_UNPARSED),
            Some(_) if !in_range => reasons.push(REASON_OUT_OF_RANGE),
            Some(_) => {}
        }

        let accepted = reasons.is_empty();
        let gateway_link = if candidate.original_link.contains(GATEWAY_MARKER) {
            candidate.original_link.clone()
        } else {
            String::new()
        };
        let record = AuditRecord {
            collected_at: self.collected_at,
            origin_host: if google {
                GOOGLE_ORIGIN_HOST.to_string()
            } else {
                host_from_link(&link)
            },
            raw_title: raw_title.clone(),
            raw_date: raw_date.clone(),
            raw_location: raw_location.clone(),
            gateway_link,
            final_link: link.clone(),
            link: link.clone(),
            parsed_date: parsed,
            in_range,
            duplicate_in_store,
            duplicate_in_batch,
            accepted,
            reasons,
        };

        if let (true, Some(date)) = (accepted, parsed) {
            let event = if google {
                self.google_event(state.take_id(), candidate, raw_title, date, &raw_date, &raw_location, link)
            } else {
                web_event(state.take_id(), raw_title, date, &raw_date, &raw_location, link)
            };
            debug!(id = %event.id, name = %event.name, date = %event.date, "accepted");
            state.accepted_titles.insert(key);
            state.accepted.push(event);
        }

        record
    }

    fn web_date(
        &self,
        candidate: &RawCandidate,
        title: &str,
        raw_date: &str,
        raw_location: &str,
    ) -> Option<NaiveDate> {
        let gateway = is_gateway_candidate(candidate);
        let parsed = parse_date_text(
            raw_date,
            self.reference,
            ParseOptions {
                assume_current_year_if_missing: gateway,
            },
        );
        if !gateway {
            return parsed;
        }

        // Gateway pages carry stale or noisy dates; look at the surrounding text too
        let min_plausible_year = self.reference.year() - 1;
        if parsed.is_some_and(|d| d.year() >= min_plausible_year) {
            return parsed;
        }
        let lenient = ParseOptions {
            assume_current_year_if_missing: true,
        };
        parse_date_text(raw_location, self.reference, lenient)
            .or_else(|| parse_date_text(&format!("{title} {raw_location}"), self.reference, lenient))
            .or(parsed)
    }

    fn google_date(&self, candidate: &RawCandidate, when: &str) -> Option<NaiveDate> {
        let CandidateOrigin::GoogleEvents { start_dates, .. } = &candidate.origin else {
            return None;
        };
        start_dates
            .iter()
            .find_map(|value| parse_structured_date(value, self.reference))
            .or_else(|| parse_api_date_text(when, self.reference))
    }

    #[allow(clippy::too_many_arguments)]
    fn google_event(
        &self,
        id: String,
        candidate: &RawCandidate,
        name: String,
        date: NaiveDate,
        raw_date: &str,
        raw_location: &str,
        link: String,
    ) -> CanonicalEvent {
        let description = match &candidate.origin {
            CandidateOrigin::GoogleEvents {
                description: Some(d),
                ..
            } if !d.trim().is_empty() => fix_mojibake(d),
            _ => DEFAULT_DESCRIPTION.to_string(),
        };
        let mut short = truncate_chars(&description, DESCRIPTION_MAX_CHARS);
        if description.chars().count() > DESCRIPTION_MAX_CHARS {
            short.push_str("...");
        }
        CanonicalEvent {
            id,
            name,
            description: short,
            date: format_ddmmyyyy(date),
            location: non_empty_or(raw_location, DEFAULT_LOCATION),
            display_time: non_empty_or(raw_date, DATE_PENDING),
            is_free: false,
            category: GOOGLE_CATEGORY.to_string(),
            link,
            saved: false,
        }
    }
}

fn non_empty_or(value: &str, default: &str) -> String {
    if value.trim().is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

fn web_event(
    id: String,
    name: String,
    date: NaiveDate,
    raw_date: &str,
    raw_location: &str,
    link: String,
) -> CanonicalEvent {
    CanonicalEvent {
        id,
        name,
        description: truncate_chars(
            &non_empty_or(raw_location, DEFAULT_DESCRIPTION),
            DESCRIPTION_MAX_CHARS,
        ),
        date: format_ddmmyyyy(date),
        location: non_empty_or(raw_location, DEFAULT_LOCATION),
        display_time: format_display_time(raw_date),
        is_free: false,
        category: WEB_CATEGORY.to_string(),
        link,
        saved: false,
    }
}
