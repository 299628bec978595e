//! Listing-page heuristics over a parsed document.
//!
//! Everything here is synchronous and browser-free: the collector hands over the
//! rendered HTML and gets candidates back.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::constants::{BARE_SLUG_STOPWORDS, EVENT_KEYWORDS, PLACE_ANCHORS};
use crate::text::{collapse_whitespace, normalize_text, truncate_chars};
use crate::types::RawCandidate;

static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("link selector"));
static HEADING_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        "h1, h2, h3, h4, h5, h6, [class*='title'], [class*='Title'], [class*='name'], [class*='Name'], strong",
    )
    .expect("heading selector")
});

/// Date-looking substrings in listing text: ISO, numeric BR, Portuguese long and abbreviated forms.
static DATE_HINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b\d{4}-\d{2}-\d{2}\b|\b\d{1,2}[/-]\d{1,2}(?:[/-]\d{2,4})?\b|\b\d{1,2}\s+de\s+[a-zà-ú]+(?:\s+de\s+\d{4})?|\b(?:jan|fev|mar|abr|mai|jun|jul|ago|set|out|nov|dez)[a-zç]*\.?\s+\d{1,2}\b|\b\d{1,2}\s+(?:jan|fev|mar|abr|mai|jun|jul|ago|set|out|nov|dez)[a-zç]*\.?",
    )
    .expect("date hint")
});

const MIN_TITLE_CHARS: usize = 4;
const MAX_LOCATION_CHARS: usize = 160;
/// How far up from a link we look for its card
const CONTAINER_DEPTH: usize = 4;

pub struct ExtractionRules<'a> {
    pub host_hints: &'a [String],
    pub bare_slug_hosts: &'a [String],
    pub max_items: usize,
}

/// First date-like substring of `text`.
pub fn find_date_text(text: &str) -> Option<String> {
    DATE_HINT.find(text).map(|m| m.as_str().trim().to_string())
}

/// First text segment mentioning a known place.
pub fn find_location(segments: &[String]) -> Option<String> {
    segments
        .iter()
        .find(|segment| {
            let folded = normalize_text(segment);
            PLACE_ANCHORS.iter().any(|place| folded.contains(place))
        })
        .map(|segment| truncate_chars(segment, MAX_LOCATION_CHARS))
}

/// Whether `url` looks like an event detail page rather than a site page.
pub fn is_event_path(url: &Url, bare_slug_hosts: &[String]) -> bool {
    let path = url.path().to_lowercase();
    if path.contains("/evento/") || path.contains("/event/") {
        return true;
    }

    let host = url.host_str().unwrap_or("").to_lowercase();
    let on_slug_host = bare_slug_hosts.iter().any(|h| {
        let h = h.to_lowercase();
        host == h || host.ends_with(&format!(".{h}"))
    });
    if !on_slug_host {
        return false;
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    segments.len() == 1 && !BARE_SLUG_STOPWORDS.contains(&segments[0])
}

fn resolve_href(page_url: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    let lower = href.to_lowercase();
    if href.is_empty()
        || href.starts_with('#')
        || lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
    {
        return None;
    }
    let mut resolved = page_url.join(href).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    resolved.set_fragment(None);
    Some(resolved)
}

fn text_segments(element: &ElementRef) -> Vec<String> {
    element
        .text()
        .map(collapse_whitespace)
        .filter(|s| !s.is_empty())
        .collect()
}

fn looks_like_card(element: &ElementRef) -> bool {
    let name = element.value().name();
    if name == "article" || name == "li" {
        return true;
    }
    element.value().classes().any(|class| {
        let class = class.to_lowercase();
        class.contains("card") || class.contains("event") || class.contains("item")
    })
}

/// The card a link sits in: the nearest article/li/card-classed ancestor within a few
/// levels, else the direct parent, else the link itself.
fn enclosing_container<'a>(link: ElementRef<'a>) -> ElementRef<'a> {
    let ancestors: Vec<ElementRef<'a>> = link
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take(CONTAINER_DEPTH)
        .collect();

    ancestors
        .iter()
        .find(|el| looks_like_card(el))
        .or_else(|| ancestors.first())
        .copied()
        .unwrap_or(link)
}

fn heading_text(element: &ElementRef) -> Option<String> {
    element
        .select(&HEADING_SELECTOR)
        .map(|h| collapse_whitespace(&h.text().collect::<Vec<_>>().join(" ")))
        .find(|t| !t.is_empty())
}

fn mentions_event(texts: &[&str]) -> bool {
    texts.iter().any(|text| {
        let folded = normalize_text(text);
        EVENT_KEYWORDS.iter().any(|keyword| folded.contains(keyword))
    })
}

/// Scan every hyperlink of a rendered listing page and keep the ones that look like events.
pub fn extract_candidates(
    html: &str,
    page_url: &Url,
    source_key: &str,
    rules: &ExtractionRules,
) -> Vec<RawCandidate> {
    let document = Html::parse_document(html);
    let hints: Vec<String> = rules.host_hints.iter().map(|h| h.to_lowercase()).collect();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut candidates = Vec::new();

    for link in document.select(&LINK_SELECTOR) {
        if candidates.len() >= rules.max_items {
            tracing::debug!(source = source_key, cap = rules.max_items, "item cap reached");
            break;
        }

        let Some(href) = link.value().attr("href").and_then(|h| resolve_href(page_url, h)) else {
            continue;
        };
        let href_text = href.to_string();
        let href_lower = href_text.to_lowercase();
        if !hints.is_empty() && !hints.iter().any(|h| href_lower.contains(h.as_str())) {
            continue;
        }
        if !is_event_path(&href, rules.bare_slug_hosts) {
            continue;
        }

        let link_text = collapse_whitespace(&link.text().collect::<Vec<_>>().join(" "));
        let container = enclosing_container(link);
        let segments = text_segments(&container);
        let container_text = segments.join(" | ");
        if !mentions_event(&[link_text.as_str(), container_text.as_str()]) {
            continue;
        }

        let title = heading_text(&link)
            .or_else(|| heading_text(&container))
            .unwrap_or_else(|| link_text.clone());
        if title.chars().count() < MIN_TITLE_CHARS {
            continue;
        }

        if !seen.insert((title.to_lowercase(), href_text.clone())) {
            continue;
        }

        let mut candidate = RawCandidate::new(source_key, title, href_text);
        candidate.raw_date_text = find_date_text(&container_text).unwrap_or_default();
        // The title itself often names the city; look for the place elsewhere in the card
        let place_segments: Vec<String> = segments
            .into_iter()
            .filter(|s| *s != candidate.title && *s != link_text)
            .collect();
        candidate.raw_location_text = find_location(&place_segments).unwrap_or_default();
        candidates.push(candidate);
    }

    candidates
}
