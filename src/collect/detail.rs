//! Detail-page extraction: embedded JSON-LD first, then headings/metadata and body text.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::Value;
use url::Url;

use crate::collect::extract::find_date_text;
use crate::constants::{GATEWAY_MARKER, OUTBOUND_ACTION_TERMS};
use crate::text::{collapse_whitespace, normalize_text};

static LD_JSON_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("ld+json selector")
});
static H1_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").expect("h1 selector"));
static OG_TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[property="og:title"]"#).expect("og:title selector")
});
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("title").expect("title selector"));
static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("body").expect("body selector"));
static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("link selector"));

/// JSON-LD nesting we are willing to walk before giving up
const MAX_LD_DEPTH: usize = 6;

/// What a detail page tells us; empty strings mean "not found".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailData {
    pub title: String,
    pub date_text: String,
    pub location: String,
    /// Outbound action link, only looked for on gateway pages
    pub outbound_link: Option<String>,
}

fn is_event_type(value: &Value) -> bool {
    let matches = |t: &str| t.to_lowercase().contains("event");
    match value.get("@type") {
        Some(Value::String(t)) => matches(t),
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).any(matches),
        _ => false,
    }
}

/// Depth-first search for an event-typed object, looking through `@graph`, arrays
/// and nested values.
fn find_event_object(value: &Value, depth: usize) -> Option<&Value> {
    if depth > MAX_LD_DEPTH {
        return None;
    }
    match value {
        Value::Array(items) => items.iter().find_map(|item| find_event_object(item, depth + 1)),
        Value::Object(map) => {
            if is_event_type(value) {
                return Some(value);
            }
            if let Some(graph) = map.get("@graph") {
                if let Some(found) = find_event_object(graph, depth + 1) {
                    return Some(found);
                }
            }
            map.values()
                .filter(|v| v.is_object() || v.is_array())
                .find_map(|v| find_event_object(v, depth + 1))
        }
        _ => None,
    }
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(collapse_whitespace)
        .unwrap_or_default()
}

fn address_text(address: &Value) -> String {
    match address {
        Value::String(s) => collapse_whitespace(s),
        Value::Object(_) => ["streetAddress", "addressLocality", "addressRegion"]
            .iter()
            .map(|key| string_field(address, key))
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    }
}

fn location_text(location: &Value) -> String {
    match location {
        Value::String(s) => collapse_whitespace(s),
        Value::Array(items) => items.first().map(location_text).unwrap_or_default(),
        Value::Object(_) => {
            let name = string_field(location, "name");
            let address = location.get("address").map(address_text).unwrap_or_default();
            match (name.is_empty(), address.is_empty()) {
                (false, false) if address.contains(&name) => address,
                (false, false) => format!("{name}, {address}"),
                (false, true) => name,
                (true, _) => address,
            }
        }
        _ => String::new(),
    }
}

fn json_ld_event(document: &Html) -> Option<DetailData> {
    for script in document.select(&LD_JSON_SELECTOR) {
        let body = script.text().collect::<String>();
        let Ok(parsed) = serde_json::from_str::<Value>(body.trim()) else {
            tracing::debug!("skipping unparseable ld+json block");
            continue;
        };
        if let Some(event) = find_event_object(&parsed, 0) {
            return Some(DetailData {
                title: string_field(event, "name"),
                date_text: string_field(event, "startDate"),
                location: event.get("location").map(location_text).unwrap_or_default(),
                outbound_link: None,
            });
        }
    }
    None
}

fn fallback_title(document: &Html) -> String {
    let h1 = document
        .select(&H1_SELECTOR)
        .map(|h| collapse_whitespace(&h.text().collect::<Vec<_>>().join(" ")))
        .find(|t| !t.is_empty());
    let og = || {
        document
            .select(&OG_TITLE_SELECTOR)
            .filter_map(|m| m.value().attr("content"))
            .map(collapse_whitespace)
            .find(|t| !t.is_empty())
    };
    let title = || {
        document
            .select(&TITLE_SELECTOR)
            .map(|t| collapse_whitespace(&t.text().collect::<String>()))
            .find(|t| !t.is_empty())
    };
    h1.or_else(og).or_else(title).unwrap_or_default()
}

fn body_text(document: &Html) -> String {
    document
        .select(&BODY_SELECTOR)
        .next()
        .map(|body| collapse_whitespace(&body.text().collect::<Vec<_>>().join(" ")))
        .unwrap_or_default()
}

/// First action-looking link that leaves the gateway.
fn outbound_link(document: &Html, page_url: &Url) -> Option<String> {
    document.select(&LINK_SELECTOR).find_map(|anchor| {
        let text = normalize_text(&anchor.text().collect::<Vec<_>>().join(" "));
        if !OUTBOUND_ACTION_TERMS.iter().any(|term| text.contains(term)) {
            return None;
        }
        let href = page_url.join(anchor.value().attr("href")?.trim()).ok()?;
        if !matches!(href.scheme(), "http" | "https") {
            return None;
        }
        let host = href.host_str().unwrap_or("").to_lowercase();
        if host.contains(GATEWAY_MARKER) {
            return None;
        }
        Some(href.to_string())
    })
}

/// Pull title/date/location (and, on gateway pages, the outbound link) from a detail page.
pub fn extract_detail(html: &str, page_url: &Url, gateway: bool) -> DetailData {
    let document = Html::parse_document(html);
    let mut data = json_ld_event(&document).unwrap_or_default();

    if data.title.is_empty() {
        data.title = fallback_title(&document);
    }
    if data.date_text.is_empty() {
        data.date_text = find_date_text(&body_text(&document)).unwrap_or_default();
    }
    if gateway {
        data.outbound_link = outbound_link(&document, page_url);
    }
    data
}
