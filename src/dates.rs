//! Date normalization for free-form listing text.
//!
//! Parsing is an ordered list of strategies; the first one that yields a real
//! calendar date wins. Nothing here errors: `None` means "try another source
//! of text or reject the candidate".

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::DISPLAY_TIME_PENDING;
use crate::text::normalize_text;

static ISO: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").expect("iso"));
static ISO_ANCHORED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})").expect("iso anchored"));
static BR_NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})[/-](\d{1,2})[/-](\d{4})").expect("br numeric"));
static BR_NUMERIC_ANCHORED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[/-](\d{1,2})[/-](\d{4})$").expect("br anchored"));
static BR_NO_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})[/-](\d{1,2})").expect("br no year"));
static PT_LONG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2})\s+de\s+([a-z.]+)(?:\s+de\s+(\d{4}))?").expect("pt long")
});
static PT_MONTH_DAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z.]+)\s+(\d{1,2})\b").expect("pt month day"));
static PT_DAY_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})\s+([a-z.]{3,9})\b").expect("pt day month"));
static ISO_DATETIME_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}T").expect("iso datetime"));

/// Formats accepted as a last resort by [`parse_structured_date`].
const BARE_FORMATS: &[&str] = &[
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%a, %b %d, %Y",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Accept `dd/mm` without a year, using the reference year
    pub assume_current_year_if_missing: bool,
}

/// Month number for a Portuguese month name or abbreviation (dots ignored).
pub fn pt_month(token: &str) -> Option<u32> {
    let month = match token.replace('.', "").as_str() {
        "janeiro" | "jan" => 1,
        "fevereiro" | "fev" => 2,
        "marco" | "mar" => 3,
        "abril" | "abr" => 4,
        "maio" | "mai" => 5,
        "junho" | "jun" => 6,
        "julho" | "jul" => 7,
        "agosto" | "ago" => 8,
        "setembro" | "set" => 9,
        "outubro" | "out" => 10,
        "novembro" | "nov" => 11,
        "dezembro" | "dez" => 12,
        _ => return None,
    };
    Some(month)
}

struct DateContext<'a> {
    raw: &'a str,
    folded: String,
    year: i32,
    options: ParseOptions,
}

type Strategy = fn(&DateContext) -> Option<NaiveDate>;

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

fn iso(ctx: &DateContext) -> Option<NaiveDate> {
    let caps = ISO.captures(ctx.raw)?;
    ymd(&caps[1], &caps[2], &caps[3])
}

fn br_numeric(ctx: &DateContext) -> Option<NaiveDate> {
    let caps = BR_NUMERIC.captures(ctx.raw)?;
    ymd(&caps[3], &caps[2], &caps[1])
}

fn br_without_year(ctx: &DateContext) -> Option<NaiveDate> {
    if !ctx.options.assume_current_year_if_missing {
        return None;
    }
    let caps = BR_NO_YEAR.captures(ctx.raw)?;
    NaiveDate::from_ymd_opt(ctx.year, caps[2].parse().ok()?, caps[1].parse().ok()?)
}

fn pt_long(ctx: &DateContext) -> Option<NaiveDate> {
    let caps = PT_LONG.captures(&ctx.folded)?;
    let day: u32 = caps[1].parse().ok()?;
    let month = pt_month(&caps[2])?;
    let year = match caps.get(3) {
        Some(y) => y.as_str().parse().ok()?,
        None => ctx.year,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn pt_month_day(ctx: &DateContext) -> Option<NaiveDate> {
    PT_MONTH_DAY.captures_iter(&ctx.folded).find_map(|caps| {
        let month = pt_month(&caps[1])?;
        NaiveDate::from_ymd_opt(ctx.year, month, caps[2].parse().ok()?)
    })
}

fn pt_day_month(ctx: &DateContext) -> Option<NaiveDate> {
    PT_DAY_MONTH.captures_iter(&ctx.folded).find_map(|caps| {
        let month = pt_month(&caps[2])?;
        NaiveDate::from_ymd_opt(ctx.year, month, caps[1].parse().ok()?)
    })
}

const TEXT_STRATEGIES: &[(&str, Strategy)] = &[
    ("iso", iso),
    ("br_numeric", br_numeric),
    ("br_without_year", br_without_year),
    ("pt_long", pt_long),
    ("pt_month_day", pt_month_day),
    ("pt_day_month", pt_day_month),
];

/// Free-text `when` fields from event APIs only come in the full forms.
const API_TEXT_STRATEGIES: &[(&str, Strategy)] = &[
    ("iso", iso),
    ("br_numeric", br_numeric),
    ("pt_long", pt_long),
];

fn run_strategies(
    text: &str,
    reference: NaiveDate,
    options: ParseOptions,
    strategies: &[(&str, Strategy)],
) -> Option<NaiveDate> {
    let raw = text.trim();
    if raw.is_empty() {
        return None;
    }
    let ctx = DateContext {
        raw,
        folded: normalize_text(raw),
        year: reference.year(),
        options,
    };
    strategies.iter().find_map(|(name, strategy)| {
        let parsed = strategy(&ctx);
        if let Some(date) = parsed {
            tracing::trace!(strategy = *name, %date, "parsed date text");
        }
        parsed
    })
}

/// Parses listing text such as `2026-03-21`, `21/03/2026`, `21 de março de 2026`,
/// `fev. 21` or `21 FEV`. Yearless forms take the year of `reference`.
pub fn parse_date_text(text: &str, reference: NaiveDate, options: ParseOptions) -> Option<NaiveDate> {
    run_strategies(text, reference, options, TEXT_STRATEGIES)
}

/// Like [`parse_date_text`] restricted to ISO, `dd/mm/yyyy` and the long Portuguese form.
pub fn parse_api_date_text(text: &str, reference: NaiveDate) -> Option<NaiveDate> {
    run_strategies(text, reference, ParseOptions::default(), API_TEXT_STRATEGIES)
}

/// Entry point for values out of structured data (APIs, JSON-LD).
///
/// Stricter than [`parse_date_text`] on the numeric forms (anchored), and accepts
/// bare English-style dates as a last resort, rejecting any whose year lands
/// outside `[reference - 1, reference + 2]`.
pub fn parse_structured_date(value: &str, reference: NaiveDate) -> Option<NaiveDate> {
    let raw = value.trim();
    if raw.is_empty() {
        return None;
    }

    if let Some(date) = ISO_ANCHORED
        .captures(raw)
        .and_then(|caps| ymd(&caps[1], &caps[2], &caps[3]))
    {
        return Some(date);
    }
    if let Some(date) = BR_NUMERIC_ANCHORED
        .captures(raw)
        .and_then(|caps| ymd(&caps[3], &caps[2], &caps[1]))
    {
        return Some(date);
    }

    let ctx = DateContext {
        raw,
        folded: normalize_text(raw),
        year: reference.year(),
        options: ParseOptions::default(),
    };
    if let Some(date) = pt_month_day(&ctx).or_else(|| pt_long(&ctx)) {
        return Some(date);
    }

    let bare = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .or_else(|_| DateTime::parse_from_rfc2822(raw).map(|dt| dt.date_naive()))
        .ok()
        .or_else(|| {
            BARE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        })?;

    let min_year = reference.year() - 1;
    let max_year = reference.year() + 2;
    if bare.year() < min_year || bare.year() > max_year {
        return None;
    }
    Some(bare)
}

/// Last calendar day of the month after `reference`'s month; upper bound of a run's window.
pub fn interval_end(reference: NaiveDate) -> NaiveDate {
    let (year, month) = if reference.month() >= 11 {
        (reference.year() + 1, reference.month() + 2 - 12)
    } else {
        (reference.year(), reference.month() + 2)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.pred_opt())
        .unwrap_or(reference)
}

/// `dd-mm-yyyy`, the stored date shape.
pub fn format_ddmmyyyy(date: NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}

/// Inverse of [`format_ddmmyyyy`]; `None` for anything that is not a real date.
pub fn parse_ddmmyyyy(value: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = value.trim().split('-').collect();
    if parts.len() != 3 {
        return None;
    }
    ymd(parts[2], parts[1], parts[0])
}

/// Human-friendly time for a record card.
///
/// ISO datetimes become `dd/mm/yyyy HH:MM` using the wall-clock time as written;
/// any other text is shown verbatim.
pub fn format_display_time(raw_date_text: &str) -> String {
    let raw = raw_date_text.trim();
    if raw.is_empty() {
        return DISPLAY_TIME_PENDING.to_string();
    }
    if !ISO_DATETIME_PREFIX.is_match(raw) {
        return raw.to_string();
    }

    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_local())
        .ok()
        .or_else(|| {
            let head: String = raw.chars().take(16).collect();
            NaiveDateTime::parse_from_str(&head, "%Y-%m-%dT%H:%M").ok()
        });

    match parsed {
        Some(dt) => dt.format("%d/%m/%Y %H:%M").to_string(),
        None => raw.to_string(),
    }
}
