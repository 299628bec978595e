use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use tracing::{debug, info};

use crate::app::ports::EventStorePort;
use crate::csv::{parse_rows, to_csv_string, HeaderIndex};
use crate::dates::parse_ddmmyyyy;
use crate::error::{Result, ScraperError};
use crate::text::{dedup_key, fix_mojibake};
use crate::types::CanonicalEvent;

pub const STORE_HEADER: &[&str] = &[
    "Id", "Nome", "Descricao", "Data", "Local", "Horario", "Gratuito", "Tipo", "Link", "Saved",
];

/// What the save-time barrier removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BarrierReport {
    pub kept: usize,
    /// Unparseable or past dates
    pub invalid: usize,
    pub duplicates: usize,
}

fn repair_text_fields(mut event: CanonicalEvent) -> CanonicalEvent {
    for field in [
        &mut event.id,
        &mut event.name,
        &mut event.description,
        &mut event.date,
        &mut event.location,
        &mut event.display_time,
        &mut event.category,
        &mut event.link,
    ] {
        *field = fix_mojibake(field);
    }
    event
}

/// Last check before anything is written: every record (old or new) needs a real,
/// non-past `dd-mm-yyyy` date and a unique name/date/location/link key.
pub fn apply_save_barrier(
    records: Vec<CanonicalEvent>,
    today: NaiveDate,
) -> (Vec<CanonicalEvent>, BarrierReport) {
    let total = records.len();
    let mut seen = HashSet::new();
    let mut duplicates = 0usize;

    let kept: Vec<CanonicalEvent> = records
        .into_iter()
        .map(repair_text_fields)
        .filter(|event| matches!(parse_ddmmyyyy(&event.date), Some(date) if date >= today))
        .filter(|event| {
            if seen.insert(dedup_key(event)) {
                true
            } else {
                duplicates += 1;
                false
            }
        })
        .collect();

    let report = BarrierReport {
        kept: kept.len(),
        invalid: total - kept.len() - duplicates,
        duplicates,
    };
    (kept, report)
}

fn bool_token(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn to_row(event: &CanonicalEvent) -> Vec<String> {
    vec![
        event.id.clone(),
        event.name.clone(),
        event.description.clone(),
        event.date.clone(),
        event.location.clone(),
        event.display_time.clone(),
        bool_token(event.is_free).to_string(),
        event.category.clone(),
        event.link.clone(),
        bool_token(event.saved).to_string(),
    ]
}

/// Parse the store document. Rows are matched to columns by (case-insensitive) header name.
pub fn events_from_csv(text: &str) -> Vec<CanonicalEvent> {
    let mut rows = parse_rows(text).into_iter();
    let Some(header) = rows.next() else {
        return Vec::new();
    };
    let index = HeaderIndex::new(&header);
    let field = |row: &[String], name: &str| fix_mojibake(index.get(row, name));

    rows.map(|row| CanonicalEvent {
        id: field(&row, "id"),
        name: field(&row, "nome"),
        description: field(&row, "descricao"),
        date: field(&row, "data"),
        location: field(&row, "local"),
        display_time: field(&row, "horario"),
        is_free: index.get(&row, "gratuito") == "true",
        category: field(&row, "tipo"),
        link: field(&row, "link"),
        saved: index.get(&row, "saved") == "true",
    })
    .collect()
}

pub fn events_to_csv(records: &[CanonicalEvent]) -> String {
    let rows: Vec<Vec<String>> = records.iter().map(to_row).collect();
    to_csv_string(STORE_HEADER, &rows)
}

/// Write `contents` next to `path` and rename it into place.
pub(crate) async fn write_atomically(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// CSV file holding every stored event.
pub struct CsvEventStore {
    path: PathBuf,
    today: Option<NaiveDate>,
}

impl CsvEventStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            today: None,
        }
    }

    /// Pin the barrier's notion of "today" instead of using the local clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }
}

#[async_trait]
impl EventStorePort for CsvEventStore {
    async fn read_all(&self) -> Result<Vec<CanonicalEvent>> {
        if !tokio::fs::try_exists(&self.path).await? {
            info!(path = %self.path.display(), "store file missing, creating an empty one");
            write_atomically(&self.path, &events_to_csv(&[])).await?;
            return Ok(Vec::new());
        }
        let bytes = tokio::fs::read(&self.path).await?;
        let text = String::from_utf8_lossy(&bytes);
        let events = events_from_csv(&text);
        debug!(path = %self.path.display(), count = events.len(), "read store");
        Ok(events)
    }

    async fn replace_all(&self, records: Vec<CanonicalEvent>) -> Result<usize> {
        let submitted = records.len();
        let (kept, report) = apply_save_barrier(records, self.today());
        write_atomically(&self.path, &events_to_csv(&kept))
            .await
            .map_err(|e| ScraperError::Store(format!("writing {}: {e}", self.path.display())))?;
        info!(
            path = %self.path.display(),
            submitted,
            kept = report.kept,
            invalid = report.invalid,
            duplicates = report.duplicates,
            "store saved"
        );
        Ok(report.kept)
    }
}

/// Process-local store with the same save-time barrier as the CSV store.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    records: Arc<Mutex<Vec<CanonicalEvent>>>,
    today: Option<NaiveDate>,
}

impl InMemoryEventStore {
    pub fn new(records: Vec<CanonicalEvent>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
            today: None,
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn snapshot(&self) -> Vec<CanonicalEvent> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EventStorePort for InMemoryEventStore {
    async fn read_all(&self) -> Result<Vec<CanonicalEvent>> {
        self.records
            .lock()
            .map(|r| r.clone())
            .map_err(|e| ScraperError::Store(e.to_string()))
    }

    async fn replace_all(&self, records: Vec<CanonicalEvent>) -> Result<usize> {
        let today = self.today.unwrap_or_else(|| Local::now().date_naive());
        let (kept, report) = apply_save_barrier(records, today);
        let mut guard = self
            .records
            .lock()
            .map_err(|e| ScraperError::Store(e.to_string()))?;
        *guard = kept;
        Ok(report.kept)
    }
}
