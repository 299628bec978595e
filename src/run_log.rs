//! RunLogger: one summary line per run, appended.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::app::ports::RunLogPort;
use crate::dates::format_ddmmyyyy;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub finished_at: DateTime<Utc>,
    pub interval_start: NaiveDate,
    pub interval_end: NaiveDate,
    pub raw_count: usize,
    pub dedup_count: usize,
    pub saved_count: usize,
}

impl RunSummary {
    pub fn line(&self) -> String {
        format!(
            "[{}] intervalo={}..{} brutos={} deduplicados={} salvos_events_csv={}",
            self.finished_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            format_ddmmyyyy(self.interval_start),
            format_ddmmyyyy(self.interval_end),
            self.raw_count,
            self.dedup_count,
            self.saved_count
        )
    }
}

pub struct FileRunLog {
    path: PathBuf,
}

impl FileRunLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RunLogPort for FileRunLog {
    async fn append(&self, summary: &RunSummary) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{}\n", summary.line()).as_bytes()).await?;
        file.flush().await?;
        info!(path = %self.path.display(), "run summary appended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn summary(saved: usize) -> RunSummary {
        RunSummary {
            finished_at: Utc.with_ymd_and_hms(2026, 2, 10, 9, 30, 5).unwrap(),
            interval_start: NaiveDate::from_ymd_opt(2026, 2, 10).unwrap(),
            interval_end: NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
            raw_count: 42,
            dedup_count: 37,
            saved_count: saved,
        }
    }

    #[test]
    fn line_format() {
        assert_eq!(
            summary(5).line(),
            "[2026-02-10T09:30:05.000Z] intervalo=10-02-2026..31-03-2026 brutos=42 deduplicados=37 salvos_events_csv=5"
        );
    }

    #[tokio::test]
    async fn lines_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileRunLog::new(dir.path().join("data").join("scrape_execucoes.log"));
        log.append(&summary(5)).await.unwrap();
        log.append(&summary(0)).await.unwrap();

        let text = std::fs::read_to_string(dir.path().join("data/scrape_execucoes.log")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].ends_with("salvos_events_csv=0"));
    }
}
