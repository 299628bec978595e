use std::path::PathBuf;

use async_trait::async_trait;
use chrono::SecondsFormat;
use tracing::info;

use crate::app::ports::AuditSinkPort;
use crate::csv::to_csv_string;
use crate::dates::format_ddmmyyyy;
use crate::error::Result;
use crate::storage::write_atomically;
use crate::types::AuditRecord;

pub const AUDIT_HEADER: &[&str] = &[
    "ColetadoEm",
    "OrigemSite",
    "NomeBruto",
    "DataBruta",
    "LocalBruto",
    "LinkOrigemConecta",
    "LinkFinal",
    "Link",
    "DataParseada",
    "InRange",
    "DuplicadoCSV",
    "DuplicadoLote",
    "Aprovado",
    "MotivoExclusao",
];

pub fn audit_row(record: &AuditRecord) -> Vec<String> {
    vec![
        record.collected_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        record.origin_host.clone(),
        record.raw_title.clone(),
        record.raw_date.clone(),
        record.raw_location.clone(),
        record.gateway_link.clone(),
        record.final_link.clone(),
        record.link.clone(),
        record.parsed_date.map(format_ddmmyyyy).unwrap_or_default(),
        record.in_range.to_string(),
        record.duplicate_in_store.to_string(),
        record.duplicate_in_batch.to_string(),
        record.accepted.to_string(),
        record.reason_text(),
    ]
}

/// One CSV per run; each run overwrites the previous file.
pub struct CsvAuditSink {
    path: PathBuf,
}

impl CsvAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AuditSinkPort for CsvAuditSink {
    async fn write_run(&self, records: &[AuditRecord]) -> Result<()> {
        let rows: Vec<Vec<String>> = records.iter().map(audit_row).collect();
        write_atomically(&self.path, &to_csv_string(AUDIT_HEADER, &rows)).await?;
        info!(path = %self.path.display(), rows = records.len(), "audit trail written");
        Ok(())
    }
}
