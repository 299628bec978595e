mod common;

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;

use agenda_scraper::app::ports::EventStorePort;
use agenda_scraper::audit::CsvAuditSink;
use agenda_scraper::csv::parse_rows;
use agenda_scraper::error::{Result, ScraperError};
use agenda_scraper::pipeline::Pipeline;
use agenda_scraper::run_log::FileRunLog;
use agenda_scraper::storage::{CsvEventStore, InMemoryEventStore};
use agenda_scraper::types::CanonicalEvent;

use common::{listing, orchestrator, source, FakeBrowser, FakeHttp};

const LISTING_URL: &str = "https://s.example/agenda";

fn reference() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, 10).unwrap()
}

fn browser() -> Arc<FakeBrowser> {
    Arc::new(FakeBrowser::default().with_page(
        LISTING_URL,
        listing(&[
            ("Show Antigo", "/evento/antigo", "20/02/2026"),
            ("Show Novo", "/evento/novo", "15/02/2026"),
            ("show novo", "/evento/novo-extra", "15/02/2026"),
            ("Festival Futuro", "/evento/futuro", "10/05/2026"),
            ("Show Sem Data", "/evento/sem-data", ""),
        ]),
    ))
}

const EXISTING_STORE: &str = "Id,Nome,Descricao,Data,Local,Horario,Gratuito,Tipo,Link,Saved\n\
005,Show Antigo,Recife,20-02-2026,Recife,20h,false,Plataforma Web,https://s.example/evento/antigo,true\n\
003,Velho,Recife,01-01-2026,Recife,20h,false,Plataforma Web,https://s.example/evento/velho,false\n";

fn pipeline(dir: &Path, store: Arc<dyn EventStorePort>) -> Pipeline {
    Pipeline::new(
        orchestrator(browser(), FakeHttp::default()),
        store,
        Arc::new(CsvAuditSink::new(dir.join("auditoria.csv"))),
        Arc::new(FileRunLog::new(dir.join("scrape_execucoes.log"))),
        vec![source("s", LISTING_URL, &["s.example"], &[])],
    )
}

#[tokio::test]
async fn full_run_persists_audits_and_logs() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store_path = dir.path().join("events.csv");
    std::fs::write(&store_path, EXISTING_STORE)?;
    let store = Arc::new(CsvEventStore::new(&store_path).with_today(reference()));

    let result = pipeline(dir.path(), store.clone()).run(reference()).await?;

    assert_eq!(result.stats.raw_count, 5);
    assert_eq!(result.stats.dedup_count, 5);
    assert_eq!(result.audited, 5);
    assert_eq!(result.accepted, 1);
    assert!(result.store_written);
    assert_eq!(result.interval_end, NaiveDate::from_ymd_opt(2026, 3, 31).unwrap());

    let stored = store.read_all().await?;
    let summary: Vec<(&str, &str, bool)> = stored
        .iter()
        .map(|e| (e.id.as_str(), e.name.as_str(), e.saved))
        .collect();
    assert_eq!(summary, vec![("005", "Show Antigo", true), ("006", "Show Novo", false)]);
    let new_event = &stored[1];
    assert_eq!(new_event.date, "15-02-2026");
    assert_eq!(new_event.location, "Marco Zero, Recife");
    assert_eq!(new_event.category, "Plataforma Web");
    assert_eq!(new_event.display_time, "15/02/2026");

    let audit = parse_rows(&std::fs::read_to_string(dir.path().join("auditoria.csv"))?);
    let reasons: Vec<&str> = audit[1..].iter().map(|row| row[13].as_str()).collect();
    assert_eq!(
        reasons,
        vec!["duplicado_csv", "", "duplicado_lote", "fora_intervalo", "data_nao_parseada"]
    );

    let log = std::fs::read_to_string(dir.path().join("scrape_execucoes.log"))?;
    assert!(log
        .trim_end()
        .ends_with("intervalo=10-02-2026..31-03-2026 brutos=5 deduplicados=5 salvos_events_csv=1"));
    Ok(())
}

#[tokio::test]
async fn rerun_accepts_nothing_and_leaves_the_store_alone() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store_path = dir.path().join("events.csv");
    std::fs::write(&store_path, EXISTING_STORE)?;
    let store = Arc::new(CsvEventStore::new(&store_path).with_today(reference()));

    pipeline(dir.path(), store.clone()).run(reference()).await?;
    let after_first = std::fs::read_to_string(&store_path)?;

    let second = pipeline(dir.path(), store.clone()).run(reference()).await?;

    assert_eq!(second.accepted, 0);
    assert!(!second.store_written);
    assert_eq!(std::fs::read_to_string(&store_path)?, after_first);
    let log = std::fs::read_to_string(dir.path().join("scrape_execucoes.log"))?;
    assert_eq!(log.lines().count(), 2);
    assert!(log.lines().last().unwrap_or_default().ends_with("salvos_events_csv=0"));
    Ok(())
}

struct ReadOnlyStore;

#[async_trait]
impl EventStorePort for ReadOnlyStore {
    async fn read_all(&self) -> Result<Vec<CanonicalEvent>> {
        Ok(Vec::new())
    }

    async fn replace_all(&self, _records: Vec<CanonicalEvent>) -> Result<usize> {
        Err(ScraperError::Store("disk full".into()))
    }
}

#[tokio::test]
async fn store_write_failures_fail_the_run_after_auditing() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;

    let err = pipeline(dir.path(), Arc::new(ReadOnlyStore))
        .run(reference())
        .await
        .unwrap_err();

    assert!(matches!(err, ScraperError::Store(_)));
    assert!(dir.path().join("auditoria.csv").exists());
    Ok(())
}

#[tokio::test]
async fn saved_flags_survive_a_run_against_the_in_memory_store() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let existing = CanonicalEvent {
        id: "005".to_string(),
        name: "Show Antigo".to_string(),
        description: "Recife".to_string(),
        date: "20-02-2026".to_string(),
        location: "Recife".to_string(),
        display_time: "20h".to_string(),
        is_free: false,
        category: "Plataforma Web".to_string(),
        link: "https://s.example/evento/antigo".to_string(),
        saved: true,
    };
    let store = Arc::new(InMemoryEventStore::new(vec![existing.clone()]).with_today(reference()));

    let result = pipeline(dir.path(), store.clone()).run(reference()).await?;

    assert_eq!(result.accepted, 1);
    let snapshot = store.snapshot();
    assert_eq!(snapshot[0], existing);
    assert_eq!(snapshot[1].id, "006");
    assert!(!snapshot[1].saved);
    Ok(())
}

/// Store whose reads fail; records whatever a write would have replaced it with.
#[derive(Default)]
struct UnreadableStore {
    replaced_with: Mutex<Option<Vec<String>>>,
}

#[async_trait]
impl EventStorePort for UnreadableStore {
    async fn read_all(&self) -> Result<Vec<CanonicalEvent>> {
        Err(ScraperError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "permission denied",
        )))
    }

    async fn replace_all(&self, records: Vec<CanonicalEvent>) -> Result<usize> {
        let ids = records.iter().map(|e| e.id.clone()).collect();
        *self.replaced_with.lock().unwrap() = Some(ids);
        Ok(records.len())
    }
}

#[tokio::test]
async fn unreadable_store_stops_the_run_without_overwriting_it() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = Arc::new(UnreadableStore::default());

    let err = pipeline(dir.path(), store.clone())
        .run(reference())
        .await
        .unwrap_err();

    assert!(matches!(err, ScraperError::Io(_)));
    assert_eq!(*store.replaced_with.lock().unwrap(), None);
    assert!(!dir.path().join("scrape_execucoes.log").exists());
    Ok(())
}
