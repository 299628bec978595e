use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use metrics::counter;
use tracing::{error, info, instrument, warn};

use crate::app::ports::{AuditSinkPort, EventStorePort, HttpClientPort, RunLogPort};
use crate::audit::CsvAuditSink;
use crate::collect::{CollectorSettings, PageCollector};
use crate::config::Config;
use crate::engine::{NormalizationDedupEngine, RunState};
use crate::enrich::DetailEnricher;
use crate::error::Result;
use crate::google_events::GoogleEventsClient;
use crate::infra::build_browser;
use crate::infra::http_client::ReqwestHttp;
use crate::orchestrator::SourceOrchestrator;
use crate::redirect::RedirectResolver;
use crate::run_log::{FileRunLog, RunSummary};
use crate::storage::CsvEventStore;
use crate::types::{PipelineResult, SourceDescriptor};

/// One full run: read store, collect, normalize, audit, persist, log.
pub struct Pipeline {
    orchestrator: SourceOrchestrator,
    google_events: Option<GoogleEventsClient>,
    store: Arc<dyn EventStorePort>,
    audit: Arc<dyn AuditSinkPort>,
    run_log: Arc<dyn RunLogPort>,
    sources: Vec<SourceDescriptor>,
}

impl Pipeline {
    pub fn new(
        orchestrator: SourceOrchestrator,
        store: Arc<dyn EventStorePort>,
        audit: Arc<dyn AuditSinkPort>,
        run_log: Arc<dyn RunLogPort>,
        sources: Vec<SourceDescriptor>,
    ) -> Self {
        Self {
            orchestrator,
            google_events: None,
            store,
            audit,
            run_log,
            sources,
        }
    }

    pub fn with_google_events(mut self, client: GoogleEventsClient) -> Self {
        self.google_events = Some(client);
        self
    }

    /// Wire the production adapters described by `config`.
    pub fn from_config(config: &Config, use_browser: bool) -> Result<Self> {
        let http: Arc<dyn HttpClientPort> = Arc::new(ReqwestHttp::new(&config.http)?);
        let browser = build_browser(config, http.clone(), use_browser);
        let resolver = Arc::new(RedirectResolver::new(http.clone(), config.http.max_redirect_hops));

        let collector = PageCollector::new(browser.clone(), CollectorSettings::from_config(config));
        let enricher = DetailEnricher::new(browser, resolver.clone());
        let orchestrator = SourceOrchestrator::new(collector, resolver, enricher);

        let pipeline = Self::new(
            orchestrator,
            Arc::new(CsvEventStore::new(config.store_path())),
            Arc::new(CsvAuditSink::new(config.audit_path())),
            Arc::new(FileRunLog::new(config.run_log_path())),
            config.sources.clone(),
        );

        if !config.google_events.enabled {
            return Ok(pipeline);
        }
        match config.serpapi_key() {
            Some(key) => Ok(pipeline.with_google_events(GoogleEventsClient::new(
                http,
                config.google_events.clone(),
                key,
            ))),
            None => {
                warn!("SERPAPI_API_KEY not set, skipping google events");
                Ok(pipeline)
            }
        }
    }

    /// Store failures (read or write) are returned as errors; everything else is logged
    /// and the run continues with what it has. A store that cannot be read is never written.
    #[instrument(skip(self), fields(run_id = tracing::field::Empty))]
    pub async fn run(&self, reference: NaiveDate) -> Result<PipelineResult> {
        let run_id = uuid::Uuid::new_v4().to_string();
        tracing::Span::current().record("run_id", run_id.as_str());
        counter!("agenda_runs_total").increment(1);

        let existing = match self.store.read_all().await {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "could not read the store, aborting the run");
                return Err(e);
            }
        };
        info!(stored = existing.len(), sources = self.sources.len(), "run started");

        let engine = NormalizationDedupEngine::new(reference);
        let (interval_start, interval_end) = engine.window();
        let mut state = RunState::from_store(&existing);
        let mut audit = Vec::new();

        let web = self.orchestrator.collect_all(&self.sources).await;
        engine.process_into(&web.candidates, &mut state, &mut audit);

        if let Some(client) = &self.google_events {
            let api_candidates = client.fetch_all().await;
            engine.process_into(&api_candidates, &mut state, &mut audit);
        }

        if let Err(e) = self.audit.write_run(&audit).await {
            warn!(error = %e, "failed to write the audit trail");
        }

        let accepted = state.accepted.len();
        let mut records = existing;
        let store_written = accepted > 0;
        if store_written {
            records.extend(state.accepted);
            let kept = self.store.replace_all(records.clone()).await?;
            info!(accepted, kept, "store replaced");
            records = match self.store.read_all().await {
                Ok(persisted) => persisted,
                Err(e) => {
                    warn!(error = %e, "could not re-read the store after saving");
                    records
                }
            };
        } else {
            info!("no new events, store left untouched");
        }

        let summary = RunSummary {
            finished_at: Utc::now(),
            interval_start,
            interval_end,
            raw_count: web.stats.raw_count,
            dedup_count: web.stats.dedup_count,
            saved_count: accepted,
        };
        if let Err(e) = self.run_log.append(&summary).await {
            warn!(error = %e, "failed to append the run summary");
        }

        Ok(PipelineResult {
            run_id,
            interval_start,
            interval_end,
            stats: web.stats,
            audited: audit.len(),
            accepted,
            store_written,
            records,
        })
    }
}
