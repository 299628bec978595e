pub mod config;
pub mod constants;
pub mod csv;
pub mod dates;
pub mod error;
pub mod logging;
pub mod text;
pub mod types;

// Ports the pipeline talks through, and the adapters behind them
pub mod app;
pub mod infra;

pub mod audit;
pub mod collect;
pub mod engine;
pub mod enrich;
pub mod google_events;
pub mod orchestrator;
pub mod pipeline;
pub mod redirect;
pub mod run_log;
pub mod storage;
