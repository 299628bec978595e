use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use agenda_scraper::app::ports::EventStorePort;
use agenda_scraper::config::Config;
use agenda_scraper::logging;
use agenda_scraper::pipeline::Pipeline;
use agenda_scraper::storage::CsvEventStore;

#[derive(Parser)]
#[command(name = "agenda_scraper")]
#[command(about = "Recife event listing scraper")]
#[command(version = "0.1.0")]
struct Cli {
    /// Config file (defaults to ./agenda.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect, normalize and store events from every configured source
    Run {
        /// Fetch raw HTML instead of rendering pages in headless Chrome
        #[arg(long)]
        no_browser: bool,
    },
    /// Print the stored events
    List,
    /// Flip the saved flag of one stored event
    ToggleSaved {
        /// Event id, e.g. 007
        id: String,
    },
    /// Print the configured sources
    Sources,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    let _guard = logging::init_logging(&config.paths.log_dir);

    match cli.command {
        Commands::Run { no_browser } => {
            println!("🚀 Running event discovery...");
            let pipeline = Pipeline::from_config(&config, !no_browser)?;
            let today = Local::now().date_naive();
            match pipeline.run(today).await {
                Ok(result) => {
                    info!(run_id = %result.run_id, accepted = result.accepted, "run finished");
                    println!("\n📊 Run {}:", result.run_id);
                    println!(
                        "   Window: {} .. {}",
                        result.interval_start.format("%d-%m-%Y"),
                        result.interval_end.format("%d-%m-%Y")
                    );
                    println!("   Raw candidates: {}", result.stats.raw_count);
                    println!("   After link dedup: {}", result.stats.dedup_count);
                    println!("   Audited: {}", result.audited);
                    println!("   New events: {}", result.accepted);
                    println!("   Stored events: {}", result.records.len());
                    println!("   Audit trail: {}", config.audit_path().display());
                }
                Err(e) => {
                    error!(error = %e, "run failed");
                    return Err(e.into());
                }
            }
        }
        Commands::List => {
            let store = CsvEventStore::new(config.store_path());
            let events = store.read_all().await?;
            if events.is_empty() {
                println!("No stored events.");
            }
            for event in &events {
                let saved = if event.saved { "★" } else { " " };
                println!(
                    "{saved} {} | {} | {} | {} | {}",
                    event.id, event.date, event.name, event.location, event.link
                );
            }
        }
        Commands::ToggleSaved { id } => {
            let store = CsvEventStore::new(config.store_path());
            let mut events = store.read_all().await?;
            let Some(event) = events.iter_mut().find(|e| e.id == id) else {
                bail!("no stored event with id {id}");
            };
            event.saved = !event.saved;
            let now_saved = event.saved;
            store.replace_all(events).await?;
            println!("✅ Event {id} saved={now_saved}");
        }
        Commands::Sources => {
            for source in &config.sources {
                println!("{} ({})", source.label, source.key);
                println!("   primary: {}", source.primary_url);
                for fallback in &source.fallback_urls {
                    println!("   fallback: {fallback}");
                }
                if source.paginated {
                    println!("   paginated by ?{}=N", source.page_param);
                }
            }
            let google = if config.google_events.enabled && config.serpapi_key().is_some() {
                "enabled"
            } else {
                "disabled"
            };
            println!("Google Events: {google}");
        }
    }

    Ok(())
}
