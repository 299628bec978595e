use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, ScraperError};
use crate::types::SourceDescriptor;

pub const DEFAULT_CONFIG_PATH: &str = "agenda.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub browser: BrowserConfig,
    pub http: HttpConfig,
    pub extraction: ExtractionConfig,
    pub google_events: GoogleEventsConfig,
    pub sources: Vec<SourceDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub log_dir: String,
    pub store_file: String,
    pub audit_file: String,
    pub run_log_file: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub chrome_executable: Option<PathBuf>,
    pub navigation_timeout_secs: u64,
    /// Bounded wait for the first hyperlink; the collector proceeds when it runs out
    pub anchor_wait_secs: u64,
    pub settle_delay_ms: u64,
    pub max_rounds: usize,
    /// Consecutive rounds with an unchanged link count before content counts as stable
    pub stable_rounds: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_redirect_hops: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Hosts whose event pages live at a single bare path segment (`/<slug>`)
    pub bare_slug_hosts: Vec<String>,
    pub max_items_per_page: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GoogleEventsConfig {
    pub enabled: bool,
    pub query: String,
    pub language: String,
    pub country: String,
    pub max_pages: usize,
    /// Read from `SERPAPI_API_KEY` when not set here
    pub api_key: Option<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            log_dir: "logs".to_string(),
            store_file: "events.csv".to_string(),
            audit_file: "auditoria.csv".to_string(),
            run_log_file: "scrape_execucoes.log".to_string(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_executable: None,
            navigation_timeout_secs: 30,
            anchor_wait_secs: 15,
            settle_delay_ms: 1200,
            max_rounds: 12,
            stable_rounds: 3,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string(),
            max_redirect_hops: 8,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            bare_slug_hosts: vec!["outgo.com.br".to_string()],
            max_items_per_page: 300,
        }
    }
}

impl Default for GoogleEventsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            query: "eventos em recife".to_string(),
            language: "pt".to_string(),
            country: "br".to_string(),
            max_pages: 10,
            api_key: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            browser: BrowserConfig::default(),
            http: HttpConfig::default(),
            extraction: ExtractionConfig::default(),
            google_events: GoogleEventsConfig::default(),
            sources: default_sources(),
        }
    }
}

/// Built-in listing sources used when no config file names any.
pub fn default_sources() -> Vec<SourceDescriptor> {
    vec![
        SourceDescriptor {
            key: "sympla".to_string(),
            label: "Sympla".to_string(),
            primary_url: "https://www.sympla.com.br/eventos/recife-pe".to_string(),
            host_hints: vec!["sympla.com.br".to_string()],
            fallback_urls: vec![
                "https://www.sympla.com.br/eventos/recife-pe/todos-eventos".to_string(),
                "https://www.sympla.com.br/pesquisar?s=recife".to_string(),
            ],
            paginated: false,
            page_param: "page".to_string(),
        },
        SourceDescriptor {
            key: "outgo".to_string(),
            label: "Outgo".to_string(),
            primary_url: "https://outgo.com.br/eventos/recife".to_string(),
            host_hints: vec!["outgo.com.br".to_string()],
            fallback_urls: vec!["https://outgo.com.br/busca?q=recife".to_string()],
            paginated: false,
            page_param: "page".to_string(),
        },
        SourceDescriptor {
            key: "conecta_recife".to_string(),
            label: "Conecta Recife".to_string(),
            primary_url: "https://conecta.recife.pe.gov.br/eventos".to_string(),
            host_hints: vec!["conecta.recife.pe.gov.br".to_string()],
            fallback_urls: vec![],
            paginated: true,
            page_param: "page".to_string(),
        },
    ]
}

impl Config {
    /// Load from `path` (or `agenda.toml`); a missing file means built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        if !config_path.exists() {
            if path.is_some() {
                return Err(ScraperError::Config(format!(
                    "Config file '{}' does not exist",
                    config_path.display()
                )));
            }
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(config_path).map_err(|e| {
            ScraperError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;
        Self::from_toml(&config_content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        if config.sources.is_empty() {
            config.sources = default_sources();
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for source in &self.sources {
            url::Url::parse(&source.primary_url).map_err(|e| {
                ScraperError::Config(format!(
                    "Source '{}' has an invalid primary_url '{}': {}",
                    source.key, source.primary_url, e
                ))
            })?;
        }
        if self.browser.stable_rounds == 0 {
            return Err(ScraperError::Config("browser.stable_rounds must be at least 1".into()));
        }
        Ok(())
    }

    /// API key from the config file or the `SERPAPI_API_KEY` environment variable.
    pub fn serpapi_key(&self) -> Option<String> {
        self.google_events
            .api_key
            .clone()
            .or_else(|| std::env::var("SERPAPI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn store_path(&self) -> PathBuf {
        self.paths.data_dir.join(&self.paths.store_file)
    }

    pub fn audit_path(&self) -> PathBuf {
        self.paths.data_dir.join(&self.paths.audit_file)
    }

    pub fn run_log_path(&self) -> PathBuf {
        self.paths.data_dir.join(&self.paths.run_log_file)
    }
}
