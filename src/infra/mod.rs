// Infrastructure adapters implementing app::ports
#[cfg(feature = "browser")]
pub mod chrome;
pub mod http_client;
pub mod static_page;

use std::sync::Arc;

use tracing::warn;

use crate::app::ports::{BrowserPort, HttpClientPort};
use crate::config::Config;

/// Headless Chrome when requested and compiled in, otherwise static HTML fetching.
pub fn build_browser(
    config: &Config,
    http: Arc<dyn HttpClientPort>,
    use_browser: bool,
) -> Arc<dyn BrowserPort> {
    #[cfg(feature = "browser")]
    if use_browser {
        return Arc::new(chrome::ChromeBrowser::new(&config.browser));
    }

    if use_browser {
        warn!("built without the `browser` feature, falling back to static HTML fetching");
    }
    Arc::new(static_page::StaticHtmlBrowser::new(
        http,
        config.http.max_redirect_hops,
    ))
}
