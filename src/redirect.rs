use std::sync::Arc;

use tracing::{debug, warn};
use url::Url;

use crate::app::ports::HttpClientPort;

pub const DEFAULT_MAX_HOPS: usize = 8;

/// Follows HTTP redirects by hand, one hop at a time, without rendering anything.
pub struct RedirectResolver {
    http: Arc<dyn HttpClientPort>,
    max_hops: usize,
}

impl RedirectResolver {
    pub fn new(http: Arc<dyn HttpClientPort>, max_hops: usize) -> Self {
        Self { http, max_hops }
    }

    pub fn http(&self) -> &Arc<dyn HttpClientPort> {
        &self.http
    }

    pub async fn resolve_final_url(&self, url: &str) -> String {
        self.resolve_final_url_with(url, self.max_hops).await
    }

    /// Last URL reached within `max_hops`. Never fails: an unreachable hop or a
    /// malformed `Location` ends the walk at the current URL.
    pub async fn resolve_final_url_with(&self, url: &str, max_hops: usize) -> String {
        let mut current = url.to_string();

        for hop in 0..max_hops {
            let response = match self.http.get(&current).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(url = %current, hop, error = %e, "redirect hop failed");
                    return current;
                }
            };
            if !response.is_redirect() {
                return current;
            }
            let Some(location) = response.location.filter(|l| !l.trim().is_empty()) else {
                return current;
            };

            let next = Url::parse(&current)
                .and_then(|base| base.join(location.trim()))
                .map(|u| u.to_string());
            match next {
                Ok(next) => {
                    debug!(from = %current, to = %next, status = response.status, "redirect");
                    current = next;
                }
                Err(e) => {
                    warn!(url = %current, location = %location, error = %e, "unusable redirect location");
                    return current;
                }
            }
        }

        debug!(url = %current, max_hops, "redirect hop limit reached");
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::HttpGetResult;
    use crate::error::{Result, ScraperError};
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct Redirects(HashMap<&'static str, &'static str>);

    #[async_trait]
    impl HttpClientPort for Redirects {
        async fn get(&self, url: &str) -> Result<HttpGetResult> {
            if url.contains("down.example") {
                return Err(ScraperError::Api { message: "connection refused".into() });
            }
            Ok(match self.0.get(url) {
                Some(location) => HttpGetResult {
                    status: 302,
                    location: Some(location.to_string()),
                    body: String::new(),
                },
                None => HttpGetResult { status: 200, ..Default::default() },
            })
        }
    }

    fn resolver(pairs: &[(&'static str, &'static str)]) -> RedirectResolver {
        RedirectResolver::new(Arc::new(Redirects(pairs.iter().copied().collect())), DEFAULT_MAX_HOPS)
    }

    #[tokio::test]
    async fn follows_relative_and_absolute_locations() {
        let r = resolver(&[
            ("https://bit.ly/x", "https://site.example/a"),
            ("https://site.example/a", "/evento/final"),
        ]);
        assert_eq!(r.resolve_final_url("https://bit.ly/x").await, "https://site.example/evento/final");
    }

    #[tokio::test]
    async fn stops_at_the_hop_limit() {
        let r = resolver(&[
            ("https://loop.example/a", "https://loop.example/b"),
            ("https://loop.example/b", "https://loop.example/a"),
        ]);
        assert_eq!(r.resolve_final_url_with("https://loop.example/a", 3).await, "https://loop.example/b");
    }

    #[tokio::test]
    async fn unreachable_hosts_return_the_last_url() {
        let r = resolver(&[("https://bit.ly/y", "https://down.example/z")]);
        assert_eq!(r.resolve_final_url("https://bit.ly/y").await, "https://down.example/z");
    }
}
