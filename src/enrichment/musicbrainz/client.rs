//! MusicBrainz HTTP client
//!
//! Handles communication with the MusicBrainz web service.
//! See: https://musicbrainz.org/doc/MusicBrainz_API
//!
//! IMPORTANT: MusicBrainz requires a User-Agent header and rate limits to 1 req/sec.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use super::query::ReleaseQuery;
use super::{adapter, dto};
use crate::enrichment::domain::{EnrichmentError, Release};

pub const DEFAULT_BASE_URL: &str = "https://musicbrainz.org/ws/2";

/// Everything the importer needs in one release lookup
const RELEASE_INCLUDES: &str = "recordings+artist-credits+labels+release-groups+genres+aliases+recording-level-rels+artist-rels+isrcs";

/// User agent string - MusicBrainz requires this
const USER_AGENT: &str = concat!(
    "MusicImporter/",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/music-importer)"
);

/// MusicBrainz API client
pub struct MusicBrainzClient {
    http_client: reqwest::Client,
    base_url: String,
    rate_limit: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl MusicBrainzClient {
    pub fn new() -> Result<Self, EnrichmentError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a client against a mirror or test server
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, EnrichmentError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| EnrichmentError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rate_limit: Duration::from_secs(1),
            last_request: Mutex::new(None),
        })
    }

    /// Override the minimum delay between requests (mirrors often allow more)
    pub fn with_rate_limit(mut self, rate_limit: Duration) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Fetch a full release by MusicBrainz ID
    pub async fn get_release(&self, release_id: &str) -> Result<Release, EnrichmentError> {
        let url = format!(
            "{}/release/{}?fmt=json&inc={}",
            self.base_url, release_id, RELEASE_INCLUDES
        );
        let response: dto::ReleaseResponse = self.request(&url).await?;
        Ok(adapter::to_release(response))
    }

    /// Find the best candidate release for a query.
    ///
    /// A query carrying a valid release MBID goes straight to a lookup.
    /// Otherwise the top search hit is fetched in full.
    pub async fn search_release(&self, query: &ReleaseQuery) -> Result<Release, EnrichmentError> {
        if let Some(id) = query.direct_release_id() {
            return self.get_release(id).await;
        }

        let lucene = query.to_lucene().ok_or(EnrichmentError::NoMatches)?;
        let url = format!(
            "{}/release?fmt=json&limit=1&query={}",
            self.base_url,
            urlencoding::encode(&lucene)
        );

        let response: dto::SearchResponse = self.request(&url).await?;
        let hit = response
            .releases
            .into_iter()
            .next()
            .filter(|h| !h.id.is_empty())
            .ok_or(EnrichmentError::NoMatches)?;

        tracing::debug!(target: "musicbrainz", id = %hit.id, score = hit.score, "Search hit");
        self.get_release(&hit.id).await
    }

    /// Wait out the rate limit, then send the request and parse the response
    async fn request<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, EnrichmentError> {
        {
            let mut last = self.last_request.lock().await;
            if let Some(at) = *last {
                let elapsed = at.elapsed();
                if elapsed < self.rate_limit {
                    tokio::time::sleep(self.rate_limit - elapsed).await;
                }
            }
            *last = Some(Instant::now());
        }

        tracing::trace!(target: "musicbrainz", url, "Request");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| EnrichmentError::Network(e.to_string()))?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(EnrichmentError::NoMatches);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::SERVICE_UNAVAILABLE
        {
            return Err(EnrichmentError::RateLimited);
        }

        if !status.is_success() {
            // Try to parse error response
            if let Ok(error) = response.json::<dto::ApiError>().await {
                return Err(EnrichmentError::ApiError(error.error));
            }
            return Err(EnrichmentError::Network(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| EnrichmentError::Parse(e.to_string()))
    }
}
