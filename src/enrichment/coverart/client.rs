//! Cover Art Archive HTTP client
//!
//! No API key required, but please respect their rate limits.
//!
//! API: https://coverartarchive.org

use super::dto;
use crate::enrichment::domain::EnrichmentError;

pub const DEFAULT_BASE_URL: &str = "https://coverartarchive.org";

/// Downloaded cover art
#[derive(Debug, Clone)]
pub struct CoverArt {
    /// Image data (JPEG or PNG)
    pub data: Vec<u8>,
    /// Source URL, whose extension names the file type
    pub url: String,
}

impl CoverArt {
    /// File extension taken from the source URL, with a leading dot
    pub fn extension(&self) -> String {
        let path = self.url.split(['?', '#']).next().unwrap_or("");
        let name = path.rsplit('/').next().unwrap_or("");
        match name.rfind('.') {
            Some(i) if i > 0 => name[i..].to_lowercase(),
            _ => ".jpg".to_string(),
        }
    }
}

/// Cover Art Archive client
pub struct CoverArtClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl CoverArtClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a client against a mirror or test server
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// URL of the release's front cover, if it has one
    pub async fn front_cover_url(&self, release_id: &str) -> Result<Option<String>, EnrichmentError> {
        match self.list_cover_art(release_id).await {
            Ok(listing) => Ok(listing.front().map(|i| i.image.clone())),
            Err(EnrichmentError::NoMatches) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// List all cover art for a release
    pub async fn list_cover_art(
        &self,
        release_id: &str,
    ) -> Result<dto::CoverArtResponse, EnrichmentError> {
        let url = format!("{}/release/{}", self.base_url, release_id);

        let response = self
            .http_client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| EnrichmentError::Network(e.to_string()))?;

        let response = check_status(response)?;

        response
            .json::<dto::CoverArtResponse>()
            .await
            .map_err(|e| EnrichmentError::Parse(e.to_string()))
    }

    /// Download an image. When `skip_if_size` matches the advertised content
    /// length, the body is not read and `None` is returned.
    pub async fn download_image(
        &self,
        url: &str,
        skip_if_size: Option<u64>,
    ) -> Result<Option<CoverArt>, EnrichmentError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| EnrichmentError::Network(e.to_string()))?;

        let response = check_status(response)?;

        if let (Some(local), Some(remote)) = (skip_if_size, response.content_length())
            && local == remote
        {
            tracing::debug!(target: "coverart", url, size = remote, "Remote cover same size as local, skipping");
            return Ok(None);
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| EnrichmentError::Network(e.to_string()))?
            .to_vec();

        Ok(Some(CoverArt {
            data,
            url: url.to_string(),
        }))
    }
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response, EnrichmentError> {
    let status = response.status();

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(EnrichmentError::NoMatches);
    }

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(EnrichmentError::RateLimited);
    }

    if !status.is_success() {
        return Err(EnrichmentError::Network(format!(
            "HTTP {}: {}",
            status,
            status.canonical_reason().unwrap_or("Unknown")
        )));
    }

    Ok(response)
}

impl Default for CoverArtClient {
    fn default() -> Self {
        Self::new()
    }
}
