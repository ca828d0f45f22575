//! Trait definitions for external API clients.
//!
//! These traits enable dependency injection and mocking for tests.
//! Production code uses the real client implementations, while tests
//! can substitute mock implementations.
//!
//! # Example
//!
//! ```ignore
//! use music_importer::enrichment::traits::MusicBrainzApi;
//!
//! async fn lookup<T: MusicBrainzApi>(client: &T, query: &ReleaseQuery) {
//!     let release = client.search_release(query).await?;
//! }
//! ```

use async_trait::async_trait;

use super::coverart::CoverArt;
use super::domain::{EnrichmentError, Release};
use super::musicbrainz::ReleaseQuery;

/// Trait for MusicBrainz release lookup.
#[async_trait]
pub trait MusicBrainzApi: Send + Sync {
    /// Find the best candidate release for a query
    async fn search_release(&self, query: &ReleaseQuery) -> Result<Release, EnrichmentError>;

    /// Fetch a release by its MusicBrainz ID
    async fn get_release(&self, release_id: &str) -> Result<Release, EnrichmentError>;
}

/// Trait for Cover Art Archive lookup.
#[async_trait]
pub trait CoverArtApi: Send + Sync {
    /// URL of the release's front cover, `None` if it has none
    async fn front_cover_url(&self, release_id: &str) -> Result<Option<String>, EnrichmentError>;

    /// Download an image, skipping the body when the remote size equals `skip_if_size`
    async fn download_image(
        &self,
        url: &str,
        skip_if_size: Option<u64>,
    ) -> Result<Option<CoverArt>, EnrichmentError>;
}

// Implement traits for real clients

#[async_trait]
impl MusicBrainzApi for super::musicbrainz::MusicBrainzClient {
    async fn search_release(&self, query: &ReleaseQuery) -> Result<Release, EnrichmentError> {
        self.search_release(query).await
    }

    async fn get_release(&self, release_id: &str) -> Result<Release, EnrichmentError> {
        self.get_release(release_id).await
    }
}

#[async_trait]
impl CoverArtApi for super::coverart::CoverArtClient {
    async fn front_cover_url(&self, release_id: &str) -> Result<Option<String>, EnrichmentError> {
        self.front_cover_url(release_id).await
    }

    async fn download_image(
        &self,
        url: &str,
        skip_if_size: Option<u64>,
    ) -> Result<Option<CoverArt>, EnrichmentError> {
        self.download_image(url, skip_if_size).await
    }
}
