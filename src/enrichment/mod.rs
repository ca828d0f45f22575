//! Release metadata from external services.
//!
//! # Architecture
//!
//! This module follows a clean separation between:
//! - **Domain models** (`domain.rs`) - Internal types the rest of the crate works with
//! - **API DTOs** (`musicbrainz/dto.rs`, `coverart/dto.rs`) - Exact API response shapes
//! - **Adapters** - Convert DTOs to domain models
//! - **Clients** - HTTP clients for external APIs
//! - **Traits** - Seams for injecting mock clients in tests
//!
//! # Usage
//!
//! ```ignore
//! use music_importer::enrichment::{MusicBrainzClient, ReleaseQuery};
//!
//! let client = MusicBrainzClient::new()?;
//! let release = client
//!     .search_release(&ReleaseQuery {
//!         artist: "Queen".into(),
//!         release: "A Night at the Opera".into(),
//!         ..Default::default()
//!     })
//!     .await?;
//! println!("{} tracks", release.flat_tracks().len());
//! ```

pub mod coverart;
pub mod domain;
pub mod musicbrainz;
pub mod traits;

pub use coverart::{CoverArt, CoverArtClient};
pub use domain::{EnrichmentError, Release, Track};
pub use musicbrainz::{MusicBrainzClient, ReleaseQuery};
pub use traits::{CoverArtApi, MusicBrainzApi};
