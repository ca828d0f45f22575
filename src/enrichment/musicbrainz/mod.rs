//! MusicBrainz API integration
//!
//! Searches for candidate releases from local tags and fetches full
//! release metadata for scoring and tagging.
//!
//! API docs: https://musicbrainz.org/doc/MusicBrainz_API

pub mod dto;
mod adapter;
mod client;
mod query;

pub use adapter::to_release;
pub use client::{DEFAULT_BASE_URL, MusicBrainzClient};
pub use query::{ReleaseQuery, is_mbid};
