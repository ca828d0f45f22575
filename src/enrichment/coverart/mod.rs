//! Cover Art Archive integration
//!
//! Looks up front covers by MusicBrainz release ID.

pub mod dto;
mod client;

pub use client::{CoverArt, CoverArtClient, DEFAULT_BASE_URL};
