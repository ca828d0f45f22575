//! Cover Art Archive API Data Transfer Objects
//!
//! API Reference: https://wiki.musicbrainz.org/Cover_Art_Archive/API

use serde::Deserialize;

/// Cover art listing for a release
#[derive(Debug, Clone, Deserialize)]
pub struct CoverArtResponse {
    #[serde(default)]
    pub images: Vec<Image>,
}

/// A single cover art image
#[derive(Debug, Clone, Deserialize)]
pub struct Image {
    #[serde(default)]
    pub front: bool,
    #[serde(default)]
    pub types: Vec<String>,
    /// URL to the full-size image
    pub image: String,
    #[serde(default)]
    pub thumbnails: Thumbnails,
    #[serde(default)]
    pub approved: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thumbnails {
    #[serde(rename = "1200")]
    pub xlarge: Option<String>,
}

impl CoverArtResponse {
    /// The first approved front image, falling back to any image typed "Front"
    pub fn front(&self) -> Option<&Image> {
        self.images
            .iter()
            .find(|i| i.front && i.approved)
            .or_else(|| {
                self.images
                    .iter()
                    .find(|i| i.types.iter().any(|t| t == "Front"))
            })
    }
}
