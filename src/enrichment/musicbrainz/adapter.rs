//! Adapter layer: Convert MusicBrainz DTOs to domain models
//!
//! This is the ONLY place where DTO types are converted to domain types.
//! If MusicBrainz changes their response format, only this file and
//! dto.rs need to change.

use std::time::Duration;

use super::dto;
use crate::enrichment::domain::{
    Alias, Artist, ArtistCredit, Genre, Label, LabelInfo, Medium, PartialDate, Recording, Release,
    ReleaseGroup, Track,
};

/// Convert a release lookup response into a domain release
pub fn to_release(response: dto::ReleaseResponse) -> Release {
    Release {
        id: response.id,
        title: response.title,
        disambiguation: response.disambiguation,
        barcode: response.barcode.unwrap_or_default(),
        date: response.date.as_deref().and_then(PartialDate::parse),
        artists: to_credits(response.artist_credit),
        release_group: response
            .release_group
            .map(to_release_group)
            .unwrap_or_default(),
        label_info: response
            .label_info
            .into_iter()
            .map(to_label_info)
            .collect(),
        genres: to_genres(response.genres),
        media: response.media.into_iter().map(to_medium).collect(),
    }
}

fn to_release_group(rg: dto::ReleaseGroup) -> ReleaseGroup {
    ReleaseGroup {
        id: rg.id,
        title: rg.title,
        disambiguation: rg.disambiguation,
        primary_type: rg.primary_type.unwrap_or_default(),
        secondary_types: rg.secondary_types,
        first_release_date: rg.first_release_date.as_deref().and_then(PartialDate::parse),
        artists: to_credits(rg.artist_credit),
        genres: to_genres(rg.genres),
    }
}

fn to_label_info(info: dto::LabelInfo) -> LabelInfo {
    LabelInfo {
        label: info
            .label
            .map(|l| Label {
                id: l.id,
                name: l.name,
                genres: to_genres(l.genres),
            })
            .unwrap_or_default(),
        catalog_number: info.catalog_number.unwrap_or_default(),
    }
}

fn to_medium(medium: dto::Medium) -> Medium {
    Medium {
        position: medium.position.unwrap_or_default(),
        title: medium.title.unwrap_or_default(),
        format: medium.format.unwrap_or_default(),
        pregap: medium.pregap.map(to_track),
        tracks: medium.tracks.into_iter().map(to_track).collect(),
    }
}

fn to_track(track: dto::Track) -> Track {
    // Track titles on a release fall back to the recording title
    let title = track
        .title
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| track.recording.title.clone());

    Track {
        id: track.id,
        title,
        position: track.position.unwrap_or_default(),
        length: track.length.map(Duration::from_millis),
        artists: to_credits(track.artist_credit),
        recording: Recording {
            id: track.recording.id,
            title: track.recording.title,
            video: track.recording.video,
            genres: to_genres(track.recording.genres),
        },
        ..Default::default()
    }
}

fn to_credits(credits: Vec<dto::ArtistCredit>) -> Vec<ArtistCredit> {
    credits
        .into_iter()
        .map(|credit| {
            let artist = credit.artist;
            ArtistCredit {
                // Use credited name if available, otherwise official name
                name: credit.name.unwrap_or_else(|| artist.name.clone()),
                join_phrase: credit.joinphrase.unwrap_or_default(),
                artist: Artist {
                    sort_name: artist.sort_name.unwrap_or_else(|| artist.name.clone()),
                    id: artist.id,
                    name: artist.name,
                    aliases: artist
                        .aliases
                        .into_iter()
                        .map(|a| Alias {
                            name: a.name,
                            locale: a.locale.unwrap_or_default(),
                        })
                        .collect(),
                    genres: to_genres(artist.genres),
                },
            }
        })
        .collect()
}

fn to_genres(genres: Vec<dto::Genre>) -> Vec<Genre> {
    genres
        .into_iter()
        .map(|g| Genre {
            id: g.id,
            name: g.name,
            count: g.count,
        })
        .collect()
}
