//! Music Importer - matches release directories against MusicBrainz and
//! moves them into a library laid out by a path template.
//!
//! The pipeline lives in [`importer`]; everything else is a building block
//! it composes: [`matching`] scores candidates, [`pathformat`] renders
//! destinations, [`organizer`] moves files under a [`organizer::TreeLock`].

pub mod cli;
pub mod config;
pub mod cover;
pub mod enrichment;
pub mod error;
pub mod importer;
pub mod matching;
pub mod metadata;
pub mod organizer;
pub mod pathformat;
#[cfg(test)]
pub mod test_utils;
