//! Origin sidecar files, as written by gazelle-origin.
//!
//! The file is a flat YAML mapping like:
//!
//! ```text
//! Record label:   Warp
//! Catalog number: WARPCD92
//! Media:          WEB
//! Edition year:   2002
//! ```
//!
//! Only used to narrow the release search when no release ID is known.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::Value;

use crate::enrichment::ReleaseQuery;
use crate::enrichment::domain::PartialDate;
use crate::error::{Error, Result};

/// Names an origin file may have, compared case-insensitively
const FILE_NAMES: &[&str] = &["origin.yaml", "origin.yml", "origin.txt"];

/// Media names that differ between the origin file and MusicBrainz
const MEDIA_NAMES: &[(&str, &str)] = &[("WEB", "Digital Media")];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OriginFile {
    pub path: PathBuf,
    pub record_label: String,
    pub catalog_number: String,
    pub media: String,
    pub edition_year: Option<i32>,
}

/// Find and parse the origin file in `dir`, if there is one
pub fn find(dir: &Path) -> Result<Option<OriginFile>> {
    let entries = fs::read_dir(dir).map_err(|e| Error::file(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::file(dir, e))?;
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if !FILE_NAMES.contains(&name.as_str()) {
            continue;
        }
        let path = entry.path();
        let content = fs::read_to_string(&path).map_err(|e| Error::file(&path, e))?;
        return parse(&path, &content).map(Some);
    }
    Ok(None)
}

/// Parse origin file content. Unknown keys are ignored.
pub fn parse(path: &Path, content: &str) -> Result<OriginFile> {
    let fields: BTreeMap<String, Value> = serde_yaml::from_str(content)
        .map_err(|e| Error::origin(path, e))?;

    let field = |key: &str| fields.get(key).map(scalar_string).unwrap_or_default();

    Ok(OriginFile {
        path: path.to_path_buf(),
        record_label: field("Record label"),
        catalog_number: field("Catalog number"),
        media: field("Media"),
        edition_year: field("Edition year").parse().ok().filter(|y| *y > 0),
    })
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

impl OriginFile {
    /// Fill the query with whatever the origin file knows
    pub fn extend_query(&self, query: &mut ReleaseQuery) {
        tracing::debug!(file = %self.path.display(), "Using origin file");

        if !self.record_label.is_empty() {
            query.label = self.record_label.clone();
        }
        if !self.catalog_number.is_empty() {
            query.catalog_num = self.catalog_number.clone();
        }
        if !self.media.is_empty() {
            query.format = MEDIA_NAMES
                .iter()
                .find(|(from, _)| *from == self.media)
                .map(|(_, to)| to.to_string())
                .unwrap_or_else(|| self.media.clone());
        }
        if let Some(year) = self.edition_year {
            query.date = Some(PartialDate::year(year));
        }
    }
}
