//! The import pipeline.
//!
//! [`Importer::process_dir`] takes one release directory through:
//!
//! 1. read the files and pick a cover ([`reader`])
//! 2. look up the best matching release and score it ([`crate::matching`])
//! 3. decide whether the match is good enough ([`ImportCondition`])
//! 4. lock source and destination, then move or copy every track into the
//!    library and rewrite its tags
//! 5. run addons, place the cover and any keep files, trim stale files
//! 6. unlock and clean up what's left of the source
//!
//! Nothing is touched on disk before step 4, so failures up to there leave
//! the source as it was. From step 4 on a failed import can be re-run: moving
//! a file onto itself is a no-op and trimming only removes files this import
//! didn't write.

pub mod addon;
pub mod origin;
pub mod reader;

use std::fs;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::enrichment::domain::{PartialDate, Release, Track};
use crate::enrichment::{CoverArtApi, EnrichmentError, MusicBrainzApi, ReleaseQuery};
use crate::error::{Error, Result, ResultExt};
use crate::matching::{self, Diff, Weights};
use crate::metadata::release_tags::{KeepConfig, ReleaseContext, apply_keep, release_tags};
use crate::metadata::{TagCodec, Tags, keys};
use crate::organizer::treelock::TreeLock;
use crate::organizer::{self, DirContext, FileOperation};
use crate::pathformat::{Format, clean_path};

pub use addon::Addon;
pub use origin::OriginFile;
pub use reader::{LocalFile, ReleaseDir};

/// Score a match needs under [`ImportCondition::HighScore`]
pub const MIN_SCORE: f64 = 95.0;

/// Cover lookups and downloads give up after this long
const COVER_TIMEOUT: Duration = Duration::from_secs(30);

/// When a scored match is good enough to import
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ImportCondition {
    /// Score at least the minimum
    #[default]
    HighScore,
    /// Score at least the minimum, or the release ID was given explicitly
    HighScoreOrMbid,
    /// Always; a human has already confirmed the match
    Confirm,
}

impl ImportCondition {
    pub fn should_import(self, score: f64, min_score: f64, has_mbid: bool) -> bool {
        match self {
            Self::HighScore => score >= min_score,
            Self::HighScoreOrMbid => score >= min_score || has_mbid,
            Self::Confirm => true,
        }
    }
}

/// A release matched against a source directory. Returned on success, and
/// attached to match-quality errors so the caller can show what was found.
#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    pub release: Release,
    pub score: f64,
    /// Where the release went; `None` unless it was imported
    pub dest_dir: Option<PathBuf>,
    pub diff: Vec<Diff>,
    pub origin_file: Option<OriginFile>,
}

/// Import outcome kinds for [`Notifier`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Complete,
    NeedsInput,
    Failed,
}

impl Event {
    pub fn name(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::NeedsInput => "needs-input",
            Self::Failed => "failed",
        }
    }
}

/// Hook told about the outcome of every import
pub trait Notifier: Send + Sync {
    fn notify(&self, event: Event, message: &str);
}

/// Default [`Notifier`]: writes to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: Event, message: &str) {
        match event {
            Event::Complete => tracing::info!(event = event.name(), "{}", message),
            Event::NeedsInput => tracing::warn!(event = event.name(), "{}", message),
            Event::Failed => tracing::error!(event = event.name(), "{}", message),
        }
    }
}

/// Runs imports. One instance is shared by every concurrent import so they
/// all go through the same [`TreeLock`].
pub struct Importer {
    musicbrainz: Arc<dyn MusicBrainzApi>,
    cover_art: Arc<dyn CoverArtApi>,
    codec: Arc<dyn TagCodec>,
    path_format: Format,
    weights: Weights,
    min_score: f64,
    keep_files: Vec<String>,
    keep_tags: KeepConfig,
    addons: Vec<Box<dyn Addon>>,
    upgrade_cover: bool,
    notifier: Arc<dyn Notifier>,
    locks: TreeLock,
}

impl Importer {
    pub fn new(
        musicbrainz: Arc<dyn MusicBrainzApi>,
        cover_art: Arc<dyn CoverArtApi>,
        codec: Arc<dyn TagCodec>,
        path_format: Format,
    ) -> Self {
        Self {
            musicbrainz,
            cover_art,
            codec,
            path_format,
            weights: Weights::default(),
            min_score: MIN_SCORE,
            keep_files: Vec::new(),
            keep_tags: KeepConfig::default(),
            addons: Vec::new(),
            upgrade_cover: false,
            notifier: Arc::new(LogNotifier),
            locks: TreeLock::new(),
        }
    }

    pub fn with_weights(mut self, weights: Weights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    /// File names carried from the source dir to the destination as they are
    pub fn with_keep_files(mut self, keep_files: Vec<String>) -> Self {
        self.keep_files = keep_files;
        self
    }

    pub fn with_keep_tags(mut self, keep_tags: KeepConfig) -> Self {
        self.keep_tags = keep_tags;
        self
    }

    pub fn with_addons(mut self, addons: Vec<Box<dyn Addon>>) -> Self {
        self.addons = addons;
        self
    }

    /// Fetch cover art even when the source has a cover
    pub fn with_upgrade_cover(mut self, upgrade_cover: bool) -> Self {
        self.upgrade_cover = upgrade_cover;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Share a lock table with other importers in the process
    pub fn with_locks(mut self, locks: TreeLock) -> Self {
        self.locks = locks;
        self
    }

    pub fn path_format(&self) -> &Format {
        &self.path_format
    }

    pub fn codec(&self) -> &Arc<dyn TagCodec> {
        &self.codec
    }

    /// Run every addon's preflight check
    pub fn check_addons(&self) -> Result<()> {
        for addon in &self.addons {
            addon.check().with_context(format!("check addon {addon}"))?;
        }
        Ok(())
    }

    /// Match the release in `src_dir` and, if the match is good enough for
    /// `cond`, put it in the library. `use_mbid` forces a release ID.
    ///
    /// Match-quality failures come back as [`Error::ScoreTooLow`] or
    /// [`Error::TrackCountMismatch`] with the scored [`SearchResult`].
    pub async fn process_dir(
        &self,
        cancel: &CancellationToken,
        op: FileOperation,
        src_dir: &Path,
        cond: ImportCondition,
        use_mbid: Option<&str>,
    ) -> Result<SearchResult> {
        let result = self.import(cancel, op, src_dir, cond, use_mbid).await;

        match &result {
            Ok(r) => {
                let dest = r.dest_dir.as_deref().unwrap_or(Path::new(""));
                self.notifier.notify(
                    Event::Complete,
                    &format!("{} {} to {}", op.name(), src_dir.display(), dest.display()),
                );
            }
            Err(e) if matches!(e.root(), Error::Cancelled) => {}
            Err(e) if e.is_non_fatal() => {
                self.notifier
                    .notify(Event::NeedsInput, &format!("{}: {}", src_dir.display(), e));
            }
            Err(e) => {
                self.notifier
                    .notify(Event::Failed, &format!("{}: {}", src_dir.display(), e));
            }
        }
        result
    }

    async fn import(
        &self,
        cancel: &CancellationToken,
        op: FileOperation,
        src_dir: &Path,
        cond: ImportCondition,
        use_mbid: Option<&str>,
    ) -> Result<SearchResult> {
        if !src_dir.is_absolute() {
            return Err(Error::file(
                src_dir,
                io::Error::new(io::ErrorKind::InvalidInput, "source dir must be absolute"),
            ));
        }
        let src_dir = clean_path(src_dir);

        let (dir, origin_file) = {
            let src_dir = src_dir.clone();
            let codec = Arc::clone(&self.codec);
            tokio::task::spawn_blocking(move || -> Result<_> {
                let dir = reader::read_release_dir(&src_dir, codec.as_ref()).with_context("read dir")?;
                let origin = origin::find(&src_dir).with_context("find origin file")?;
                Ok((dir, origin))
            })
            .await??
        };

        let first = dir.files.first().map(|f| &f.tags).ok_or(Error::NoTracks)?;
        let mbid = match use_mbid {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => first.get(keys::MB_RELEASE_ID).to_string(),
        };

        let mut query = build_query(first, &mbid, dir.files.len());
        if mbid.is_empty() {
            if let Some(origin) = &origin_file {
                origin.extend_query(&mut query);
            }
        }

        let release = cancellable(cancel, self.musicbrainz.search_release(&query))
            .await
            .with_context("search musicbrainz")?;

        let release_tracks = release.flat_tracks();
        let (score, diff) = matching::diff_release(&self.weights, &release, &release_tracks, &dir.tags());
        let mut result = SearchResult {
            release,
            score,
            dest_dir: None,
            diff,
            origin_file,
        };

        if release_tracks.len() != dir.files.len() {
            result.score = 0.0;
            return Err(Error::TrackCountMismatch {
                remote: release_tracks.len(),
                local: dir.files.len(),
                result: Box::new(result),
            });
        }
        if !cond.should_import(score, self.min_score, !mbid.is_empty()) {
            return Err(Error::ScoreTooLow(Box::new(result)));
        }

        let dest_dir = dest_dir(&self.path_format, &result.release).with_context("gen dest dir")?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let guard = self
            .locks
            .lock_owned(vec![src_dir.clone(), dest_dir.clone()])
            .await?;
        tracing::info!(
            src = %src_dir.display(),
            dest = %dest_dir.display(),
            score,
            op = op.name(),
            dry_run = op.read_only(),
            "Importing release"
        );

        let job = WriteJob {
            op,
            release: result.release.clone(),
            tracks: release_tracks,
            files: dir.files,
            path_format: self.path_format.clone(),
            codec: Arc::clone(&self.codec),
            keep_tags: self.keep_tags.clone(),
            cancel: cancel.clone(),
        };
        let (dc, dest_paths) = tokio::task::spawn_blocking(move || job.run()).await??;

        if !op.read_only() {
            for addon in &self.addons {
                addon
                    .process_release(cancel, &dest_paths)
                    .await
                    .with_context(format!("process addon {addon}"))?;
            }
        }

        let downloaded = self
            .fetch_cover(cancel, op, &result.release, &dest_dir, dir.cover.as_deref())
            .await
            .with_context("process cover")?;

        let dc = {
            let finish = FinishJob {
                op,
                dc,
                src_dir: src_dir.clone(),
                dest_dir: dest_dir.clone(),
                cover: dir.cover,
                downloaded_cover: downloaded,
                keep_files: self.keep_files.clone(),
            };
            tokio::task::spawn_blocking(move || finish.run()).await??
        };

        drop(guard);

        if src_dir != dest_dir {
            let locks = self.locks.clone();
            let limit = self.path_format.root().to_path_buf();
            let src = src_dir.clone();
            tokio::task::spawn_blocking(move || op.remove_src(&dc, &locks, &limit, &src))
                .await?
                .with_context("clean")?;
        }

        result.dest_dir = Some(dest_dir);
        Ok(result)
    }

    /// Download a cover into the destination when there's no local one, or
    /// when always upgrading. Returns the downloaded temp file.
    async fn fetch_cover(
        &self,
        cancel: &CancellationToken,
        op: FileOperation,
        release: &Release,
        dest_dir: &Path,
        cover: Option<&Path>,
    ) -> Result<Option<PathBuf>> {
        if op.read_only() || (cover.is_some() && !self.upgrade_cover) {
            return Ok(None);
        }

        let skip_if_size = match cover {
            Some(c) => tokio::fs::metadata(c).await.ok().map(|m| m.len()),
            None => None,
        };
        let download = async {
            match self.cover_art.front_cover_url(&release.id).await {
                Ok(Some(url)) => self.cover_art.download_image(&url, skip_if_size).await,
                Ok(None) => Ok(None),
                Err(e) => Err(e),
            }
        };

        let art = match tokio::time::timeout(COVER_TIMEOUT, cancellable(cancel, download)).await {
            Ok(art) => art?,
            Err(_) => {
                return Err(Error::Enrichment(EnrichmentError::Network(
                    "cover art request timed out".into(),
                )));
            }
        };
        let Some(art) = art else {
            return Ok(None);
        };

        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| Error::file(dest_dir, e))?;
        let tmp = dest_dir.join(format!(".cover-download{}", art.extension()));
        tokio::fs::write(&tmp, &art.data)
            .await
            .map_err(|e| Error::file(&tmp, e))?;
        tracing::debug!(url = %art.url, bytes = art.data.len(), "Downloaded cover");
        Ok(Some(tmp))
    }
}

/// The directory a release's tracks go in: the deepest directory holding
/// every rendered track, so per-disc subfolders share one release dir
pub fn dest_dir(path_format: &Format, release: &Release) -> Result<PathBuf> {
    let num_tracks = release.flat_tracks().len().max(1);
    let mut common: Option<PathBuf> = None;
    for i in 0..num_tracks {
        let path = path_format.execute(release, i, ".eg")?;
        let parent = path.parent().map(clean_path).unwrap_or_default();
        common = Some(match common {
            Some(dir) => common_ancestor(&dir, &parent),
            None => parent,
        });
    }
    Ok(common.unwrap_or_default())
}

fn common_ancestor(a: &Path, b: &Path) -> PathBuf {
    a.components()
        .zip(b.components())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| x)
        .collect()
}

/// Search fields from the first file's tags
fn build_query(tags: &Tags, mbid: &str, num_tracks: usize) -> ReleaseQuery {
    let or = |a: &str, b: &str| if a.is_empty() { b.to_string() } else { a.to_string() };
    ReleaseQuery {
        release_id: mbid.to_string(),
        artist_id: or(tags.get(keys::MB_ALBUM_ARTIST_ID), tags.get(keys::MB_ARTIST_ID)),
        release_group_id: tags.get(keys::MB_RELEASE_GROUP_ID).to_string(),
        release: tags.get(keys::ALBUM).to_string(),
        artist: or(tags.get(keys::ALBUM_ARTIST), tags.get(keys::ARTIST)),
        date: PartialDate::parse(tags.get(keys::DATE)),
        format: tags.get(keys::MEDIA).to_string(),
        label: tags.get(keys::LABEL).to_string(),
        catalog_num: tags.get(keys::CATALOG_NUMBER).to_string(),
        barcode: tags.get(keys::BARCODE).to_string(),
        num_tracks,
    }
}

async fn cancellable<T, E: Into<Error>>(
    cancel: &CancellationToken,
    fut: impl Future<Output = std::result::Result<T, E>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        res = fut => res.map_err(Into::into),
    }
}

/// `.ext` of a path as it is, or `""`
fn dotted_ext(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}

/// Per-track placement and tagging, run on the blocking pool
struct WriteJob {
    op: FileOperation,
    release: Release,
    tracks: Vec<Track>,
    files: Vec<LocalFile>,
    path_format: Format,
    codec: Arc<dyn TagCodec>,
    keep_tags: KeepConfig,
    cancel: CancellationToken,
}

impl WriteJob {
    fn run(self) -> Result<(DirContext, Vec<PathBuf>)> {
        let ctx = ReleaseContext::new(&self.release);
        let mut dc = DirContext::new();
        let mut dest_paths = Vec::with_capacity(self.files.len());

        for (i, (file, track)) in self.files.iter().zip(&self.tracks).enumerate() {
            // a file in progress is finished, later ones are not started
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let ext = dotted_ext(&file.path).to_lowercase();
            let dest = self
                .path_format
                .execute(&self.release, i, &ext)
                .with_context("create path")?;

            if !self.op.read_only() {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)
                        .map_err(|e| Error::file(parent, e).context("create dest path"))?;
                }
            }

            let name = file.path.file_name().unwrap_or_default().to_string_lossy();
            self.op
                .process_file(&mut dc, &file.path, &dest)
                .with_context(format!("process path {name:?}"))?;

            if !self.op.read_only() {
                let mut tags = release_tags(&ctx, track);
                apply_keep(&mut tags, &file.tags, &self.keep_tags);
                self.codec
                    .write_tags(&dest, &tags, true)
                    .map_err(|e| Error::from(e).context("write tag file"))?;
            }

            dest_paths.push(dest);
        }
        Ok((dc, dest_paths))
    }
}

/// Cover, keep files and trimming, run on the blocking pool
struct FinishJob {
    op: FileOperation,
    dc: DirContext,
    src_dir: PathBuf,
    dest_dir: PathBuf,
    cover: Option<PathBuf>,
    downloaded_cover: Option<PathBuf>,
    keep_files: Vec<String>,
}

impl FinishJob {
    fn run(mut self) -> Result<DirContext> {
        let cover_path = |p: &Path| self.dest_dir.join(format!("cover{}", dotted_ext(p)));

        if let Some(tmp) = &self.downloaded_cover {
            FileOperation::Move { dry_run: false }
                .process_file(&mut self.dc, tmp, &cover_path(tmp))
                .with_context("move new cover to dest")?;
        } else if let Some(cover) = &self.cover {
            self.op
                .process_file(&mut self.dc, cover, &cover_path(cover))
                .with_context("move cover to dest")?;
        }

        for name in &self.keep_files {
            let (src, dest) = (self.src_dir.join(name), self.dest_dir.join(name));
            match self.op.process_file(&mut self.dc, &src, &dest) {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.context(format!("process keep file {name:?}"))),
            }
        }

        organizer::trim_dest_dir(&self.dc, &self.dest_dir, self.op.read_only()).with_context("trim")?;
        Ok(self.dc)
    }
}
