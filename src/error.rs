//! Crate-wide error types.
//!
//! Library modules use specific error types via `thiserror`
//! ([`EnrichmentError`](crate::enrichment::EnrichmentError),
//! [`FormatError`], [`TagError`]) which convert into [`Error`]. The binary
//! uses `anyhow` on top.
//!
//! Errors fall into four groups:
//!
//! - input: nothing usable in the source dir, or a bad path format
//! - match quality: [`Error::ScoreTooLow`] and [`Error::TrackCountMismatch`]
//!   carry the scored result so a human can decide. See [`Error::is_non_fatal`]
//! - filesystem: I/O plus the size brakes on trimming and cleanup
//! - collaborators: metadata lookups, tag codec, addons

use std::path::PathBuf;

use crate::enrichment::EnrichmentError;
use crate::importer::SearchResult;
use crate::metadata::TagError;
use crate::pathformat::FormatError;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no tracks in dir")]
    NoTracks,

    /// Every track sits in the same subdirectory, which looks like an
    /// artist folder rather than a multi-disc release
    #[error("no tracks in dir: all tracks are nested in {0}")]
    NestedTracks(PathBuf),

    #[error("tracks in dir can't be sorted: no track numbers or numbers in filenames present")]
    NotSortable,

    #[error("origin file {path}: {message}")]
    Origin { path: PathBuf, message: String },

    #[error("path format: {0}")]
    Format(#[from] FormatError),

    #[error("score too low: {:.2}", .0.score)]
    ScoreTooLow(Box<SearchResult>),

    #[error("track count mismatch: {remote} remote / {local} local")]
    TrackCountMismatch {
        remote: usize,
        local: usize,
        result: Box<SearchResult>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("can't copy self to self: {0}")]
    SelfCopy(PathBuf),

    #[error("extra files were too big to remove: {size}/{limit}")]
    TrimTooLarge { size: u64, limit: u64 },

    #[error("folder {path} was too big for clean up: {size}/{limit}")]
    CleanTooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("{}", join_errors(.0))]
    Multiple(Vec<Error>),

    #[error("Enrichment error: {0}")]
    Enrichment(#[from] EnrichmentError),

    #[error(transparent)]
    Tags(#[from] TagError),

    #[error("addon {name}: {message}")]
    Addon { name: String, message: String },

    #[error("import cancelled")]
    Cancelled,

    #[error("task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// An I/O error on a specific path
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::File {
            path: path.into(),
            source,
        }
    }

    pub fn origin(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Origin {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn addon(name: impl Into<String>, message: impl ToString) -> Self {
        Self::Addon {
            name: name.into(),
            message: message.to_string(),
        }
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }

    /// `None` for an empty list, the error itself for one, [`Error::Multiple`] otherwise
    pub fn join(mut errors: Vec<Error>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Multiple(errors)),
        }
    }

    /// The error without any context wrappers
    pub fn root(&self) -> &Error {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// True for match-quality errors that a human can act on by confirming
    /// or by retrying with an explicit release ID
    pub fn is_non_fatal(&self) -> bool {
        matches!(
            self.root(),
            Self::ScoreTooLow(_) | Self::TrackCountMismatch { .. }
        )
    }

    /// The scored but unapplied result attached to a match-quality error
    pub fn search_result(&self) -> Option<&SearchResult> {
        match self.root() {
            Self::ScoreTooLow(result) | Self::TrackCountMismatch { result, .. } => Some(result),
            _ => None,
        }
    }

    /// Whether the underlying I/O error is "not found"
    pub fn is_not_found(&self) -> bool {
        match self.root() {
            Self::Io(e) | Self::File { source: e, .. } => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Io(e).context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, EnrichmentError> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Enrichment(e).context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, FormatError> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Format(e).context(ctx))
    }
}
