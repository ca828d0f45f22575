//! Post-import addons.
//!
//! An addon runs after a release has been written, with the destination
//! paths of every track. Addons run one after another and the first error
//! fails the import.
//!
//! Two addons are built in:
//!
//! - `subproc`: runs an arbitrary command, e.g. `beet import <directory>`
//! - `replaygain`: computes ReplayGain with `rsgain` and writes the tags

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::metadata::{TagCodec, Tags, keys};

/// Expands to every destination path
const MARKER_FILES: &str = "<files>";
/// Expands to the directory holding the destination paths
const MARKER_DIRECTORY: &str = "<directory>";

const RSGAIN_COMMAND: &str = "rsgain";

#[async_trait]
pub trait Addon: Send + Sync + fmt::Display {
    /// Verify the addon can run, e.g. that its command exists
    fn check(&self) -> Result<()>;

    async fn process_release(&self, cancel: &CancellationToken, paths: &[PathBuf]) -> Result<()>;
}

/// Build an addon from its config entry
pub fn from_config(name: &str, conf: &str, codec: Arc<dyn TagCodec>) -> Result<Box<dyn Addon>> {
    match name {
        "subproc" => Ok(Box::new(SubprocAddon::new(conf)?)),
        "replaygain" => Ok(Box::new(ReplayGainAddon::new(conf, codec)?)),
        other => Err(Error::addon(other, "addon not found")),
    }
}

/// Runs a user-configured command
#[derive(Debug, Clone, PartialEq)]
pub struct SubprocAddon {
    command: String,
    args: Vec<String>,
}

impl SubprocAddon {
    pub fn new(conf: &str) -> Result<Self> {
        let mut parts = shell_split(conf).map_err(|e| Error::addon("subproc", e))?;
        if parts.is_empty() {
            return Err(Error::addon("subproc", "no command provided"));
        }
        let command = parts.remove(0);
        Ok(Self {
            command,
            args: parts,
        })
    }

    fn expand_args(&self, paths: &[PathBuf]) -> Result<Vec<String>> {
        let mut args = Vec::with_capacity(self.args.len() + paths.len());
        for arg in &self.args {
            match arg.as_str() {
                MARKER_FILES => args.extend(paths.iter().map(|p| p.to_string_lossy().into_owned())),
                MARKER_DIRECTORY => {
                    let dir = common_dir(paths)?;
                    args.push(dir.to_string_lossy().into_owned());
                }
                _ => args.push(arg.clone()),
            }
        }
        Ok(args)
    }
}

#[async_trait]
impl Addon for SubprocAddon {
    fn check(&self) -> Result<()> {
        match find_in_path(&self.command) {
            Some(_) => Ok(()),
            None => Err(Error::addon(
                "subproc",
                format!("command {:?} not found in PATH", self.command),
            )),
        }
    }

    async fn process_release(&self, cancel: &CancellationToken, paths: &[PathBuf]) -> Result<()> {
        let args = self.expand_args(paths)?;
        tracing::debug!(command = %self.command, ?args, "Starting subprocess");

        let mut cmd = Command::new(&self.command);
        cmd.args(&args);
        let output = run(cancel, &mut cmd)
            .await
            .map_err(|e| e.context("run cmd"))?;
        check_status(&self.command, &output).map_err(|e| Error::addon("subproc", e))
    }
}

impl fmt::Display for SubprocAddon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = std::iter::once(&self.command)
            .chain(&self.args)
            .map(|p| format!("{p:?}"))
            .collect();
        write!(f, "subproc ({})", parts.join(" "))
    }
}

/// The single directory every path sits in
fn common_dir(paths: &[PathBuf]) -> Result<&Path> {
    let mut dir: Option<&Path> = None;
    for parent in paths.iter().filter_map(|p| p.parent()) {
        match dir {
            Some(d) if d != parent => {
                return Err(Error::addon(
                    "subproc",
                    "addon called with paths from two different directories",
                ));
            }
            _ => dir = Some(parent),
        }
    }
    dir.ok_or_else(|| Error::addon("subproc", "no paths to take a directory from"))
}

/// Loudness levels from rsgain
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Level {
    pub gain_db: f64,
    pub peak: f64,
}

/// Computes album and track ReplayGain with `rsgain` and tags the files
pub struct ReplayGainAddon {
    true_peak: bool,
    force: bool,
    codec: Arc<dyn TagCodec>,
}

impl ReplayGainAddon {
    /// `conf` is a space-separated list of `true-peak` and `force`
    pub fn new(conf: &str, codec: Arc<dyn TagCodec>) -> Result<Self> {
        let mut addon = Self {
            true_peak: false,
            force: false,
            codec,
        };
        for option in conf.split_whitespace() {
            match option {
                "true-peak" => addon.true_peak = true,
                "force" => addon.force = true,
                other => return Err(Error::addon("replaygain", format!("unknown option {other:?}"))),
            }
        }
        Ok(addon)
    }

    async fn calculate(&self, cancel: &CancellationToken, paths: &[PathBuf]) -> Result<(Level, Vec<Level>)> {
        let mut cmd = Command::new(RSGAIN_COMMAND);
        cmd.args(["custom", "--output", "--tagmode", "s"]);
        if self.true_peak {
            cmd.arg("--true-peak");
        }
        cmd.arg("--album").args(paths);

        tracing::debug!(tracks = paths.len(), true_peak = self.true_peak, "Starting rsgain");
        let output = run(cancel, &mut cmd).await?;
        check_status(RSGAIN_COMMAND, &output).map_err(|e| Error::addon("replaygain", e))?;

        let (album, tracks) = parse_rsgain_output(&String::from_utf8_lossy(&output.stdout))
            .map_err(|e| Error::addon("replaygain", e))?;
        if tracks.len() != paths.len() {
            return Err(Error::addon(
                "replaygain",
                format!("got {} levels for {} tracks", tracks.len(), paths.len()),
            ));
        }
        Ok((album, tracks))
    }
}

#[async_trait]
impl Addon for ReplayGainAddon {
    fn check(&self) -> Result<()> {
        match find_in_path(RSGAIN_COMMAND) {
            Some(_) => Ok(()),
            None => Err(Error::addon("replaygain", "rsgain not found in PATH")),
        }
    }

    async fn process_release(&self, cancel: &CancellationToken, paths: &[PathBuf]) -> Result<()> {
        let Some(first) = paths.first() else {
            return Ok(());
        };
        if !self.force {
            let tags = self.codec.read_tags(first)?;
            if !tags.get(keys::REPLAYGAIN_TRACK_GAIN).is_empty() {
                tracing::debug!(path = %first.display(), "ReplayGain already present, skipping");
                return Ok(());
            }
        }

        let (album, tracks) = self.calculate(cancel, paths).await?;

        let mut errors = Vec::new();
        for (path, track) in paths.iter().zip(&tracks) {
            let mut tags = Tags::new();
            tags.set(keys::REPLAYGAIN_TRACK_GAIN, [format_db(track.gain_db)]);
            tags.set(keys::REPLAYGAIN_TRACK_PEAK, [format!("{:.6}", track.peak)]);
            tags.set(keys::REPLAYGAIN_ALBUM_GAIN, [format_db(album.gain_db)]);
            tags.set(keys::REPLAYGAIN_ALBUM_PEAK, [format!("{:.6}", album.peak)]);
            if let Err(e) = self.codec.write_tags(path, &tags, false) {
                errors.push(Error::from(e));
            }
        }
        Error::join(errors).map_or(Ok(()), Err)
    }
}

impl fmt::Display for ReplayGainAddon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "replaygain (force: {}, true peak: {})", self.force, self.true_peak)
    }
}

fn format_db(v: f64) -> String {
    format!("{v:.2} dB")
}

/// Parse `rsgain custom --output` TSV: a header line, one line per track,
/// then an `Album` line
pub fn parse_rsgain_output(output: &str) -> std::result::Result<(Level, Vec<Level>), String> {
    const COLUMNS: usize = 7;
    const FILENAME: usize = 0;
    const GAIN_DB: usize = 2;
    const PEAK: usize = 3;

    let mut album = Level::default();
    let mut tracks = Vec::new();

    for line in output.lines().skip(1).filter(|l| !l.trim().is_empty()) {
        let columns: Vec<&str> = line.split('\t').collect();
        if columns.len() != COLUMNS {
            return Err(format!("num columns mismatch {} / {}", columns.len(), COLUMNS));
        }
        let number = |i: usize, what: &str| {
            columns[i]
                .trim()
                .parse::<f64>()
                .map_err(|e| format!("read {what}: {e}"))
        };
        let level = Level {
            gain_db: number(GAIN_DB, "gain dB")?,
            peak: number(PEAK, "peak")?,
        };
        match columns[FILENAME] {
            "Album" => album = level,
            _ => tracks.push(level),
        }
    }
    Ok((album, tracks))
}

/// Run a command to completion, killing it if the import is cancelled
async fn run(cancel: &CancellationToken, cmd: &mut Command) -> Result<Output> {
    cmd.kill_on_drop(true);
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        output = cmd.output() => output.map_err(Error::Io),
    }
}

fn check_status(command: &str, output: &Output) -> std::result::Result<(), String> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        Err(format!("{command} exited with {}", output.status))
    } else {
        Err(format!("{command} exited with {}: {stderr}", output.status))
    }
}

/// Locate an executable the way a shell would
pub fn find_in_path(command: &str) -> Option<PathBuf> {
    if command.contains(std::path::MAIN_SEPARATOR) {
        let path = PathBuf::from(command);
        return is_executable(&path).then_some(path);
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(command))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Split a command line into words, honouring single quotes, double
/// quotes and backslash escapes
pub fn shell_split(input: &str) -> std::result::Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut word));
                    in_word = false;
                }
            }
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => word.push(c),
                        None => return Err("unterminated single quote".into()),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c @ ('"' | '\\' | '$' | '`')) => word.push(c),
                            Some(c) => {
                                word.push('\\');
                                word.push(c);
                            }
                            None => return Err("unterminated double quote".into()),
                        },
                        Some(c) => word.push(c),
                        None => return Err("unterminated double quote".into()),
                    }
                }
            }
            '\\' => {
                in_word = true;
                match chars.next() {
                    Some(c) => word.push(c),
                    None => return Err("trailing backslash".into()),
                }
            }
            c => {
                in_word = true;
                word.push(c);
            }
        }
    }
    if in_word {
        words.push(word);
    }
    Ok(words)
}
