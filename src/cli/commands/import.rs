//! Release import command.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use futures::StreamExt;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::enrichment::{CoverArtClient, MusicBrainzClient, domain};
use crate::error::Error;
use crate::importer::{Importer, SearchResult, addon};
use crate::matching::{Diff, Fragment, FragmentKind};
use crate::metadata::{LoftyCodec, TagCodec};
use crate::pathformat::Format;

/// Import every directory in `dirs`, up to `config.import.jobs` at a time.
///
/// Fails if any import failed outright; matches that need a human are
/// reported but don't fail the command.
pub fn cmd_import(
    rt: &Runtime,
    config: &Config,
    dirs: &[PathBuf],
    mbid: Option<&str>,
) -> anyhow::Result<()> {
    if mbid.is_some() && dirs.len() > 1 {
        bail!("--mbid only makes sense with a single directory");
    }

    let op = config.import.file_operation();
    let cond = config.import.condition;
    let jobs = config.import.jobs.max(1);

    rt.block_on(async {
        let importer = Arc::new(build_importer(config)?);

        let cancel = CancellationToken::new();
        tokio::spawn({
            let cancel = cancel.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, cancelling imports");
                    cancel.cancel();
                }
            }
        });

        if op.read_only() {
            println!("\n[DRY RUN MODE - No files will be changed]\n");
        }

        let mut results = futures::stream::iter(dirs.iter().cloned())
            .map(|dir| {
                let importer = Arc::clone(&importer);
                let cancel = cancel.clone();
                async move {
                    let dir = std::path::absolute(&dir).unwrap_or(dir);
                    let result = importer.process_dir(&cancel, op, &dir, cond, mbid).await;
                    (dir, result)
                }
            })
            .buffer_unordered(jobs);

        let (mut imported, mut needs_input, mut failed) = (0, 0, 0);
        while let Some((dir, result)) = results.next().await {
            match result {
                Ok(result) => {
                    imported += 1;
                    print_result(&dir, &result);
                    if let Some(dest) = &result.dest_dir {
                        println!("  -> {}", dest.display());
                    }
                }
                Err(e) if e.is_non_fatal() => {
                    needs_input += 1;
                    if let Some(result) = e.search_result() {
                        print_result(&dir, result);
                    }
                    println!("  needs input: {}", e);
                }
                Err(e) => {
                    failed += 1;
                    if matches!(e.root(), Error::Cancelled) {
                        eprintln!("CANCELLED {}", dir.display());
                    } else {
                        eprintln!("ERROR importing {}: {}", dir.display(), e);
                    }
                }
            }
        }

        println!(
            "\nCompleted: {} imported, {} need input, {} errors",
            imported, needs_input, failed
        );
        info!(imported, needs_input, failed, "Import run finished");

        if failed > 0 {
            bail!("{} of {} imports failed", failed, dirs.len());
        }
        Ok::<(), anyhow::Error>(())
    })
}

/// Wire up an [`Importer`] from the config, with the real network clients
fn build_importer(config: &Config) -> anyhow::Result<Importer> {
    if config.path_format.trim().is_empty() {
        bail!("no path_format configured (set it in the config file or pass --path-format)");
    }
    let path_format = Format::parse(&config.path_format).context("invalid path_format")?;

    let musicbrainz = MusicBrainzClient::with_base_url(&config.musicbrainz.base_url)?
        .with_rate_limit(Duration::from_millis(config.musicbrainz.rate_limit_ms));
    let cover_art = CoverArtClient::with_base_url(&config.musicbrainz.cover_art_base_url);
    let codec: Arc<dyn TagCodec> = Arc::new(LoftyCodec);

    let addons = config
        .addons
        .iter()
        .map(|a| addon::from_config(&a.name, &a.conf, Arc::clone(&codec)))
        .collect::<Result<Vec<_>, _>>()?;

    let importer = Importer::new(
        Arc::new(musicbrainz),
        Arc::new(cover_art),
        codec,
        path_format,
    )
    .with_weights(config.tag_weights.clone())
    .with_min_score(config.import.min_score)
    .with_keep_files(config.import.keep_files.clone())
    .with_keep_tags(config.import.keep_config())
    .with_upgrade_cover(config.import.upgrade_cover)
    .with_addons(addons);

    importer.check_addons()?;
    Ok(importer)
}

fn print_result(dir: &Path, result: &SearchResult) {
    let release = &result.release;
    println!(
        "{}\n  {:.2}% {} - {} ({})",
        dir.display(),
        result.score,
        domain::artists_string(&release.artists),
        release.title,
        release.id
    );
    for line in diff_lines(&result.diff) {
        println!("  {}", line);
    }
}

/// One line per field that differs, deletions as `[-x-]`, insertions as `{+x+}`
fn diff_lines(diffs: &[Diff]) -> Vec<String> {
    diffs
        .iter()
        .filter(|d| !d.equal)
        .map(|d| {
            format!(
                "{}: {} -> {}",
                d.field,
                render_fragments(&d.before),
                render_fragments(&d.after)
            )
        })
        .collect()
}

fn render_fragments(fragments: &[Fragment]) -> String {
    fragments
        .iter()
        .map(|f| match f.kind {
            FragmentKind::Equal => f.text.clone(),
            FragmentKind::Delete => format!("[-{}-]", f.text),
            FragmentKind::Insert => format!("{{+{}+}}", f.text),
        })
        .collect()
}
