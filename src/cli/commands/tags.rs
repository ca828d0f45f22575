//! Template and tag inspection commands.

use std::path::PathBuf;

use anyhow::{Context, bail};

use crate::metadata::{AudioProperties, LoftyCodec, TagCodec};
use crate::pathformat::Format;

/// Validate a path template, printing its root directory
pub fn cmd_check_format(template: &str) -> anyhow::Result<()> {
    let format = Format::parse(template).context("invalid template")?;
    println!("Template OK");
    println!("Root: {}", format.root().display());
    Ok(())
}

/// Print tags and audio properties for each file
pub fn cmd_read_tags(files: &[PathBuf]) -> anyhow::Result<()> {
    let codec = LoftyCodec;
    let mut error_count = 0;

    for path in files {
        let tags = match codec.read_tags(path) {
            Ok(tags) => tags,
            Err(e) => {
                eprintln!("ERROR {}", e);
                error_count += 1;
                continue;
            }
        };

        println!("{}", path.display());
        for (key, values) in tags.iter() {
            for value in values {
                println!("  {}={}", key, value);
            }
        }
        match codec.read_properties(path) {
            Ok(props) => println!("  ({})", describe_properties(&props)),
            Err(e) => tracing::warn!("Couldn't read properties of {:?}: {}", path, e),
        }
    }

    if error_count > 0 {
        bail!("{} of {} files could not be read", error_count, files.len());
    }
    Ok(())
}

fn describe_properties(props: &AudioProperties) -> String {
    let secs = props.duration.as_secs();
    let mut parts = vec![format!("{}:{:02}", secs / 60, secs % 60)];
    if let Some(bitrate) = props.bitrate {
        parts.push(format!("{} kbps", bitrate));
    }
    if let Some(sample_rate) = props.sample_rate {
        parts.push(format!("{} Hz", sample_rate));
    }
    if let Some(channels) = props.channels {
        parts.push(format!("{} ch", channels));
    }
    if props.embedded_images > 0 {
        parts.push(format!("{} embedded images", props.embedded_images));
    }
    parts.join(", ")
}
