//! Tag inspection command.

use std::path::Path;
use std::time::Duration;

use crate::metadata::{self, SongTagCollector};
use crate::player::format_duration;

/// Print the APE / ID3v2 tags of a file.
pub fn cmd_tags(path: &Path, json: bool) -> anyhow::Result<()> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }

    let mut collector = SongTagCollector::new();
    let found = metadata::scan_generic_tags_path(path, &mut collector);
    let tag = collector.into_tag();

    if json {
        println!("{}", serde_json::to_string_pretty(&tag)?);
        return Ok(());
    }

    if !found {
        println!("No APE or ID3v2 tags in {}", path.display());
        return Ok(());
    }

    println!("{}", path.display());
    if let Some(seconds) = tag.time {
        println!("  {:<10} {}", "Time", format_duration(Duration::from_secs(seconds)));
    }
    for item in &tag.items {
        println!("  {:<10} {}", item.kind.label(), item.value);
    }
    Ok(())
}
