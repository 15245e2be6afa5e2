//! Persistence of the collected feed list. A run can replay the snapshot
//! instead of scraping live (`--from-snapshot`).

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::model::Feed;

/// Write the collected feeds as a JSON array, creating parent directories
/// as needed.
pub async fn save(feeds: &[Feed], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create snapshot directory {}", parent.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(feeds).context("failed to serialize feeds")?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("failed to write snapshot {}", path.display()))?;
    info!(path = %path.display(), count = feeds.len(), "feed snapshot written");
    Ok(())
}

/// Read a previously written snapshot back into memory.
pub async fn load(path: impl AsRef<Path>) -> Result<Vec<Feed>> {
    let path = path.as_ref();
    let data = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    let feeds: Vec<Feed> =
        serde_json::from_str(&data).context("failed to parse feed snapshot")?;
    info!(path = %path.display(), count = feeds.len(), "feed snapshot loaded");
    Ok(feeds)
}
