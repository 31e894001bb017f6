use anyhow::{Context, Result};
use log::info;
use std::path::Path;
use tokio::fs;

/// Creates `path` and any missing parents. Idempotent.
pub async fn ensure_directory_exists<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if fs::try_exists(path).await.unwrap_or(false) {
        return Ok(());
    }
    fs::create_dir_all(path)
        .await
        .with_context(|| format!("failed to create directory {}", path.display()))?;
    info!("Created directory {}", path.display());
    Ok(())
}
