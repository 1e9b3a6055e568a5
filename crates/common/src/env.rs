//! Environment/runtime helpers
//!
//! Sanity checks run at startup before the store is touched.

use std::path::Path;

use tracing::{info, warn};

/// Make sure the parent directory of the local store snapshot exists.
/// `None` means the store runs purely in memory and nothing is checked.
pub async fn ensure_data_dir(data_file: Option<&str>) -> anyhow::Result<()> {
    let Some(file) = data_file else {
        warn!("no store data file configured; documents live in memory only");
        return Ok(());
    };
    let parent = match Path::new(file).parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => return Ok(()),
    };
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {}: {e}", parent.display()))?;
    info!(data_file = %file, "store snapshot directory ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_missing_parent() -> anyhow::Result<()> {
        let dir = std::env::temp_dir().join(format!("petcare_env_{}", std::process::id()));
        let file = dir.join("nested").join("store.json");
        ensure_data_dir(file.to_str()).await?;
        assert!(dir.join("nested").is_dir());
        let _ = tokio::fs::remove_dir_all(&dir).await;
        Ok(())
    }

    #[tokio::test]
    async fn none_is_ok() -> anyhow::Result<()> {
        ensure_data_dir(None).await
    }
}
