//! Output directory creation and mirrored writes

use std::path::{Path, PathBuf};

use futures::future::join_all;
use tokio::fs;
use tracing::debug;

use crate::error::{Result, ImgpressError};
use crate::parallel::ConcurrencyLimit;
use crate::processing::transform::EntryOutputs;

/// Create `dir` and any missing ancestors. Existing directories are left alone.
pub async fn ensure_dir(dir: &Path) -> Result<()> {
    if fs::try_exists(dir).await.unwrap_or(false) {
        return Ok(());
    }

    debug!("Creating directory {:?}", dir);
    fs::create_dir_all(dir)
        .await
        .map_err(|e| ImgpressError::write(dir.to_path_buf(), e))
}

/// Write one output buffer
pub async fn write_single_output(path: &Path, output: &[u8]) -> Result<()> {
    fs::write(path, output)
        .await
        .map_err(|e| ImgpressError::write(path.to_path_buf(), e))?;
    debug!("Wrote {:?} ({} bytes)", path, output.len());
    Ok(())
}

/// Write every output of one entry under `out_root/entry`.
///
/// All writes are started together and each runs to completion even if a
/// sibling fails; the first failure is returned afterwards.
pub async fn write_entry_outputs(
    out_root: &Path,
    entry: &EntryOutputs,
    limit: &ConcurrencyLimit,
) -> Result<Vec<PathBuf>> {
    let entry_dir = out_root.join(&entry.entry);
    ensure_dir(&entry_dir).await?;

    let results = join_all(entry.outputs.iter().map(|output| {
        let path = entry_dir.join(&output.filename);
        async move {
            let _permit = limit.acquire().await?;
            write_single_output(&path, &output.output).await?;
            Ok::<_, ImgpressError>(path)
        }
    }))
    .await;

    results.into_iter().collect()
}

/// Ensure the output root, then write all entries concurrently
pub async fn write_all(
    out_root: &Path,
    entries: &[EntryOutputs],
    limit: &ConcurrencyLimit,
) -> Result<Vec<PathBuf>> {
    ensure_dir(out_root).await?;

    let results = join_all(
        entries
            .iter()
            .map(|entry| write_entry_outputs(out_root, entry, limit)),
    )
    .await;

    let mut written = Vec::new();
    for result in results {
        written.extend(result?);
    }
    Ok(written)
}
