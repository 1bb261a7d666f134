//! Source directory scanning and reading

use std::path::{Path, PathBuf};

use futures::future::try_join_all;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{Result, ImgpressError};
use crate::parallel::ConcurrencyLimit;
use crate::processing::formats::is_supported_ext;

/// Raw bytes of one source image
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Entry directory this file came from
    pub origin_entry: String,
    pub origin_path: PathBuf,
    pub filename: String,
    pub source: Vec<u8>,
}

/// Every readable source image of one entry directory
#[derive(Debug, Clone)]
pub struct EntryFiles {
    pub entry: String,
    pub files: Vec<SourceFile>,
}

/// List the supported image filenames directly inside `dir`, sorted.
pub async fn list_supported_files(dir: &Path, entry: &str) -> Result<Vec<String>> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| ImgpressError::read_entry(entry, e))?;

    let mut filenames = Vec::new();
    while let Some(dir_entry) = entries
        .next_entry()
        .await
        .map_err(|e| ImgpressError::read_entry(entry, e))?
    {
        let Ok(filename) = dir_entry.file_name().into_string() else {
            warn!("Skipping non UTF-8 filename in {:?}", dir);
            continue;
        };

        if !is_supported_ext(&filename) {
            continue;
        }

        // follows symlinks; a dangling link is an unreadable file
        let path = dir_entry.path();
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| ImgpressError::read(path.clone(), e))?;
        if !metadata.is_file() {
            debug!("Skipping {:?}: not a regular file", path);
            continue;
        }

        filenames.push(filename);
    }

    filenames.sort();
    Ok(filenames)
}

/// Read every supported image of one entry directory.
///
/// All-or-nothing: one unreadable file fails the whole entry.
pub async fn read_entry(
    base_dir: &Path,
    entry: &str,
    limit: &ConcurrencyLimit,
) -> Result<EntryFiles> {
    let dir = base_dir.join(entry);
    let filenames = list_supported_files(&dir, entry).await?;

    debug!("Entry '{}': {} supported files", entry, filenames.len());

    let files = try_join_all(filenames.into_iter().map(|filename| {
        let origin_path = dir.join(&filename);
        async move {
            let _permit = limit.acquire().await?;
            let source = fs::read(&origin_path)
                .await
                .map_err(|e| ImgpressError::read(origin_path.clone(), e))?;

            Ok::<_, ImgpressError>(SourceFile {
                origin_entry: entry.to_string(),
                origin_path,
                filename,
                source,
            })
        }
    }))
    .await?;

    Ok(EntryFiles {
        entry: entry.to_string(),
        files,
    })
}

/// Read all entries concurrently, preserving entry order.
pub async fn read_entry_list(
    base_dir: &Path,
    entries: &[String],
    limit: &ConcurrencyLimit,
) -> Result<Vec<EntryFiles>> {
    let resolved = try_join_all(
        entries
            .iter()
            .map(|entry| read_entry(base_dir, entry, limit)),
    )
    .await?;

    let total: usize = resolved.iter().map(|e| e.files.len()).sum();
    info!("Read {} files from {} entries", total, resolved.len());

    Ok(resolved)
}
