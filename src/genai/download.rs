//! Artifact downloader - fetches referenced bytes and persists them to disk.
//!
//! Files are written to a hidden sibling (`.name.part`) and renamed into
//! place, so a destination path is either absent or complete.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use super::error::GenAiError;
use super::mime::mime_for_path;
use super::transport::MediaTransport;
use super::types::{MediaAsset, MediaReference};

/// Fetch `reference` through `transport` and write it to `destination`.
///
/// Missing parent directories are created. The MIME type of the returned
/// asset is inferred from the destination extension.
///
/// # Errors
///
/// Returns `GenAiError::Download` wrapping the transport's error unmodified
/// if the fetch fails, or `GenAiError::Io` if writing fails.
pub async fn download(
    reference: &MediaReference,
    transport: &dyn MediaTransport,
    destination: &Path,
) -> Result<MediaAsset, GenAiError> {
    let bytes = transport
        .fetch_bytes(reference)
        .await
        .map_err(|source| GenAiError::Download {
            path: destination.to_path_buf(),
            source: Box::new(source),
        })?;

    write_asset(destination, &bytes, mime_for_path(destination)).await
}

/// Atomically write `bytes` to `destination` and describe the result.
pub async fn write_asset(
    destination: &Path,
    bytes: &[u8],
    mime_type: &str,
) -> Result<MediaAsset, GenAiError> {
    write_atomic(destination, bytes).await?;
    log::info!("Wrote {} bytes to {}", bytes.len(), destination.display());
    Ok(MediaAsset::new(destination.to_path_buf(), mime_type))
}

/// Write to a temporary sibling, then rename over `destination`.
pub async fn write_atomic(destination: &Path, bytes: &[u8]) -> Result<(), GenAiError> {
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let temp = partial_path(destination);
    let written = async {
        let mut file = tokio::fs::File::create(&temp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&temp, destination).await
    }
    .await;

    if let Err(error) = written {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(error.into());
    }
    Ok(())
}

fn partial_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());
    destination.with_file_name(format!(".{}.part", name))
}
