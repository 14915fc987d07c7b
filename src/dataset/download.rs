//! Dataset download

use std::path::Path;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::BenchError;
use crate::http::{check_response, create_client};

/// Make sure `path` exists, downloading `link` into it when it does not
pub async fn ensure_dataset(path: &Path, link: Option<&str>) -> anyhow::Result<()> {
    if path.exists() {
        return Ok(());
    }
    match link {
        Some(url) => download(url, path).await,
        None => Err(BenchError::MissingDataset(path.to_path_buf()).into()),
    }
}

/// Stream `url` to `dest`, via a `.part` file renamed on success
pub async fn download(url: &str, dest: &Path) -> anyhow::Result<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    info!("Downloading {} to {:?}", url, dest);

    let client = create_client()?;
    let mut response = check_response(client.get(url).send().await?, "download").await?;

    let progress = match response.content_length() {
        Some(len) => {
            let bar = ProgressBar::new(len);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
                    .progress_chars("#>-"),
            );
            bar
        }
        None => ProgressBar::new_spinner(),
    };

    let part = dest.with_extension("part");
    let mut file = File::create(&part)
        .await
        .with_context(|| format!("Failed to create {:?}", part))?;

    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        progress.inc(chunk.len() as u64);
    }
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&part, dest).await?;
    progress.finish_with_message("Download complete");

    info!("Downloaded {} bytes to {:?}", progress.position(), dest);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_existing_file_is_not_downloaded() {
        let file = tempfile::NamedTempFile::new().unwrap();
        ensure_dataset(file.path(), Some("http://invalid.invalid/data.json"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_without_link() {
        let dir = tempfile::tempdir().unwrap();
        let err = ensure_dataset(&dir.path().join("absent.json"), None)
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<BenchError>().is_some());
    }
}
