use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use log::{error, info};
use tokio::fs::{create_dir_all, remove_dir_all, File};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::candidate::CandidateBuild;
use crate::error::{MauiChannelError, Result};

use super::client::AzureDevOpsClient;

/// Artifacts run to hundreds of megabytes; the shared client timeout is sized for API calls.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const ARCHIVE_NAME: &str = "artifacts.zip";
const EXTRACTED_DIR: &str = "extracted";

impl AzureDevOpsClient {
    /// Downloads the named artifact of `build` and extracts it below `destination`.
    ///
    /// Returns the directory holding the extracted files. `destination` is
    /// emptied first and removed again if anything fails.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` if `cancel` fires, otherwise `Download` describing
    /// the failed step.
    pub async fn download_artifact(
        &self,
        build: &CandidateBuild,
        artifact_name: &str,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        match self
            .download_and_extract(build, artifact_name, destination, cancel)
            .await
        {
            Ok(path) => {
                info!("Artifacts extracted to {}", path.display());
                Ok(path)
            }
            Err(err) => {
                drop(remove_dir_all(destination).await);
                match err {
                    MauiChannelError::Cancelled => Err(MauiChannelError::Cancelled),
                    err @ MauiChannelError::Download(_) => Err(err),
                    err => {
                        error!("Failed to download artifacts of build {}: {err}", build.build_id);
                        Err(MauiChannelError::Download(format!(
                            "build {}: {err}",
                            build.build_id
                        )))
                    }
                }
            }
        }
    }

    async fn download_and_extract(
        &self,
        build: &CandidateBuild,
        artifact_name: &str,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        let artifact = self
            .find_artifact(build, artifact_name, cancel)
            .await?
            .ok_or_else(|| {
                MauiChannelError::Download(format!(
                    "{artifact_name} artifact not found for build {}",
                    build.build_id
                ))
            })?;

        let url = artifact.download_url().ok_or_else(|| {
            MauiChannelError::Download(format!(
                "{} artifact of build {} has no download URL",
                artifact.name, build.build_id
            ))
        })?;

        if destination.exists() {
            remove_dir_all(destination).await?;
        }
        create_dir_all(destination).await?;

        info!("Downloading {} from {url}", artifact.name);

        let request = self.auth_request(self.client.get(url).timeout(DOWNLOAD_TIMEOUT));
        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(MauiChannelError::Cancelled),
            response = request.send() => response?.error_for_status()?,
        };

        let archive_path = destination.join(ARCHIVE_NAME);
        let mut file = File::create(&archive_path).await?;
        let mut stream = response.bytes_stream();

        loop {
            let chunk = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(MauiChannelError::Cancelled),
                chunk = stream.next() => chunk,
            };

            match chunk {
                Some(bytes) => file.write_all(&bytes?).await?,
                None => break,
            }
        }
        file.flush().await?;
        drop(file);

        let extract_path = destination.join(EXTRACTED_DIR);
        let (archive, target) = (archive_path.clone(), extract_path.clone());
        tokio::task::spawn_blocking(move || extract_archive(&archive, &target))
            .await
            .map_err(|e| MauiChannelError::Download(format!("extraction task failed: {e}")))??;

        Ok(extract_path)
    }
}

fn extract_archive(archive: &Path, target: &Path) -> Result<()> {
    let file = std::fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)?;
    zip.extract(target)?;
    Ok(())
}
