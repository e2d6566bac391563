// crates/network/src/download.rs
//! File downloads

use crate::client::Client;
use crate::error::{NetworkError, NetworkResult};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Download manager
#[derive(Clone)]
pub struct DownloadManager {
    client: Client,
}

impl DownloadManager {
    /// Creates a new download manager
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Streams a URL into a file, returning the number of bytes written
    pub async fn download_file(&self, url: &str, destination: impl AsRef<Path>) -> NetworkResult<u64> {
        let response = self.client.get(url).await?;

        let mut file = File::create(destination.as_ref()).await?;
        let mut stream = response.bytes_stream();
        let mut total_downloaded = 0u64;

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(NetworkError::Http)?;
            file.write_all(&chunk).await?;
            total_downloaded += chunk.len() as u64;
        }

        file.flush().await?;
        file.sync_all().await?;
        Ok(total_downloaded)
    }

    /// Downloads to a uniquely named `.part` file next to `destination` and
    /// renames it into place once complete
    ///
    /// `destination` is never left holding a truncated file. An empty body is
    /// treated as a failed download.
    pub async fn download_file_atomic(
        &self,
        url: &str,
        destination: impl AsRef<Path>,
    ) -> NetworkResult<u64> {
        let destination = destination.as_ref();
        let partial = partial_path(destination);

        let result = self.download_file(url, &partial).await;
        let bytes = match result {
            Ok(0) => Err(NetworkError::DownloadFailed(format!("{} returned no data", url))),
            other => other,
        };

        match bytes {
            Ok(bytes) => {
                tokio::fs::rename(&partial, destination).await?;
                log::debug!("Downloaded {} bytes to {}", bytes, destination.display());
                Ok(bytes)
            }
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        log::warn!("Could not remove {}: {}", partial.display(), cleanup);
                    }
                }
                Err(e)
            }
        }
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "download".to_string());
    destination.with_file_name(format!(".{}.{}.part", name, uuid::Uuid::new_v4()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_path_is_hidden_sibling() {
        let part = partial_path(Path::new("/data/tunes/hymn_1.mp3"));
        assert_eq!(part.parent(), Some(Path::new("/data/tunes")));

        let name = part.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(".hymn_1.mp3."));
        assert!(name.ends_with(".part"));
    }

    #[test]
    fn test_partial_paths_are_unique() {
        let dest = Path::new("/tmp/a.mp3");
        assert_ne!(partial_path(dest), partial_path(dest));
    }
}
