/// Media storage for avatars and cover images
///
/// The core only depends on the [`MediaStore`] trait: hand it a staged
/// local file, get back a public URL or `None` on upload failure. The disk
/// backend moves staged files into the served media directory; an
/// object-storage backend would slot in behind the same trait.
use crate::error::ApiResult;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Upload a staged local file, returning its public URL.
    /// Returns `Ok(None)` when the upload fails; the staged file is
    /// removed either way.
    async fn upload(&self, local_path: &Path) -> ApiResult<Option<String>>;
}

/// Disk-backed media store serving files from a local directory
pub struct DiskMediaStore {
    media_directory: PathBuf,
    public_base_url: String,
}

impl DiskMediaStore {
    pub fn new(media_directory: PathBuf, public_base_url: String) -> Self {
        Self {
            media_directory,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn store_file(&self, local_path: &Path) -> std::io::Result<String> {
        tokio::fs::create_dir_all(&self.media_directory).await?;

        let extension = local_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let name = format!("{}.{}", Uuid::new_v4(), extension);

        // Rename fails across filesystems, so copy then delete
        tokio::fs::copy(local_path, self.media_directory.join(&name)).await?;

        Ok(format!("{}/media/{}", self.public_base_url, name))
    }
}

#[async_trait]
impl MediaStore for DiskMediaStore {
    async fn upload(&self, local_path: &Path) -> ApiResult<Option<String>> {
        let stored = self.store_file(local_path).await;

        // The staged file is consumed by the upload attempt regardless of
        // outcome, so a failed request leaves nothing behind in tmp
        if let Err(e) = tokio::fs::remove_file(local_path).await {
            tracing::debug!("Failed to remove staged file {:?}: {}", local_path, e);
        }

        match stored {
            Ok(url) => Ok(Some(url)),
            Err(e) => {
                tracing::warn!("Media upload failed for {:?}: {}", local_path, e);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_upload_moves_file_and_returns_url() {
        let staging = tempdir().unwrap();
        let media = tempdir().unwrap();

        let staged = staging.path().join("avatar.png");
        tokio::fs::write(&staged, b"png bytes").await.unwrap();

        let store = DiskMediaStore::new(
            media.path().to_path_buf(),
            "http://localhost:8080/".to_string(),
        );

        let url = store.upload(&staged).await.unwrap().unwrap();
        assert!(url.starts_with("http://localhost:8080/media/"));
        assert!(url.ends_with(".png"));

        // Staged file is gone, stored file exists
        assert!(!staged.exists());
        let stored_name = url.rsplit('/').next().unwrap();
        assert!(media.path().join(stored_name).exists());
    }

    #[tokio::test]
    async fn test_upload_missing_file_is_soft_failure() {
        let media = tempdir().unwrap();
        let store = DiskMediaStore::new(
            media.path().to_path_buf(),
            "http://localhost:8080".to_string(),
        );

        let result = store
            .upload(Path::new("/nonexistent/file.png"))
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
