use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::domain::{
    provider::{DownloadResult, FileStream, Provider, ProviderError},
    stream::ChunkStream,
};

/// Storage provider backed by a local directory tree.
#[derive(Clone)]
pub struct FsProvider {
    root: PathBuf,
}

impl FsProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a request path onto the root, rejecting anything that would
    /// escape it.
    fn resolve(&self, path: &str) -> Result<PathBuf, ProviderError> {
        let relative = path.trim_start_matches('/');
        if relative.is_empty() {
            return Err(ProviderError::invalid_path(path));
        }

        for component in Path::new(relative).components() {
            match component {
                Component::Normal(_) => {}
                _ => return Err(ProviderError::invalid_path(path)),
            }
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Provider for FsProvider {
    async fn download(
        &self,
        path: &str,
        _accept_url: bool,
    ) -> Result<DownloadResult, ProviderError> {
        let target = self.resolve(path)?;

        let metadata = fs::metadata(&target).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ProviderError::not_found(path)
            } else {
                tracing::error!("fs metadata failed for {:?}: {}", target, e);
                ProviderError::new(500, "storage operation failed")
            }
        })?;
        if !metadata.is_file() {
            return Err(ProviderError::not_found(path));
        }

        let file = fs::File::open(&target).await.map_err(|e| {
            tracing::error!("fs open failed for {:?}: {}", target, e);
            ProviderError::new(500, "storage operation failed")
        })?;

        Ok(DownloadResult::File(FileStream {
            reader: Box::new(file),
            content_type: "application/octet-stream".to_string(),
            size: Some(metadata.len()),
        }))
    }

    async fn upload(
        &self,
        stream: ChunkStream,
        path: &str,
    ) -> Result<serde_json::Value, ProviderError> {
        let target = self.resolve(path)?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                tracing::error!("fs create_dir_all failed for {:?}: {}", parent, e);
                ProviderError::new(500, "storage operation failed")
            })?;
        }

        let mut file = fs::File::create(&target).await.map_err(|e| {
            tracing::error!("fs create failed for {:?}: {}", target, e);
            ProviderError::new(500, "storage operation failed")
        })?;

        let mut reader = stream.into_async_read();
        let size = match tokio::io::copy(&mut reader, &mut file).await {
            Ok(size) => size,
            Err(e) => {
                // Aborted or failed mid-stream; don't leave a partial file.
                drop(file);
                let _ = fs::remove_file(&target).await;
                tracing::warn!("upload to {:?} aborted: {}", target, e);
                return Err(ProviderError::new(500, "upload failed"));
            }
        };
        file.flush().await.map_err(|e| {
            tracing::error!("fs flush failed for {:?}: {}", target, e);
            ProviderError::new(500, "storage operation failed")
        })?;

        let name = path.rsplit('/').next().unwrap_or(path);
        Ok(serde_json::json!({
            "name": name,
            "path": path,
            "kind": "file",
            "size": size,
        }))
    }

    async fn delete(&self, path: &str) -> Result<(), ProviderError> {
        let target = self.resolve(path)?;

        fs::remove_file(&target).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ProviderError::not_found(path)
            } else {
                tracing::error!("fs remove failed for {:?}: {}", target, e);
                ProviderError::new(500, "storage operation failed")
            }
        })
    }

    async fn check(&self) -> Result<(), ProviderError> {
        let metadata = fs::metadata(&self.root).await.map_err(|_| {
            ProviderError::new(500, format!("root directory {:?} not accessible", self.root))
        })?;
        if !metadata.is_dir() {
            return Err(ProviderError::new(
                500,
                format!("root {:?} is not a directory", self.root),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_plain_path() {
        let provider = FsProvider::new("/data");
        let target = provider.resolve("a/b/report.csv").unwrap();
        assert_eq!(target, PathBuf::from("/data/a/b/report.csv"));
    }

    #[test]
    fn test_resolve_strips_leading_slash() {
        let provider = FsProvider::new("/data");
        let target = provider.resolve("/note.txt").unwrap();
        assert_eq!(target, PathBuf::from("/data/note.txt"));
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let provider = FsProvider::new("/data");
        assert!(provider.resolve("../etc/passwd").is_err());
        assert!(provider.resolve("a/../../etc/passwd").is_err());
    }

    #[test]
    fn test_resolve_rejects_empty() {
        let provider = FsProvider::new("/data");
        assert!(provider.resolve("").is_err());
        assert!(provider.resolve("/").is_err());
    }
}
