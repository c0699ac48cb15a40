use std::path::{Path, PathBuf};

/// Directory holding uploaded images until they are pushed to the asset host.
///
/// Shared by every request in the process. Nothing ties a staged file to the
/// request that wrote it, so concurrent uploads with the same id overwrite each other.
#[derive(Debug, Clone)]
pub struct StagingDir {
    root: PathBuf,
}

impl StagingDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub async fn ensure(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Writes `bytes` as `<name>.<ext>` (or just `<name>` without an extension).
    pub async fn stage(&self, name: &str, ext: Option<&str>, bytes: &[u8]) -> std::io::Result<PathBuf> {
        let file_name = match ext {
            Some(ext) if !ext.is_empty() => format!("{}.{}", name, ext),
            _ => name.to_string(),
        };
        let path = self.root.join(sanitize(&file_name));

        self.ensure().await?;
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!("Staged {}", path.display());
        Ok(path)
    }

    /// First staged file whose name contains `image_id`.
    pub async fn find(&self, image_id: &str) -> std::io::Result<Option<PathBuf>> {
        if image_id.is_empty() {
            return Ok(None);
        }

        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().contains(image_id) {
                return Ok(Some(entry.path()));
            }
        }
        Ok(None)
    }

    /// Deletes every staged file. Returns how many were removed.
    pub async fn clear(&self) -> std::io::Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Keeps only the final path component so names cannot escape the staging root.
fn sanitize(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    match base {
        "" | "." | ".." => "upload".to_string(),
        other => other.to_string(),
    }
}
