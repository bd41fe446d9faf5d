//! Where downloaded report files end up.

use std::future::Future;
use std::io;
use std::path::PathBuf;

use crate::types::DownloadedFile;

/// Saves downloaded files to the user's device.
pub trait FileSink: Send + Sync + 'static {
    /// Persist `file`, returning where it was written.
    fn save(&self, file: &DownloadedFile) -> impl Future<Output = io::Result<PathBuf>> + Send;
}

/// Writes files into a directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }
}

impl FileSink for DirectorySink {
    async fn save(&self, file: &DownloadedFile) -> io::Result<PathBuf> {
        let name = std::path::Path::new(&file.filename)
            .file_name()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("invalid file name: {:?}", file.filename),
                )
            })?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(name);
        tokio::fs::write(&path, &file.bytes).await?;

        tracing::info!("Saved {}", path.display());
        Ok(path)
    }
}
