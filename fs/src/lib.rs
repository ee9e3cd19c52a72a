use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[derive(Error, Debug)]
pub enum FsError {
    #[error("Cannot create directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot create file '{path}': {source}")]
    CreateFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot set permissions on '{path}': {source}")]
    SetPermissions {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// File access handed to code which must stay testable without touching disk.
#[async_trait]
pub trait Fs: Send + Sync {
    async fn read(&self, path: &Path) -> Result<Vec<u8>, FsError>;

    /// Write `data`, creating parent directories, readable only by the owner.
    async fn write_private(&self, path: &Path, data: &[u8]) -> Result<(), FsError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

#[async_trait]
impl Fs for LocalFs {
    async fn read(&self, path: &Path) -> Result<Vec<u8>, FsError> {
        read_file(path).await
    }

    async fn write_private(&self, path: &Path, data: &[u8]) -> Result<(), FsError> {
        if let Some(parent) = path.parent() {
            create_dir(parent).await?;
        }
        write_file(path, data).await?;
        // Creation already uses 0600; this covers a file that existed before.
        set_private_mode(path).await
    }
}

async fn create_dir<P: AsRef<Path>>(path: P) -> Result<(), FsError> {
    let p = path.as_ref();
    fs::create_dir_all(p)
        .await
        .map_err(|source| FsError::CreateDir {
            path: p.to_path_buf(),
            source,
        })
}

/// New files start out owner-only, so the contents are never world readable.
async fn create_file<P: AsRef<Path>>(path: P) -> Result<tokio::fs::File, FsError> {
    let p = path.as_ref();
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    options
        .open(p)
        .await
        .map_err(|source| FsError::CreateFile {
            path: p.to_path_buf(),
            source,
        })
}

async fn write_file<P: AsRef<Path>>(path: P, data: &[u8]) -> Result<(), FsError> {
    let p = path.as_ref();
    let mut file = create_file(p).await?;
    file.write_all(data)
        .await
        .map_err(|source| FsError::WriteFile {
            path: p.to_path_buf(),
            source,
        })?;
    file.flush().await.map_err(|source| FsError::WriteFile {
        path: p.to_path_buf(),
        source,
    })?;
    debug!(path = %p.display(), bytes = data.len(), "Wrote file");
    Ok(())
}

async fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, FsError> {
    let p = path.as_ref();
    fs::read(p).await.map_err(|source| FsError::ReadFile {
        path: p.to_path_buf(),
        source,
    })
}

#[cfg(unix)]
async fn set_private_mode<P: AsRef<Path>>(path: P) -> Result<(), FsError> {
    use std::os::unix::fs::PermissionsExt;

    let p = path.as_ref();
    fs::set_permissions(p, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(|source| FsError::SetPermissions {
            path: p.to_path_buf(),
            source,
        })
}

#[cfg(not(unix))]
async fn set_private_mode<P: AsRef<Path>>(_path: P) -> Result<(), FsError> {
    Ok(())
}
