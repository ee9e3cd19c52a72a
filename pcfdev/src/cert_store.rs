use async_trait::async_trait;
use pcfdev_config::Config;
use pcfdev_fs::Fs;
use pcfdev_vm::{CertStore, VmError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

const CA_FILE: &str = "ca.pem";

/// Keeps the VM's CA certificate as a PEM file for the user's tools to pick up.
pub struct PemCertStore {
    fs: Arc<dyn Fs>,
    path: PathBuf,
}

impl PemCertStore {
    pub fn new(fs: Arc<dyn Fs>, path: PathBuf) -> Self {
        Self { fs, path }
    }

    pub fn default_path(config: &Config) -> PathBuf {
        config.home_dir.join(CA_FILE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CertStore for PemCertStore {
    async fn store(&self, pem: &str) -> Result<(), VmError> {
        self.fs.write_private(&self.path, pem.as_bytes()).await?;
        info!(path = %self.path.display(), "Stored CA certificate");
        Ok(())
    }
}
