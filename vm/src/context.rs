use pcfdev_config::{Config, VmConfig};
use pcfdev_fs::Fs;
use pcfdev_ssh::{LOOPBACK, SshAddress, SshClient};
use pcfdev_vbox::{GUEST_SSH_PORT, Hypervisor};
use std::sync::Arc;
use std::time::Duration;

use crate::{CertStore, CmdRunner, LogFetcher, Ui, VmError};

pub(crate) const SSH_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub(crate) const HEALTHCHECK_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything a VM variant talks to.
pub struct VmContext {
    pub config: Arc<Config>,
    pub hypervisor: Arc<dyn Hypervisor>,
    pub ssh: Arc<dyn SshClient>,
    pub fs: Arc<dyn Fs>,
    pub ui: Arc<dyn Ui>,
    pub cert_store: Arc<dyn CertStore>,
    pub log_fetcher: Arc<dyn LogFetcher>,
    pub cmd_runner: Arc<dyn CmdRunner>,
}

impl VmContext {
    pub(crate) async fn read_private_key(&self) -> Result<Vec<u8>, VmError> {
        Ok(self.fs.read(&self.config.private_key_path).await?)
    }

    /// Asks before going ahead when the host looks short on memory.
    pub(crate) fn confirm_free_memory(&self, memory: u64) -> Result<(), VmError> {
        if memory <= self.config.free_memory {
            return Ok(());
        }
        let message =
            format!("Less than {memory} MB of free memory detected, continue (y/N): ");
        if self.ui.confirm(&message) {
            Ok(())
        } else {
            Err(VmError::UserDeclined)
        }
    }
}

/// Forwarded loopback port first, then the guest's own address.
pub fn ssh_addresses(vm_config: &VmConfig) -> Vec<SshAddress> {
    let mut addresses = Vec::with_capacity(2);
    if let Some(port) = vm_config.ssh_port {
        addresses.push(SshAddress::new(LOOPBACK, port));
    }
    addresses.push(SshAddress::new(vm_config.ip.as_str(), GUEST_SSH_PORT));
    addresses
}
