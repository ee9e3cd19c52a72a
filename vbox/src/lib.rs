mod network;
#[cfg(test)]
mod testing;

pub use crate::network::{GUEST_SSH_PORT, SSH_RULE, network_command};

use async_trait::async_trait;
use pcfdev_config::{Config, DEFAULT_IP, PROVIDER, VM_NAME_PREFIX, VmConfig, domain_for_ip};
use pcfdev_fs::{Fs, FsError};
use pcfdev_ssh::{LOOPBACK, SshAddress, SshClient, SshError};
use pcfdev_vboxdriver::{Driver, DriverError};
use std::{fmt::Display, path::Path, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::network::{authorize_key_command, host_ip_for};

const IP_KEY: &str = "pcfdev/ip";
const DOMAIN_KEY: &str = "pcfdev/domain";
const FIRST_BOOT_TIMEOUT: Duration = Duration::from_secs(2 * 60);

#[derive(Error, Debug)]
pub enum VBoxError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Ssh(#[from] SshError),

    #[error(transparent)]
    Fs(#[from] FsError),

    #[error("VM {name} has no forwarded SSH port")]
    MissingForwardPort { name: String },

    #[error("invalid IPv4 address: {ip}")]
    InvalidIp { ip: String },
}

/// Result of powering a VM on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedVm {
    pub name: String,
    pub ssh_port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmStatus {
    Running,
    Stopped,
    NotCreated,
}

impl Display for VmStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VmStatus::Running => write!(f, "Running"),
            VmStatus::Stopped => write!(f, "Stopped"),
            VmStatus::NotCreated => write!(f, "Not created"),
        }
    }
}

/// VM lifecycle operations built from driver primitives.
#[async_trait]
pub trait Hypervisor: Send + Sync {
    async fn import_vm(&self, image_path: &Path, vm_config: &VmConfig) -> Result<(), VBoxError>;
    async fn start_vm(&self, vm_config: &VmConfig) -> Result<StartedVm, VBoxError>;
    async fn stop_vm(&self, name: &str) -> Result<(), VBoxError>;
    async fn suspend_vm(&self, name: &str) -> Result<(), VBoxError>;
    async fn resume_vm(&self, vm_config: &VmConfig) -> Result<(), VBoxError>;
    async fn destroy_vms(&self, names: &[String]) -> Result<(), VBoxError>;
    async fn status(&self, name: &str) -> Result<VmStatus, VBoxError>;
    async fn is_suspended(&self, name: &str) -> Result<bool, VBoxError>;
    async fn conflicting_vm_present(&self, name: &str) -> Result<bool, VBoxError>;
    async fn get_pcfdev_vms(&self) -> Result<Vec<String>, VBoxError>;
    async fn vm_config(&self, name: &str) -> Result<VmConfig, VBoxError>;
}

pub struct VBox {
    driver: Arc<dyn Driver>,
    ssh: Arc<dyn SshClient>,
    fs: Arc<dyn Fs>,
    config: Arc<Config>,
}

impl VBox {
    pub fn new(
        driver: Arc<dyn Driver>,
        ssh: Arc<dyn SshClient>,
        fs: Arc<dyn Fs>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            driver,
            ssh,
            fs,
            config,
        }
    }

    /// One-off guest setup over the appliance's insecure key: static IP on the
    /// host-only NIC, then swap in a freshly generated operator key.
    #[instrument(skip(self, vm_config), fields(name = %vm_config.name))]
    async fn configure_guest(&self, vm_config: &VmConfig, ssh_port: u16) -> Result<(), VBoxError> {
        let insecure_key = self.fs.read(&self.config.insecure_private_key_path).await?;
        let addresses = [SshAddress::new(LOOPBACK, ssh_port)];

        let output = self
            .ssh
            .get_ssh_output(
                &network_command(&vm_config.ip),
                &addresses,
                &insecure_key,
                FIRST_BOOT_TIMEOUT,
            )
            .await?;
        debug!(%output, "Configured guest network");

        let keypair = self.ssh.generate_keypair()?;
        let public_key = String::from_utf8_lossy(&keypair.public_key);
        self.ssh
            .get_ssh_output(
                &authorize_key_command(public_key.trim()),
                &addresses,
                &insecure_key,
                FIRST_BOOT_TIMEOUT,
            )
            .await?;
        self.fs
            .write_private(&self.config.private_key_path, &keypair.private_key)
            .await?;

        info!("Configured guest on first boot");
        Ok(())
    }
}

#[async_trait]
impl Hypervisor for VBox {
    /// Steps run strictly in order and the first failure is returned as is:
    /// allocate host port, import, find or create host-only interface, attach
    /// it, forward the port.
    #[instrument(skip(self, vm_config), fields(name = %vm_config.name))]
    async fn import_vm(&self, image_path: &Path, vm_config: &VmConfig) -> Result<(), VBoxError> {
        let name = vm_config.name.as_str();
        let host_ip = host_ip_for(&vm_config.ip)?;

        let address = self.ssh.generate_address()?;

        self.driver
            .import_vm(image_path, name, vm_config.memory, vm_config.cpus)
            .await?;

        let existing = self
            .driver
            .host_only_interfaces()
            .await?
            .into_iter()
            .find(|interface| interface.ip == host_ip);
        let interface = match existing {
            Some(interface) => {
                debug!(interface = %interface.name, "Reusing host-only interface");
                interface.name
            }
            None => self.driver.create_host_only_interface(&host_ip).await?,
        };

        self.driver.attach_network_interface(&interface, name).await?;
        self.driver
            .forward_port(name, SSH_RULE, address.port, GUEST_SSH_PORT)
            .await?;

        info!(ssh_port = address.port, "Imported VM");
        Ok(())
    }

    /// First boot is recognised by the missing IP marker; it configures the
    /// guest and power-cycles it before recording the marker.
    #[instrument(skip(self, vm_config), fields(name = %vm_config.name))]
    async fn start_vm(&self, vm_config: &VmConfig) -> Result<StartedVm, VBoxError> {
        let name = vm_config.name.as_str();

        let ssh_port = self
            .driver
            .get_host_forward_port(name, SSH_RULE)
            .await?
            .ok_or_else(|| VBoxError::MissingForwardPort {
                name: name.to_string(),
            })?;
        let first_boot = self.driver.get_extra_data(name, IP_KEY).await?.is_none();

        self.driver.start_vm(name).await?;

        if first_boot {
            self.configure_guest(vm_config, ssh_port).await?;
            self.driver.stop_vm(name).await?;
            self.driver.start_vm(name).await?;
            self.driver
                .set_extra_data(name, IP_KEY, &vm_config.ip)
                .await?;
            self.driver
                .set_extra_data(name, DOMAIN_KEY, &vm_config.domain)
                .await?;
        }

        Ok(StartedVm {
            name: name.to_string(),
            ssh_port,
        })
    }

    async fn stop_vm(&self, name: &str) -> Result<(), VBoxError> {
        Ok(self.driver.stop_vm(name).await?)
    }

    async fn suspend_vm(&self, name: &str) -> Result<(), VBoxError> {
        Ok(self.driver.suspend_vm(name).await?)
    }

    /// Starting a saved VM restores its snapshot.
    async fn resume_vm(&self, vm_config: &VmConfig) -> Result<(), VBoxError> {
        Ok(self.driver.start_vm(&vm_config.name).await?)
    }

    #[instrument(skip(self))]
    async fn destroy_vms(&self, names: &[String]) -> Result<(), VBoxError> {
        for name in names {
            if !self.driver.vm_exists(name).await? {
                continue;
            }
            if self.driver.is_vm_running(name).await? {
                self.driver.power_off_vm(name).await?;
            }
            self.driver.destroy_vm(name).await?;
        }
        Ok(())
    }

    async fn status(&self, name: &str) -> Result<VmStatus, VBoxError> {
        if !self.driver.vm_exists(name).await? {
            return Ok(VmStatus::NotCreated);
        }
        if self.driver.is_vm_running(name).await? {
            return Ok(VmStatus::Running);
        }
        Ok(VmStatus::Stopped)
    }

    async fn is_suspended(&self, name: &str) -> Result<bool, VBoxError> {
        Ok(self.driver.is_vm_saved(name).await?)
    }

    async fn conflicting_vm_present(&self, name: &str) -> Result<bool, VBoxError> {
        Ok(self
            .get_pcfdev_vms()
            .await?
            .iter()
            .any(|vm| vm != name))
    }

    async fn get_pcfdev_vms(&self) -> Result<Vec<String>, VBoxError> {
        Ok(self
            .driver
            .vms()
            .await?
            .into_iter()
            .filter(|vm| vm.starts_with(VM_NAME_PREFIX))
            .collect())
    }

    async fn vm_config(&self, name: &str) -> Result<VmConfig, VBoxError> {
        let info = self.driver.vm_info(name).await?;
        let ssh_port = self.driver.get_host_forward_port(name, SSH_RULE).await?;
        let ip = self
            .driver
            .get_extra_data(name, IP_KEY)
            .await?
            .unwrap_or_else(|| DEFAULT_IP.to_string());
        let domain = match self.driver.get_extra_data(name, DOMAIN_KEY).await? {
            Some(domain) => domain,
            None => domain_for_ip(&ip),
        };
        Ok(VmConfig {
            name: name.to_string(),
            domain,
            ip,
            ssh_port,
            memory: info.memory,
            cpus: info.cpus,
            provider: PROVIDER.to_string(),
        })
    }
}
