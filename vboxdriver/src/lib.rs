mod parse;

use async_trait::async_trait;
use pcfdev_cmd::{Command, CommandError};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument};

use crate::parse::{
    machine_value, parse_created_interface, parse_extra_data, parse_forward_port,
    parse_host_only_interfaces, parse_machine_readable, parse_vm_info, parse_vm_names,
};

const VBOXMANAGE: &str = "VBoxManage";
const NETMASK: &str = "255.255.255.0";
const STOP_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("could not find VBoxManage on PATH: {0}")]
    MissingExecutable(#[source] which::Error),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("unexpected output from `{command}`: {output}")]
    Parse { command: String, output: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmInfo {
    /// In MB.
    pub memory: u64,
    pub cpus: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostOnlyInterface {
    pub name: String,
    pub ip: String,
}

/// One method per hypervisor invocation. Failures come back untouched.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn vm_exists(&self, name: &str) -> Result<bool, DriverError>;
    async fn is_vm_running(&self, name: &str) -> Result<bool, DriverError>;
    async fn is_vm_saved(&self, name: &str) -> Result<bool, DriverError>;
    async fn running_vms(&self) -> Result<Vec<String>, DriverError>;
    async fn vms(&self) -> Result<Vec<String>, DriverError>;
    async fn import_vm(
        &self,
        path: &Path,
        name: &str,
        memory: u64,
        cpus: u32,
    ) -> Result<(), DriverError>;
    async fn start_vm(&self, name: &str) -> Result<(), DriverError>;
    async fn stop_vm(&self, name: &str) -> Result<(), DriverError>;
    async fn suspend_vm(&self, name: &str) -> Result<(), DriverError>;
    async fn power_off_vm(&self, name: &str) -> Result<(), DriverError>;
    async fn destroy_vm(&self, name: &str) -> Result<(), DriverError>;
    async fn vm_info(&self, name: &str) -> Result<VmInfo, DriverError>;
    async fn host_only_interfaces(&self) -> Result<Vec<HostOnlyInterface>, DriverError>;
    /// Creates an interface configured with `ip` and returns its name.
    async fn create_host_only_interface(&self, ip: &str) -> Result<String, DriverError>;
    async fn attach_network_interface(&self, interface: &str, name: &str)
    -> Result<(), DriverError>;
    async fn forward_port(
        &self,
        name: &str,
        rule: &str,
        host_port: u16,
        guest_port: u16,
    ) -> Result<(), DriverError>;
    async fn get_host_forward_port(&self, name: &str, rule: &str)
    -> Result<Option<u16>, DriverError>;
    async fn get_extra_data(&self, name: &str, key: &str) -> Result<Option<String>, DriverError>;
    async fn set_extra_data(&self, name: &str, key: &str, value: &str) -> Result<(), DriverError>;
}

/// [`Driver`] shelling out to `VBoxManage`.
#[derive(Debug, Clone)]
pub struct VBoxDriver {
    vboxmanage: PathBuf,
    stop_timeout: Duration,
}

impl VBoxDriver {
    pub fn new(vboxmanage: PathBuf) -> Self {
        Self {
            vboxmanage,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    /// Find `VBoxManage` on `PATH`.
    pub fn locate() -> Result<Self, DriverError> {
        let vboxmanage = which::which(VBOXMANAGE).map_err(DriverError::MissingExecutable)?;
        debug!(path = %vboxmanage.display(), "Found VBoxManage");
        Ok(Self::new(vboxmanage))
    }

    /// How long an ACPI shutdown may take before the VM is powered off hard.
    pub fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }

    async fn vboxmanage<I, S>(&self, args: I) -> Result<String, DriverError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        Ok(Command::new(&self.vboxmanage)
            .args(args)
            .run_to_string()
            .await?)
    }

    async fn machine_readable(&self, name: &str) -> Result<Vec<(String, String)>, DriverError> {
        let output = self
            .vboxmanage(["showvminfo", name, "--machinereadable"])
            .await?;
        Ok(parse_machine_readable(&output))
    }
}

#[async_trait]
impl Driver for VBoxDriver {
    async fn vm_exists(&self, name: &str) -> Result<bool, DriverError> {
        Ok(self.vms().await?.iter().any(|vm| vm == name))
    }

    async fn is_vm_running(&self, name: &str) -> Result<bool, DriverError> {
        Ok(self.running_vms().await?.iter().any(|vm| vm == name))
    }

    async fn is_vm_saved(&self, name: &str) -> Result<bool, DriverError> {
        let pairs = self.machine_readable(name).await?;
        Ok(machine_value(&pairs, "VMState") == Some("saved"))
    }

    async fn running_vms(&self) -> Result<Vec<String>, DriverError> {
        let output = self.vboxmanage(["list", "runningvms"]).await?;
        Ok(parse_vm_names(&output))
    }

    async fn vms(&self) -> Result<Vec<String>, DriverError> {
        let output = self.vboxmanage(["list", "vms"]).await?;
        Ok(parse_vm_names(&output))
    }

    #[instrument(skip(self))]
    async fn import_vm(
        &self,
        path: &Path,
        name: &str,
        memory: u64,
        cpus: u32,
    ) -> Result<(), DriverError> {
        Command::new(&self.vboxmanage)
            .arg("import")
            .arg(path)
            .args(["--vsys", "0", "--vmname", name])
            .args(["--memory", memory.to_string().as_str()])
            .args(["--cpus", cpus.to_string().as_str()])
            .run()
            .await?;
        info!("Imported VM");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn start_vm(&self, name: &str) -> Result<(), DriverError> {
        self.vboxmanage(["startvm", name, "--type", "headless"])
            .await?;
        info!("Started VM");
        Ok(())
    }

    /// ACPI shutdown, falling back to a hard power-off once the stop timeout passes.
    #[instrument(skip(self))]
    async fn stop_vm(&self, name: &str) -> Result<(), DriverError> {
        self.vboxmanage(["controlvm", name, "acpipowerbutton"])
            .await?;

        let deadline = Instant::now() + self.stop_timeout;
        while Instant::now() < deadline {
            if !self.is_vm_running(name).await? {
                info!("Stopped VM");
                return Ok(());
            }
            sleep(STOP_POLL_INTERVAL).await;
        }

        debug!("VM ignored ACPI shutdown, powering off");
        self.power_off_vm(name).await
    }

    #[instrument(skip(self))]
    async fn suspend_vm(&self, name: &str) -> Result<(), DriverError> {
        self.vboxmanage(["controlvm", name, "savestate"]).await?;
        info!("Saved VM state");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn power_off_vm(&self, name: &str) -> Result<(), DriverError> {
        self.vboxmanage(["controlvm", name, "poweroff"]).await?;
        info!("Powered off VM");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn destroy_vm(&self, name: &str) -> Result<(), DriverError> {
        self.vboxmanage(["unregistervm", name, "--delete"]).await?;
        info!("Destroyed VM");
        Ok(())
    }

    async fn vm_info(&self, name: &str) -> Result<VmInfo, DriverError> {
        let pairs = self.machine_readable(name).await?;
        parse_vm_info(&pairs).ok_or_else(|| DriverError::Parse {
            command: format!("{VBOXMANAGE} showvminfo {name} --machinereadable"),
            output: "missing memory or cpus".to_string(),
        })
    }

    async fn host_only_interfaces(&self) -> Result<Vec<HostOnlyInterface>, DriverError> {
        let output = self.vboxmanage(["list", "hostonlyifs"]).await?;
        Ok(parse_host_only_interfaces(&output))
    }

    #[instrument(skip(self))]
    async fn create_host_only_interface(&self, ip: &str) -> Result<String, DriverError> {
        let output = self.vboxmanage(["hostonlyif", "create"]).await?;
        let interface = parse_created_interface(&output).ok_or_else(|| DriverError::Parse {
            command: format!("{VBOXMANAGE} hostonlyif create"),
            output: output.clone(),
        })?;
        self.vboxmanage([
            "hostonlyif",
            "ipconfig",
            interface.as_str(),
            "--ip",
            ip,
            "--netmask",
            NETMASK,
        ])
        .await?;
        info!(interface, "Created host-only interface");
        Ok(interface)
    }

    #[instrument(skip(self))]
    async fn attach_network_interface(
        &self,
        interface: &str,
        name: &str,
    ) -> Result<(), DriverError> {
        self.vboxmanage([
            "modifyvm",
            name,
            "--nic2",
            "hostonly",
            "--hostonlyadapter2",
            interface,
        ])
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn forward_port(
        &self,
        name: &str,
        rule: &str,
        host_port: u16,
        guest_port: u16,
    ) -> Result<(), DriverError> {
        let natpf = format!("{rule},tcp,127.0.0.1,{host_port},,{guest_port}");
        self.vboxmanage(["modifyvm", name, "--natpf1", natpf.as_str()])
            .await?;
        Ok(())
    }

    async fn get_host_forward_port(
        &self,
        name: &str,
        rule: &str,
    ) -> Result<Option<u16>, DriverError> {
        let pairs = self.machine_readable(name).await?;
        Ok(parse_forward_port(&pairs, rule))
    }

    async fn get_extra_data(&self, name: &str, key: &str) -> Result<Option<String>, DriverError> {
        let output = self.vboxmanage(["getextradata", name, key]).await?;
        Ok(parse_extra_data(&output))
    }

    async fn set_extra_data(&self, name: &str, key: &str, value: &str) -> Result<(), DriverError> {
        self.vboxmanage(["setextradata", name, key, value]).await?;
        Ok(())
    }
}
