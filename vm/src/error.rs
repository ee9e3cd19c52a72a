use pcfdev_cmd::CommandError;
use pcfdev_fs::FsError;
use pcfdev_ssh::SshError;
use pcfdev_vbox::VBoxError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VmError {
    #[error("failed to start VM: {0}")]
    StartVm(#[source] Box<VmError>),

    #[error("failed to stop VM: {0}")]
    StopVm(#[source] Box<VmError>),

    #[error("failed to suspend VM: {0}")]
    SuspendVm(#[source] Box<VmError>),

    #[error("failed to resume VM: {0}")]
    ResumeVm(#[source] Box<VmError>),

    #[error("failed to import VM: {0}")]
    ImportVm(#[source] Box<VmError>),

    #[error("failed to provision VM: {0}")]
    ProvisionVm(#[source] Box<VmError>),

    #[error("failed to trust VM certificates: {0}")]
    Trust(#[source] Box<VmError>),

    #[error("failed to target PCF Dev: {0}")]
    Target(#[source] Box<VmError>),

    #[error("failed to retrieve logs: {0}")]
    FetchLogs(#[source] Box<VmError>),

    #[error("memory cannot be changed once the vm has been created")]
    MemoryChanged,

    #[error("cores cannot be changed once the vm has been created")]
    CoresChanged,

    #[error("services cannot be changed once the vm has been created")]
    ServicesChanged,

    #[error("the -d flag cannot be used if the VM has already been created")]
    DomainChanged,

    #[error("the -i flag cannot be used if the VM has already been created")]
    IpChanged,

    #[error("private registries cannot be changed once the vm has been created")]
    RegistriesChanged,

    #[error("PCF Dev requires at least {minimum} MB of memory to run, {requested} MB requested")]
    InsufficientMemory { requested: u64, minimum: u64 },

    #[error("user declined to continue, exiting")]
    UserDeclined,

    #[error("Old version of PCF Dev detected. You must run `pcfdev destroy` to continue.")]
    OldVmPresent,

    #[error("failed to encode provision options: {0}")]
    ProvisionOptions(#[source] serde_json::Error),

    #[error(transparent)]
    VBox(#[from] VBoxError),

    #[error(transparent)]
    Ssh(#[from] SshError),

    #[error(transparent)]
    Fs(#[from] FsError),

    #[error(transparent)]
    Command(#[from] CommandError),
}

impl VmError {
    pub fn start_vm(error: impl Into<VmError>) -> Self {
        Self::StartVm(Box::new(error.into()))
    }

    pub fn stop_vm(error: impl Into<VmError>) -> Self {
        Self::StopVm(Box::new(error.into()))
    }

    pub fn suspend_vm(error: impl Into<VmError>) -> Self {
        Self::SuspendVm(Box::new(error.into()))
    }

    pub fn resume_vm(error: impl Into<VmError>) -> Self {
        Self::ResumeVm(Box::new(error.into()))
    }

    pub fn import_vm(error: impl Into<VmError>) -> Self {
        Self::ImportVm(Box::new(error.into()))
    }

    pub fn provision_vm(error: impl Into<VmError>) -> Self {
        Self::ProvisionVm(Box::new(error.into()))
    }

    pub fn trust(error: impl Into<VmError>) -> Self {
        Self::Trust(Box::new(error.into()))
    }

    pub fn target(error: impl Into<VmError>) -> Self {
        Self::Target(Box::new(error.into()))
    }

    pub fn fetch_logs(error: impl Into<VmError>) -> Self {
        Self::FetchLogs(Box::new(error.into()))
    }
}
