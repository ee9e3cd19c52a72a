//! Recording fakes for every collaborator, all writing to one ordered log.

use async_trait::async_trait;
use pcfdev_config::{Config, VmConfig};
use pcfdev_fs::{Fs, FsError};
use pcfdev_ssh::{Sink, SshAddress, SshClient, SshError, SshKeypair, Stdin};
use pcfdev_vbox::{Hypervisor, StartedVm, VBoxError, VmStatus};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::{CertStore, CmdRunner, LogFetcher, StartOpts, Ui, Vm, VmBuilder, VmContext, VmError};

pub const PRIVATE_KEY_PATH: &str = "/some/home/key.pem";
/// How the fakes print the default fixture's addresses and key.
pub const TARGETS: &str = "[127.0.0.1:50022, 192.168.11.11:22] some-private-key";

#[derive(Default)]
struct LogInner {
    entries: Mutex<Vec<String>>,
    failures: Mutex<Vec<String>>,
}

#[derive(Clone, Default)]
pub struct Log(Arc<LogInner>);

impl Log {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.entries.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.entries.lock().unwrap().clone()
    }

    /// Make every later call to `step` fail with "some-error".
    pub fn fail_on(&self, step: &str) {
        self.0.failures.lock().unwrap().push(step.to_string());
    }

    fn fails(&self, step: &str) -> bool {
        self.0.failures.lock().unwrap().iter().any(|s| s == step)
    }
}

pub fn some_error() -> SshError {
    SshError::Io(io::Error::other("some-error"))
}

fn describe(addresses: &[SshAddress], private_key: &[u8], timeout: Duration) -> String {
    let addresses: Vec<String> = addresses.iter().map(ToString::to_string).collect();
    format!(
        "[{}] {} {timeout:?}",
        addresses.join(", "),
        String::from_utf8_lossy(private_key)
    )
}

pub fn vm_config() -> VmConfig {
    VmConfig {
        name: "some-vm".into(),
        domain: "some-domain".into(),
        ip: "192.168.11.11".into(),
        ssh_port: Some(50022),
        memory: 4096,
        cpus: 2,
        provider: "virtualbox".into(),
    }
}

pub struct FakeHypervisor {
    log: Log,
    statuses: Mutex<HashMap<String, VmStatus>>,
    suspended: Mutex<Vec<String>>,
    conflicting: AtomicBool,
}

impl FakeHypervisor {
    pub fn set_status(&self, name: &str, status: VmStatus) {
        self.statuses.lock().unwrap().insert(name.into(), status);
    }

    pub fn set_suspended(&self, name: &str) {
        self.suspended.lock().unwrap().push(name.into());
    }

    pub fn set_conflicting(&self) {
        self.conflicting.store(true, Ordering::SeqCst);
    }

    fn record(&self, step: &str, args: &str) -> Result<(), VBoxError> {
        self.log.push(format!("hypervisor.{step} {args}"));
        if self.log.fails(&format!("hypervisor.{step}")) {
            return Err(VBoxError::Ssh(some_error()));
        }
        Ok(())
    }
}

#[async_trait]
impl Hypervisor for FakeHypervisor {
    async fn import_vm(&self, image_path: &Path, vm_config: &VmConfig) -> Result<(), VBoxError> {
        self.record(
            "import_vm",
            &format!(
                "{} {} {} {} {} {}",
                image_path.display(),
                vm_config.name,
                vm_config.memory,
                vm_config.cpus,
                vm_config.ip,
                vm_config.domain
            ),
        )
    }

    async fn start_vm(&self, vm_config: &VmConfig) -> Result<StartedVm, VBoxError> {
        self.record("start_vm", &vm_config.name)?;
        Ok(StartedVm {
            name: vm_config.name.clone(),
            ssh_port: 50022,
        })
    }

    async fn stop_vm(&self, name: &str) -> Result<(), VBoxError> {
        self.record("stop_vm", name)
    }

    async fn suspend_vm(&self, name: &str) -> Result<(), VBoxError> {
        self.record("suspend_vm", name)
    }

    async fn resume_vm(&self, vm_config: &VmConfig) -> Result<(), VBoxError> {
        self.record("resume_vm", &vm_config.name)
    }

    async fn destroy_vms(&self, names: &[String]) -> Result<(), VBoxError> {
        self.record("destroy_vms", &names.join(","))
    }

    async fn status(&self, name: &str) -> Result<VmStatus, VBoxError> {
        self.record("status", name)?;
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(name)
            .copied()
            .unwrap_or(VmStatus::NotCreated))
    }

    async fn is_suspended(&self, name: &str) -> Result<bool, VBoxError> {
        self.record("is_suspended", name)?;
        Ok(self.suspended.lock().unwrap().iter().any(|vm| vm == name))
    }

    async fn conflicting_vm_present(&self, name: &str) -> Result<bool, VBoxError> {
        self.record("conflicting_vm_present", name)?;
        Ok(self.conflicting.load(Ordering::SeqCst))
    }

    async fn get_pcfdev_vms(&self) -> Result<Vec<String>, VBoxError> {
        self.record("get_pcfdev_vms", "")?;
        Ok(Vec::new())
    }

    async fn vm_config(&self, name: &str) -> Result<VmConfig, VBoxError> {
        self.record("vm_config", name)?;
        Ok(VmConfig {
            name: name.to_string(),
            ..vm_config()
        })
    }
}

pub struct FakeSsh {
    log: Log,
    outputs: Mutex<HashMap<String, String>>,
}

impl FakeSsh {
    pub fn set_output(&self, command: &str, output: &str) {
        self.outputs
            .lock()
            .unwrap()
            .insert(command.into(), output.into());
    }

    fn record(&self, step: &str, entry: String) -> Result<(), SshError> {
        self.log.push(entry);
        if self.log.fails(&format!("ssh.{step}")) {
            return Err(some_error());
        }
        Ok(())
    }
}

#[async_trait]
impl SshClient for FakeSsh {
    fn generate_address(&self) -> Result<SshAddress, SshError> {
        self.record("generate_address", "ssh.generate_address".into())?;
        Ok(SshAddress::new("127.0.0.1", 50022))
    }

    async fn wait_for_ssh(
        &self,
        addresses: &[SshAddress],
        private_key: &[u8],
        timeout: Duration,
    ) -> Result<(), SshError> {
        self.record(
            "wait_for_ssh",
            format!(
                "ssh.wait_for_ssh {}",
                describe(addresses, private_key, timeout)
            ),
        )
    }

    async fn run_ssh_command(
        &self,
        command: &str,
        addresses: &[SshAddress],
        private_key: &[u8],
        timeout: Duration,
        _stdout: Sink<'_>,
        _stderr: Sink<'_>,
    ) -> Result<(), SshError> {
        self.record(
            "run_ssh_command",
            format!(
                "ssh.run_ssh_command {command} {}",
                describe(addresses, private_key, timeout)
            ),
        )
    }

    async fn get_ssh_output(
        &self,
        command: &str,
        addresses: &[SshAddress],
        private_key: &[u8],
        timeout: Duration,
    ) -> Result<String, SshError> {
        self.record(
            "get_ssh_output",
            format!(
                "ssh.get_ssh_output {command} {}",
                describe(addresses, private_key, timeout)
            ),
        )?;
        Ok(self
            .outputs
            .lock()
            .unwrap()
            .get(command)
            .cloned()
            .unwrap_or_default())
    }

    async fn start_ssh_session(
        &self,
        addresses: &[SshAddress],
        private_key: &[u8],
        timeout: Duration,
        _stdin: Stdin<'_>,
        _stdout: Sink<'_>,
        _stderr: Sink<'_>,
    ) -> Result<(), SshError> {
        self.record(
            "start_ssh_session",
            format!(
                "ssh.start_ssh_session {}",
                describe(addresses, private_key, timeout)
            ),
        )
    }

    fn generate_keypair(&self) -> Result<SshKeypair, SshError> {
        self.record("generate_keypair", "ssh.generate_keypair".into())?;
        Ok(SshKeypair {
            private_key: b"some-private-key".to_vec(),
            public_key: b"some-public-key\n".to_vec(),
        })
    }
}

pub struct FakeFs {
    log: Log,
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

#[async_trait]
impl Fs for FakeFs {
    async fn read(&self, path: &Path) -> Result<Vec<u8>, FsError> {
        self.log.push(format!("fs.read {}", path.display()));
        let file = self.files.lock().unwrap().get(path).cloned();
        match file {
            Some(data) if !self.log.fails("fs.read") => Ok(data),
            _ => Err(FsError::ReadFile {
                path: path.to_path_buf(),
                source: io::Error::other("some-error"),
            }),
        }
    }

    async fn write_private(&self, path: &Path, data: &[u8]) -> Result<(), FsError> {
        self.log.push(format!("fs.write_private {}", path.display()));
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }
}

pub struct FakeUi {
    log: Log,
    answer: AtomicBool,
}

impl FakeUi {
    pub fn answer(&self, answer: bool) {
        self.answer.store(answer, Ordering::SeqCst);
    }
}

impl Ui for FakeUi {
    fn say(&self, message: &str) {
        self.log.push(format!("ui.say {message}"));
    }

    fn confirm(&self, message: &str) -> bool {
        self.log.push(format!("ui.confirm {message}"));
        self.answer.load(Ordering::SeqCst)
    }
}

fn collaborator_result(log: &Log, step: &str) -> Result<(), VmError> {
    if log.fails(step) {
        return Err(VmError::Ssh(some_error()));
    }
    Ok(())
}

pub struct FakeCertStore {
    log: Log,
}

#[async_trait]
impl CertStore for FakeCertStore {
    async fn store(&self, pem: &str) -> Result<(), VmError> {
        self.log.push(format!("cert_store.store {pem}"));
        collaborator_result(&self.log, "cert_store.store")
    }
}

pub struct FakeLogFetcher {
    log: Log,
}

#[async_trait]
impl LogFetcher for FakeLogFetcher {
    async fn fetch_logs(&self, vm_config: &VmConfig) -> Result<(), VmError> {
        self.log
            .push(format!("log_fetcher.fetch_logs {}", vm_config.name));
        collaborator_result(&self.log, "log_fetcher.fetch_logs")
    }
}

pub struct FakeCmdRunner {
    log: Log,
}

#[async_trait]
impl CmdRunner for FakeCmdRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<(), VmError> {
        self.log
            .push(format!("cmd_runner.run {program} {}", args.join(" ")));
        collaborator_result(&self.log, "cmd_runner.run")
    }
}

/// Hands out [`FakeVm`]s so delegation can be asserted without a real variant.
pub struct FakeBuilder {
    log: Log,
}

#[async_trait]
impl VmBuilder for FakeBuilder {
    async fn vm(&self, name: &str) -> Result<Box<dyn Vm>, VmError> {
        self.log.push(format!("builder.vm {name}"));
        collaborator_result(&self.log, "builder.vm")?;
        Ok(Box::new(FakeVm {
            log: self.log.clone(),
        }))
    }
}

pub struct FakeVm {
    log: Log,
}

impl FakeVm {
    fn record(&self, entry: String) -> Result<(), VmError> {
        self.log.push(entry);
        collaborator_result(&self.log, "vm")
    }
}

#[async_trait]
impl Vm for FakeVm {
    async fn start(&self, opts: &StartOpts) -> Result<(), VmError> {
        self.record(format!("vm.start {opts:?}"))
    }

    async fn stop(&self) -> Result<(), VmError> {
        self.record("vm.stop".into())
    }

    async fn suspend(&self) -> Result<(), VmError> {
        self.record("vm.suspend".into())
    }

    async fn resume(&self) -> Result<(), VmError> {
        self.record("vm.resume".into())
    }

    fn status(&self) -> &'static str {
        "Fake"
    }

    async fn verify_start_opts(&self, opts: &StartOpts) -> Result<(), VmError> {
        self.record(format!("vm.verify_start_opts {opts:?}"))
    }

    async fn trust(&self, opts: &StartOpts) -> Result<(), VmError> {
        self.record(format!("vm.trust {opts:?}"))
    }

    async fn ssh(
        &self,
        _stdin: Stdin<'_>,
        _stdout: Sink<'_>,
        _stderr: Sink<'_>,
    ) -> Result<(), VmError> {
        self.record("vm.ssh".into())
    }

    async fn target(&self, auto_target: bool) -> Result<(), VmError> {
        self.record(format!("vm.target {auto_target}"))
    }

    async fn get_debug_logs(&self) -> Result<(), VmError> {
        self.record("vm.get_debug_logs".into())
    }
}

pub struct Fixture {
    pub log: Log,
    pub hypervisor: Arc<FakeHypervisor>,
    pub ssh: Arc<FakeSsh>,
    pub ui: Arc<FakeUi>,
    pub builder: Arc<FakeBuilder>,
    pub ctx: Arc<VmContext>,
}

impl Fixture {
    pub fn builder(&self) -> Arc<dyn VmBuilder> {
        self.builder.clone()
    }
}

pub fn fixture() -> Fixture {
    fixture_with_free_memory(8192)
}

pub fn fixture_with_free_memory(free_memory: u64) -> Fixture {
    let log = Log::default();
    let hypervisor = Arc::new(FakeHypervisor {
        log: log.clone(),
        statuses: Mutex::new(HashMap::new()),
        suspended: Mutex::new(Vec::new()),
        conflicting: AtomicBool::new(false),
    });
    let ssh = Arc::new(FakeSsh {
        log: log.clone(),
        outputs: Mutex::new(HashMap::new()),
    });
    let fs = Arc::new(FakeFs {
        log: log.clone(),
        files: Mutex::new(HashMap::from([(
            PathBuf::from(PRIVATE_KEY_PATH),
            b"some-private-key".to_vec(),
        )])),
    });
    let ui = Arc::new(FakeUi {
        log: log.clone(),
        answer: AtomicBool::new(true),
    });
    let builder = Arc::new(FakeBuilder { log: log.clone() });
    let ctx = Arc::new(VmContext {
        config: Arc::new(Config::new(PathBuf::from("/some/home"), free_memory)),
        hypervisor: hypervisor.clone(),
        ssh: ssh.clone(),
        fs,
        ui: ui.clone(),
        cert_store: Arc::new(FakeCertStore { log: log.clone() }),
        log_fetcher: Arc::new(FakeLogFetcher { log: log.clone() }),
        cmd_runner: Arc::new(FakeCmdRunner { log: log.clone() }),
    });
    Fixture {
        log,
        hypervisor,
        ssh,
        ui,
        builder,
        ctx,
    }
}
