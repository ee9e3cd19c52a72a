//! Recording fakes sharing one call log, so tests can assert cross-collaborator order.

use async_trait::async_trait;
use pcfdev_fs::{Fs, FsError};
use pcfdev_ssh::{Sink, SshAddress, SshClient, SshError, SshKeypair, Stdin};
use pcfdev_vboxdriver::{Driver, DriverError, HostOnlyInterface, VmInfo};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.0.lock().unwrap().iter().any(|e| e == entry)
    }
}

pub fn some_driver_error(step: &str) -> DriverError {
    DriverError::Parse {
        command: step.to_string(),
        output: "some-error".to_string(),
    }
}

pub fn some_ssh_error() -> SshError {
    SshError::Io(io::Error::other("some-error"))
}

#[derive(Default)]
struct DriverState {
    vms: Vec<(String, bool)>,
    saved: Vec<String>,
    interfaces: Vec<HostOnlyInterface>,
    forward_port: Option<u16>,
    extra: HashMap<String, String>,
    fail_on: Option<String>,
}

pub struct FakeDriver {
    log: Log,
    state: Mutex<DriverState>,
}

impl FakeDriver {
    pub fn new(log: Log) -> Self {
        Self {
            log,
            state: Mutex::new(DriverState::default()),
        }
    }

    pub fn add_vm(&self, name: &str, running: bool) {
        self.state.lock().unwrap().vms.push((name.into(), running));
    }

    pub fn set_saved(&self, name: &str) {
        self.state.lock().unwrap().saved.push(name.into());
    }

    pub fn add_interface(&self, name: &str, ip: &str) {
        self.state.lock().unwrap().interfaces.push(HostOnlyInterface {
            name: name.into(),
            ip: ip.into(),
        });
    }

    pub fn set_forward_port(&self, port: u16) {
        self.state.lock().unwrap().forward_port = Some(port);
    }

    pub fn set_extra(&self, key: &str, value: &str) {
        self.state
            .lock()
            .unwrap()
            .extra
            .insert(key.into(), value.into());
    }

    pub fn fail_on(&self, step: &str) {
        self.state.lock().unwrap().fail_on = Some(step.into());
    }

    fn record(&self, step: &str, args: &[&str]) -> Result<(), DriverError> {
        let mut entry = format!("driver.{step}");
        for arg in args {
            entry.push(' ');
            entry.push_str(arg);
        }
        self.log.push(entry);
        match &self.state.lock().unwrap().fail_on {
            Some(fail) if fail == step => Err(some_driver_error(step)),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn vm_exists(&self, name: &str) -> Result<bool, DriverError> {
        self.record("vm_exists", &[name])?;
        Ok(self.state.lock().unwrap().vms.iter().any(|(vm, _)| vm == name))
    }

    async fn is_vm_running(&self, name: &str) -> Result<bool, DriverError> {
        self.record("is_vm_running", &[name])?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .vms
            .iter()
            .any(|(vm, running)| vm == name && *running))
    }

    async fn is_vm_saved(&self, name: &str) -> Result<bool, DriverError> {
        self.record("is_vm_saved", &[name])?;
        Ok(self.state.lock().unwrap().saved.iter().any(|vm| vm == name))
    }

    async fn running_vms(&self) -> Result<Vec<String>, DriverError> {
        self.record("running_vms", &[])?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .vms
            .iter()
            .filter(|(_, running)| *running)
            .map(|(vm, _)| vm.clone())
            .collect())
    }

    async fn vms(&self) -> Result<Vec<String>, DriverError> {
        self.record("vms", &[])?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .vms
            .iter()
            .map(|(vm, _)| vm.clone())
            .collect())
    }

    async fn import_vm(
        &self,
        path: &Path,
        name: &str,
        memory: u64,
        cpus: u32,
    ) -> Result<(), DriverError> {
        let path = path.display().to_string();
        let memory = memory.to_string();
        let cpus = cpus.to_string();
        self.record("import_vm", &[&path, name, &memory, &cpus])
    }

    async fn start_vm(&self, name: &str) -> Result<(), DriverError> {
        self.record("start_vm", &[name])
    }

    async fn stop_vm(&self, name: &str) -> Result<(), DriverError> {
        self.record("stop_vm", &[name])
    }

    async fn suspend_vm(&self, name: &str) -> Result<(), DriverError> {
        self.record("suspend_vm", &[name])
    }

    async fn power_off_vm(&self, name: &str) -> Result<(), DriverError> {
        self.record("power_off_vm", &[name])
    }

    async fn destroy_vm(&self, name: &str) -> Result<(), DriverError> {
        self.record("destroy_vm", &[name])
    }

    async fn vm_info(&self, name: &str) -> Result<VmInfo, DriverError> {
        self.record("vm_info", &[name])?;
        Ok(VmInfo {
            memory: 4096,
            cpus: 2,
        })
    }

    async fn host_only_interfaces(&self) -> Result<Vec<HostOnlyInterface>, DriverError> {
        self.record("host_only_interfaces", &[])?;
        Ok(self.state.lock().unwrap().interfaces.clone())
    }

    async fn create_host_only_interface(&self, ip: &str) -> Result<String, DriverError> {
        self.record("create_host_only_interface", &[ip])?;
        Ok("vboxnet1".to_string())
    }

    async fn attach_network_interface(
        &self,
        interface: &str,
        name: &str,
    ) -> Result<(), DriverError> {
        self.record("attach_network_interface", &[interface, name])
    }

    async fn forward_port(
        &self,
        name: &str,
        rule: &str,
        host_port: u16,
        guest_port: u16,
    ) -> Result<(), DriverError> {
        let host_port = host_port.to_string();
        let guest_port = guest_port.to_string();
        self.record("forward_port", &[name, rule, &host_port, &guest_port])
    }

    async fn get_host_forward_port(
        &self,
        name: &str,
        rule: &str,
    ) -> Result<Option<u16>, DriverError> {
        self.record("get_host_forward_port", &[name, rule])?;
        Ok(self.state.lock().unwrap().forward_port)
    }

    async fn get_extra_data(&self, name: &str, key: &str) -> Result<Option<String>, DriverError> {
        self.record("get_extra_data", &[name, key])?;
        Ok(self.state.lock().unwrap().extra.get(key).cloned())
    }

    async fn set_extra_data(&self, name: &str, key: &str, value: &str) -> Result<(), DriverError> {
        self.record("set_extra_data", &[name, key, value])?;
        self.set_extra(key, value);
        Ok(())
    }
}

pub struct FakeSsh {
    log: Log,
    fail_on: Mutex<Option<String>>,
}

impl FakeSsh {
    pub fn new(log: Log) -> Self {
        Self {
            log,
            fail_on: Mutex::new(None),
        }
    }

    pub fn fail_on(&self, step: &str) {
        *self.fail_on.lock().unwrap() = Some(step.into());
    }

    fn record(&self, step: &str, entry: String) -> Result<(), SshError> {
        self.log.push(entry);
        match &*self.fail_on.lock().unwrap() {
            Some(fail) if fail == step => Err(some_ssh_error()),
            _ => Ok(()),
        }
    }
}

fn describe(addresses: &[SshAddress], private_key: &[u8], timeout: Duration) -> String {
    let addresses: Vec<String> = addresses.iter().map(ToString::to_string).collect();
    format!(
        "[{}] {} {timeout:?}",
        addresses.join(", "),
        String::from_utf8_lossy(private_key)
    )
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
        Ok(String::new())
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

impl FakeFs {
    pub fn new(log: Log) -> Self {
        Self {
            log,
            files: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, path: &str, data: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(PathBuf::from(path), data.to_vec());
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(Path::new(path)).cloned()
    }
}

#[async_trait]
impl Fs for FakeFs {
    async fn read(&self, path: &Path) -> Result<Vec<u8>, FsError> {
        self.log.push(format!("fs.read {}", path.display()));
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| FsError::ReadFile {
                path: path.to_path_buf(),
                source: io::Error::from(io::ErrorKind::NotFound),
            })
    }

    async fn write_private(&self, path: &Path, data: &[u8]) -> Result<(), FsError> {
        self.log.push(format!(
            "fs.write_private {} {}",
            path.display(),
            String::from_utf8_lossy(data)
        ));
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }
}
