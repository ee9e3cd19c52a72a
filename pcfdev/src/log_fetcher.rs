use async_trait::async_trait;
use pcfdev_config::{Config, VmConfig};
use pcfdev_fs::Fs;
use pcfdev_ssh::SshClient;
use pcfdev_vm::{LogFetcher, VmError, ssh_addresses};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
const REDACTED: &str = "[REDACTED]";

/// Guest commands whose output ends up in the debug log, by section title.
const GUEST_COMMANDS: &[(&str, &str)] = &[
    ("provision log", "sudo cat /var/pcfdev/provision.log"),
    (
        "provision options",
        "sudo cat /var/pcfdev/provision-options.json",
    ),
    ("network interfaces", "ip addr"),
    ("routes", "ip route"),
    ("disk usage", "df -h"),
    ("memory", "free -m"),
    ("kernel log", "sudo dmesg | tail -n 500"),
];

/// Collects guest diagnostics over SSH into one file on the host.
pub struct SshLogFetcher {
    ssh: Arc<dyn SshClient>,
    fs: Arc<dyn Fs>,
    config: Arc<Config>,
}

impl SshLogFetcher {
    pub fn new(ssh: Arc<dyn SshClient>, fs: Arc<dyn Fs>, config: Arc<Config>) -> Self {
        Self { ssh, fs, config }
    }
}

#[async_trait]
impl LogFetcher for SshLogFetcher {
    /// A failing guest command is noted in its section and does not stop the rest.
    #[instrument(skip(self, vm_config), fields(name = %vm_config.name))]
    async fn fetch_logs(&self, vm_config: &VmConfig) -> Result<(), VmError> {
        let private_key = self.fs.read(&self.config.private_key_path).await?;
        let addresses = ssh_addresses(vm_config);

        let mut logs = String::new();
        for &(title, command) in GUEST_COMMANDS {
            let output = match self
                .ssh
                .get_ssh_output(command, &addresses, &private_key, COMMAND_TIMEOUT)
                .await
            {
                Ok(output) => output,
                Err(error) => {
                    debug!(%error, command, "Guest command failed");
                    format!("failed to run `{command}`: {error}\n")
                }
            };
            logs.push_str(&format!("==> {title} ({command}) <==\n{}\n", scrub(&output)));
        }

        self.fs
            .write_private(&self.config.debug_logs_path, logs.as_bytes())
            .await?;
        info!(path = %self.config.debug_logs_path.display(), "Wrote debug logs");
        Ok(())
    }
}

/// Blanks out lines which look like they carry a password.
fn scrub(output: &str) -> String {
    let mut scrubbed = String::with_capacity(output.len());
    for line in output.lines() {
        if line.to_lowercase().contains("password") {
            scrubbed.push_str(REDACTED);
        } else {
            scrubbed.push_str(line);
        }
        scrubbed.push('\n');
    }
    scrubbed
}
