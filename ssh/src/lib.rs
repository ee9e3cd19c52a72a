mod address;
mod command;
mod connect;
mod keypair;
mod session;
mod stdin;
mod terminal;

pub use crate::address::{LOOPBACK, SshAddress, generate_address};
pub use crate::keypair::{SshKeypair, authorized_key};
pub use crate::stdin::DetachedStdin;
pub use crate::terminal::{StdTerminal, Terminal};

use async_trait::async_trait;
use std::{io, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use crate::connect::{ClientHandle, connect_any, parse_private_key};

/// User the appliance's SSH daemon accepts.
pub const GUEST_USER: &str = "vcap";

#[derive(Error, Debug)]
pub enum SshError {
    #[error("could not parse private key: {0}")]
    ParsePrivateKey(#[source] russh::keys::Error),

    #[error("ssh connection timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Process exited with status {exit_status}")]
    ExitStatus { exit_status: u32, output: String },

    #[error("remote process exited without reporting a status")]
    MissingExitStatus,

    #[error("SSH authentication (public key) failed")]
    AuthFailed,

    #[error("failed to create signals stream: {0}")]
    Signals(#[source] io::Error),

    #[error("failed to put terminal into raw mode: {0}")]
    RawMode(#[source] io::Error),

    #[error("SSH keys error: {0}")]
    Key(#[from] russh::keys::ssh_key::Error),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Russh(#[from] russh::Error),
}

pub type Stdin<'a> = &'a mut (dyn AsyncRead + Unpin + Send);
pub type Sink<'a> = &'a mut (dyn AsyncWrite + Unpin + Send);

/// Everything the orchestration layer needs from SSH.
///
/// Each call dials the candidate addresses concurrently and retries until one
/// answers or `timeout` elapses. The timeout bounds the dial only, not the
/// remote command.
#[async_trait]
pub trait SshClient: Send + Sync {
    fn generate_address(&self) -> Result<SshAddress, SshError>;

    async fn wait_for_ssh(
        &self,
        addresses: &[SshAddress],
        private_key: &[u8],
        timeout: Duration,
    ) -> Result<(), SshError>;

    async fn run_ssh_command(
        &self,
        command: &str,
        addresses: &[SshAddress],
        private_key: &[u8],
        timeout: Duration,
        stdout: Sink<'_>,
        stderr: Sink<'_>,
    ) -> Result<(), SshError>;

    /// Combined stdout and stderr. On a non-zero exit the captured output rides
    /// along in [`SshError::ExitStatus`].
    async fn get_ssh_output(
        &self,
        command: &str,
        addresses: &[SshAddress],
        private_key: &[u8],
        timeout: Duration,
    ) -> Result<String, SshError>;

    async fn start_ssh_session(
        &self,
        addresses: &[SshAddress],
        private_key: &[u8],
        timeout: Duration,
        stdin: Stdin<'_>,
        stdout: Sink<'_>,
        stderr: Sink<'_>,
    ) -> Result<(), SshError>;

    fn generate_keypair(&self) -> Result<SshKeypair, SshError>;
}

/// [`SshClient`] backed by `russh`.
pub struct Ssh {
    username: String,
    terminal: Arc<dyn Terminal>,
}

impl Ssh {
    pub fn new(terminal: Arc<dyn Terminal>) -> Self {
        Self {
            username: GUEST_USER.to_string(),
            terminal,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    async fn connect(
        &self,
        addresses: &[SshAddress],
        private_key: &[u8],
        timeout: Duration,
    ) -> Result<ClientHandle, SshError> {
        let private_key = parse_private_key(private_key)?;
        connect_any(addresses, private_key, &self.username, timeout).await
    }
}

fn check_exit(exit_status: Option<u32>, output: String) -> Result<String, SshError> {
    match exit_status {
        Some(0) => Ok(output),
        Some(exit_status) => Err(SshError::ExitStatus {
            exit_status,
            output,
        }),
        None => Err(SshError::MissingExitStatus),
    }
}

async fn disconnect(handle: ClientHandle) {
    if let Err(error) = handle
        .disconnect(russh::Disconnect::ByApplication, "", "English")
        .await
    {
        debug!(%error, "Failed to disconnect cleanly");
    }
}

#[async_trait]
impl SshClient for Ssh {
    fn generate_address(&self) -> Result<SshAddress, SshError> {
        generate_address()
    }

    #[tracing::instrument(skip(self, private_key))]
    async fn wait_for_ssh(
        &self,
        addresses: &[SshAddress],
        private_key: &[u8],
        timeout: Duration,
    ) -> Result<(), SshError> {
        let handle = self.connect(addresses, private_key, timeout).await?;
        disconnect(handle).await;
        info!("SSH is reachable");
        Ok(())
    }

    #[tracing::instrument(skip(self, private_key, stdout, stderr))]
    async fn run_ssh_command(
        &self,
        command: &str,
        addresses: &[SshAddress],
        private_key: &[u8],
        timeout: Duration,
        stdout: Sink<'_>,
        stderr: Sink<'_>,
    ) -> Result<(), SshError> {
        let handle = self.connect(addresses, private_key, timeout).await?;
        let result = command::exec(&handle, command, stdout, Some(stderr)).await;
        disconnect(handle).await;
        check_exit(result?, String::new()).map(|_| ())
    }

    #[tracing::instrument(skip(self, private_key))]
    async fn get_ssh_output(
        &self,
        command: &str,
        addresses: &[SshAddress],
        private_key: &[u8],
        timeout: Duration,
    ) -> Result<String, SshError> {
        let handle = self.connect(addresses, private_key, timeout).await?;
        let mut output = Vec::new();
        let result = command::exec(&handle, command, &mut output, None).await;
        disconnect(handle).await;
        check_exit(result?, String::from_utf8_lossy(&output).into_owned())
    }

    #[tracing::instrument(skip(self, private_key, stdin, stdout, stderr))]
    async fn start_ssh_session(
        &self,
        addresses: &[SshAddress],
        private_key: &[u8],
        timeout: Duration,
        stdin: Stdin<'_>,
        stdout: Sink<'_>,
        stderr: Sink<'_>,
    ) -> Result<(), SshError> {
        let handle = self.connect(addresses, private_key, timeout).await?;
        let result =
            session::interactive(&handle, self.terminal.clone(), stdin, stdout, stderr).await;
        disconnect(handle).await;
        check_exit(result?, String::new()).map(|_| ())
    }

    fn generate_keypair(&self) -> Result<SshKeypair, SshError> {
        SshKeypair::generate()
    }
}
