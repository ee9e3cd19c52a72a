mod builder;
mod collaborators;
mod context;
mod error;
mod not_created;
mod opts;
mod provision;
mod running;
mod saved;
mod services;
mod stopped;
#[cfg(test)]
mod testing;
mod unprovisioned;

pub use crate::builder::{Builder, VmBuilder};
pub use crate::collaborators::{CertStore, CmdRunner, LogFetcher, Ui};
pub use crate::context::{VmContext, ssh_addresses};
pub use crate::error::VmError;
pub use crate::not_created::NotCreated;
pub use crate::opts::StartOpts;
pub use crate::running::Running;
pub use crate::saved::Saved;
pub use crate::services::normalize_services;
pub use crate::stopped::Stopped;
pub use crate::unprovisioned::Unprovisioned;

use async_trait::async_trait;
use pcfdev_ssh::{Sink, Stdin};

/// One PCF Dev VM in whatever state the hypervisor last reported.
///
/// Every state answers every operation: some act, the rest explain to the user
/// why they can't. A value is only good for the command that built it.
#[async_trait]
pub trait Vm: Send + Sync {
    async fn start(&self, opts: &StartOpts) -> Result<(), VmError>;
    async fn stop(&self) -> Result<(), VmError>;
    async fn suspend(&self) -> Result<(), VmError>;
    async fn resume(&self) -> Result<(), VmError>;
    fn status(&self) -> &'static str;
    async fn verify_start_opts(&self, opts: &StartOpts) -> Result<(), VmError>;
    async fn trust(&self, opts: &StartOpts) -> Result<(), VmError>;
    async fn ssh(
        &self,
        stdin: Stdin<'_>,
        stdout: Sink<'_>,
        stderr: Sink<'_>,
    ) -> Result<(), VmError>;
    async fn target(&self, auto_target: bool) -> Result<(), VmError>;
    async fn get_debug_logs(&self) -> Result<(), VmError>;
}
