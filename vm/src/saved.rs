use async_trait::async_trait;
use pcfdev_config::VmConfig;
use pcfdev_ssh::{Sink, Stdin};
use std::sync::Arc;
use tracing::instrument;

use crate::context::{SSH_TIMEOUT, ssh_addresses};
use crate::{StartOpts, Vm, VmContext, VmError};

/// Suspended: memory state saved to disk by the hypervisor.
pub struct Saved {
    ctx: Arc<VmContext>,
    vm_config: VmConfig,
}

impl Saved {
    pub fn new(ctx: Arc<VmContext>, vm_config: VmConfig) -> Self {
        Self { ctx, vm_config }
    }
}

#[async_trait]
impl Vm for Saved {
    async fn start(&self, opts: &StartOpts) -> Result<(), VmError> {
        opts.check_unchanged()?;
        self.resume().await
    }

    async fn stop(&self) -> Result<(), VmError> {
        self.ctx.ui.say(
            "Your VM is currently suspended. You must resume your VM with `pcfdev resume` to shut it down.",
        );
        Ok(())
    }

    async fn suspend(&self) -> Result<(), VmError> {
        self.ctx.ui.say("Your VM is suspended.");
        Ok(())
    }

    /// Restores the snapshot and waits for the guest's SSH daemon; the guest
    /// network survived the suspend so nothing is reconfigured.
    #[instrument(skip(self), fields(name = %self.vm_config.name))]
    async fn resume(&self) -> Result<(), VmError> {
        self.ctx.confirm_free_memory(self.vm_config.memory)?;
        self.ctx.ui.say("Resuming VM...");
        self.ctx
            .hypervisor
            .resume_vm(&self.vm_config)
            .await
            .map_err(VmError::resume_vm)?;
        let private_key = self
            .ctx
            .read_private_key()
            .await
            .map_err(VmError::resume_vm)?;
        self.ctx
            .ssh
            .wait_for_ssh(&ssh_addresses(&self.vm_config), &private_key, SSH_TIMEOUT)
            .await
            .map_err(VmError::resume_vm)?;
        self.ctx.ui.say("PCF Dev is now running.");
        Ok(())
    }

    fn status(&self) -> &'static str {
        "Suspended"
    }

    async fn verify_start_opts(&self, opts: &StartOpts) -> Result<(), VmError> {
        opts.check_unchanged()?;
        self.ctx.confirm_free_memory(self.vm_config.memory)
    }

    async fn trust(&self, _opts: &StartOpts) -> Result<(), VmError> {
        self.ctx
            .ui
            .say("Your VM is suspended. Resume to trust VM certificates.");
        Ok(())
    }

    async fn ssh(
        &self,
        _stdin: Stdin<'_>,
        _stdout: Sink<'_>,
        _stderr: Sink<'_>,
    ) -> Result<(), VmError> {
        self.ctx.ui.say("Your VM is suspended. Resume to SSH to PCF Dev.");
        Ok(())
    }

    async fn target(&self, _auto_target: bool) -> Result<(), VmError> {
        self.ctx.ui.say("Your VM is suspended. Resume to target PCF Dev.");
        Ok(())
    }

    async fn get_debug_logs(&self) -> Result<(), VmError> {
        self.ctx
            .ui
            .say("Your VM is suspended. Resume to retrieve debug logs.");
        Ok(())
    }
}
