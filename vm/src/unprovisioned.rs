use async_trait::async_trait;
use pcfdev_config::VmConfig;
use pcfdev_ssh::{Sink, Stdin};
use std::sync::Arc;
use tracing::instrument;

use crate::context::{SSH_TIMEOUT, ssh_addresses};
use crate::provision::provision_command;
use crate::{StartOpts, Stopped, Vm, VmBuilder, VmContext, VmError, running};

/// Powered on, but the platform inside the guest has not come up.
pub struct Unprovisioned {
    ctx: Arc<VmContext>,
    builder: Arc<dyn VmBuilder>,
    vm_config: VmConfig,
}

impl Unprovisioned {
    pub fn new(ctx: Arc<VmContext>, builder: Arc<dyn VmBuilder>, vm_config: VmConfig) -> Self {
        Self {
            ctx,
            builder,
            vm_config,
        }
    }

    #[instrument(skip(self, opts), fields(name = %self.vm_config.name))]
    async fn provision(&self, opts: &StartOpts) -> Result<(), VmError> {
        self.ctx.ui.say("Provisioning VM...");
        let private_key = self
            .ctx
            .read_private_key()
            .await
            .map_err(VmError::provision_vm)?;
        self.ctx
            .ssh
            .run_ssh_command(
                &provision_command(&opts.master_password),
                &ssh_addresses(&self.vm_config),
                &private_key,
                SSH_TIMEOUT,
                &mut tokio::io::stdout(),
                &mut tokio::io::stderr(),
            )
            .await
            .map_err(VmError::provision_vm)?;
        Ok(())
    }
}

#[async_trait]
impl Vm for Unprovisioned {
    /// Without the provision flag the guest is restarted so the options
    /// document is rewritten from a clean boot.
    async fn start(&self, opts: &StartOpts) -> Result<(), VmError> {
        if opts.provision {
            return self.provision(opts).await;
        }
        self.verify_start_opts(opts).await?;
        running::power_off(&self.ctx, &self.vm_config, VmError::start_vm).await?;
        Stopped::new(
            self.ctx.clone(),
            self.builder.clone(),
            self.vm_config.clone(),
        )
        .boot(opts)
        .await
    }

    async fn stop(&self) -> Result<(), VmError> {
        running::stop(&self.ctx, &self.vm_config).await
    }

    async fn suspend(&self) -> Result<(), VmError> {
        self.ctx
            .ui
            .say("Your VM is currently unprovisioned and cannot be suspended.");
        Ok(())
    }

    async fn resume(&self) -> Result<(), VmError> {
        self.ctx
            .ui
            .say("Your VM is currently unprovisioned. Only a suspended VM can be resumed.");
        Ok(())
    }

    fn status(&self) -> &'static str {
        "Running"
    }

    async fn verify_start_opts(&self, opts: &StartOpts) -> Result<(), VmError> {
        opts.check_unchanged()
    }

    async fn trust(&self, _opts: &StartOpts) -> Result<(), VmError> {
        self.ctx.ui.say(
            "Your VM is currently unprovisioned. Start VM to provision it before trusting VM certificates.",
        );
        Ok(())
    }

    async fn ssh(
        &self,
        stdin: Stdin<'_>,
        stdout: Sink<'_>,
        stderr: Sink<'_>,
    ) -> Result<(), VmError> {
        running::ssh(&self.ctx, &self.vm_config, stdin, stdout, stderr).await
    }

    async fn target(&self, _auto_target: bool) -> Result<(), VmError> {
        self.ctx.ui.say(
            "Your VM is currently unprovisioned. Start VM to provision it before targeting PCF Dev.",
        );
        Ok(())
    }

    async fn get_debug_logs(&self) -> Result<(), VmError> {
        running::get_debug_logs(&self.ctx, &self.vm_config).await
    }
}
