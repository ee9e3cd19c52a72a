use async_trait::async_trait;
use pcfdev_config::VmConfig;
use pcfdev_ssh::{Sink, Stdin};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::context::{SSH_TIMEOUT, ssh_addresses};
use crate::provision::options_command;
use crate::{StartOpts, Vm, VmBuilder, VmContext, VmError};

/// Imported but powered off.
pub struct Stopped {
    ctx: Arc<VmContext>,
    builder: Arc<dyn VmBuilder>,
    vm_config: VmConfig,
}

impl Stopped {
    pub fn new(ctx: Arc<VmContext>, builder: Arc<dyn VmBuilder>, vm_config: VmConfig) -> Self {
        Self {
            ctx,
            builder,
            vm_config,
        }
    }

    /// Powers on, hands the guest its provisioning options, then provisions
    /// through whatever variant the running guest turns out to be.
    #[instrument(skip(self, opts), fields(name = %self.vm_config.name))]
    pub(crate) async fn boot(&self, opts: &StartOpts) -> Result<(), VmError> {
        self.ctx.ui.say("Starting VM...");
        let started = self
            .ctx
            .hypervisor
            .start_vm(&self.vm_config)
            .await
            .map_err(VmError::start_vm)?;
        let vm_config = VmConfig {
            ssh_port: Some(started.ssh_port),
            ..self.vm_config.clone()
        };

        let private_key = self
            .ctx
            .read_private_key()
            .await
            .map_err(VmError::start_vm)?;
        let command = options_command(&vm_config, opts).map_err(VmError::start_vm)?;
        self.ctx
            .ssh
            .run_ssh_command(
                &command,
                &ssh_addresses(&vm_config),
                &private_key,
                SSH_TIMEOUT,
                &mut tokio::io::stdout(),
                &mut tokio::io::stderr(),
            )
            .await
            .map_err(VmError::start_vm)?;

        if opts.no_provision {
            self.ctx.ui.say(
                "VM will not be provisioned because '-n' (no-provision) flag was specified.",
            );
            return Ok(());
        }

        let vm = self
            .builder
            .vm(&vm_config.name)
            .await
            .map_err(VmError::start_vm)?;
        debug!(status = vm.status(), "Handing off to provisioning");
        vm.start(&StartOpts {
            provision: true,
            ..opts.clone()
        })
        .await
    }
}

#[async_trait]
impl Vm for Stopped {
    async fn start(&self, opts: &StartOpts) -> Result<(), VmError> {
        self.verify_start_opts(opts).await?;
        self.boot(opts).await
    }

    async fn stop(&self) -> Result<(), VmError> {
        self.ctx.ui.say("PCF Dev is stopped.");
        Ok(())
    }

    async fn suspend(&self) -> Result<(), VmError> {
        self.ctx
            .ui
            .say("Your VM is currently stopped and cannot be suspended.");
        Ok(())
    }

    async fn resume(&self) -> Result<(), VmError> {
        self.ctx
            .ui
            .say("Your VM is currently stopped. Only a suspended VM can be resumed.");
        Ok(())
    }

    fn status(&self) -> &'static str {
        "Stopped"
    }

    async fn verify_start_opts(&self, opts: &StartOpts) -> Result<(), VmError> {
        opts.check_unchanged()?;
        self.ctx.confirm_free_memory(self.vm_config.memory)
    }

    async fn trust(&self, _opts: &StartOpts) -> Result<(), VmError> {
        self.ctx
            .ui
            .say("Your VM is currently stopped. Start VM to trust VM certificates.");
        Ok(())
    }

    async fn ssh(
        &self,
        _stdin: Stdin<'_>,
        _stdout: Sink<'_>,
        _stderr: Sink<'_>,
    ) -> Result<(), VmError> {
        self.ctx
            .ui
            .say("Your VM is currently stopped. Start VM to SSH to PCF Dev.");
        Ok(())
    }

    async fn target(&self, _auto_target: bool) -> Result<(), VmError> {
        self.ctx
            .ui
            .say("Your VM is currently stopped. Start VM to target PCF Dev.");
        Ok(())
    }

    async fn get_debug_logs(&self) -> Result<(), VmError> {
        self.ctx
            .ui
            .say("Your VM is currently stopped. Start VM to retrieve debug logs.");
        Ok(())
    }
}
