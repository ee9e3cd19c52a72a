use async_trait::async_trait;
use pcfdev_config::VmConfig;
use pcfdev_ssh::{Sink, Stdin};
use pcfdev_vbox::VBoxError;
use std::sync::Arc;
use tracing::instrument;

use crate::context::{HEALTHCHECK_TIMEOUT, SSH_TIMEOUT, ssh_addresses};
use crate::provision::{CA_CERT_COMMAND, REMOVE_HEALTHCHECK_COMMAND};
use crate::{StartOpts, Vm, VmBuilder, VmContext, VmError};

/// Powered on and provisioned.
pub struct Running {
    ctx: Arc<VmContext>,
    builder: Arc<dyn VmBuilder>,
    vm_config: VmConfig,
}

impl Running {
    pub fn new(ctx: Arc<VmContext>, builder: Arc<dyn VmBuilder>, vm_config: VmConfig) -> Self {
        Self {
            ctx,
            builder,
            vm_config,
        }
    }

    /// Drops the health-check marker so the rebuilt variant is unprovisioned,
    /// then provisions through it. Errors from that variant pass through as is.
    async fn reprovision(&self, opts: &StartOpts) -> Result<(), VmError> {
        let private_key = self
            .ctx
            .read_private_key()
            .await
            .map_err(VmError::start_vm)?;
        self.ctx
            .ssh
            .get_ssh_output(
                REMOVE_HEALTHCHECK_COMMAND,
                &ssh_addresses(&self.vm_config),
                &private_key,
                HEALTHCHECK_TIMEOUT,
            )
            .await
            .map_err(VmError::start_vm)?;
        let vm = self
            .builder
            .vm(&self.vm_config.name)
            .await
            .map_err(VmError::start_vm)?;
        vm.start(opts).await
    }
}

pub(crate) async fn stop(ctx: &VmContext, vm_config: &VmConfig) -> Result<(), VmError> {
    power_off(ctx, vm_config, VmError::stop_vm).await
}

/// Powers the guest off, tagging a hypervisor failure with `wrap`.
pub(crate) async fn power_off(
    ctx: &VmContext,
    vm_config: &VmConfig,
    wrap: impl FnOnce(VBoxError) -> VmError,
) -> Result<(), VmError> {
    ctx.ui.say("Stopping VM...");
    ctx.hypervisor.stop_vm(&vm_config.name).await.map_err(wrap)?;
    ctx.ui.say("PCF Dev is now stopped.");
    Ok(())
}

pub(crate) async fn ssh(
    ctx: &VmContext,
    vm_config: &VmConfig,
    stdin: Stdin<'_>,
    stdout: Sink<'_>,
    stderr: Sink<'_>,
) -> Result<(), VmError> {
    let private_key = ctx.read_private_key().await?;
    ctx.ssh
        .start_ssh_session(
            &ssh_addresses(vm_config),
            &private_key,
            SSH_TIMEOUT,
            stdin,
            stdout,
            stderr,
        )
        .await?;
    Ok(())
}

pub(crate) async fn get_debug_logs(ctx: &VmContext, vm_config: &VmConfig) -> Result<(), VmError> {
    ctx.log_fetcher
        .fetch_logs(vm_config)
        .await
        .map_err(VmError::fetch_logs)?;
    ctx.ui.say(&format!(
        "Debug logs written to {}. While some scrubbing has taken place, please remove any remaining sensitive information from these logs before sharing.",
        ctx.config.debug_logs_path.display()
    ));
    Ok(())
}

#[async_trait]
impl Vm for Running {
    #[instrument(skip(self), fields(name = %self.vm_config.name))]
    async fn start(&self, opts: &StartOpts) -> Result<(), VmError> {
        if opts.provision {
            return self.reprovision(opts).await;
        }
        self.verify_start_opts(opts).await?;
        self.ctx.ui.say("PCF Dev is running.");
        Ok(())
    }

    #[instrument(skip(self), fields(name = %self.vm_config.name))]
    async fn stop(&self) -> Result<(), VmError> {
        stop(&self.ctx, &self.vm_config).await
    }

    #[instrument(skip(self), fields(name = %self.vm_config.name))]
    async fn suspend(&self) -> Result<(), VmError> {
        self.ctx.ui.say("Suspending VM...");
        self.ctx
            .hypervisor
            .suspend_vm(&self.vm_config.name)
            .await
            .map_err(VmError::suspend_vm)?;
        self.ctx.ui.say("PCF Dev is now suspended.");
        Ok(())
    }

    async fn resume(&self) -> Result<(), VmError> {
        self.ctx.ui.say("PCF Dev is running.");
        Ok(())
    }

    fn status(&self) -> &'static str {
        "Running"
    }

    async fn verify_start_opts(&self, opts: &StartOpts) -> Result<(), VmError> {
        opts.check_unchanged()
    }

    #[instrument(skip(self, opts), fields(name = %self.vm_config.name))]
    async fn trust(&self, opts: &StartOpts) -> Result<(), VmError> {
        let private_key = self
            .ctx
            .read_private_key()
            .await
            .map_err(VmError::trust)?;
        let cert = self
            .ctx
            .ssh
            .get_ssh_output(
                CA_CERT_COMMAND,
                &ssh_addresses(&self.vm_config),
                &private_key,
                SSH_TIMEOUT,
            )
            .await
            .map_err(VmError::trust)?;

        if opts.print_ca {
            self.ctx.ui.say(&cert);
            return Ok(());
        }

        self.ctx
            .cert_store
            .store(&cert)
            .await
            .map_err(VmError::trust)?;
        self.ctx.ui.say(&format!(
            "***Warning: a self-signed certificate for *.{} has been inserted into your certificate store.***",
            self.vm_config.domain
        ));
        Ok(())
    }

    async fn ssh(
        &self,
        stdin: Stdin<'_>,
        stdout: Sink<'_>,
        stderr: Sink<'_>,
    ) -> Result<(), VmError> {
        ssh(&self.ctx, &self.vm_config, stdin, stdout, stderr).await
    }

    #[instrument(skip(self), fields(name = %self.vm_config.name))]
    async fn target(&self, auto_target: bool) -> Result<(), VmError> {
        let api = format!("api.{}", self.vm_config.domain);
        let args: Vec<String> = [
            "login",
            "-a",
            api.as_str(),
            "--skip-ssl-validation",
            "-u",
            "user",
            "-p",
            "pass",
            "-o",
            "pcfdev-org",
            "-s",
            "pcfdev-space",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        self.ctx
            .cmd_runner
            .run("cf", &args)
            .await
            .map_err(VmError::target)?;
        if !auto_target {
            self.ctx
                .ui
                .say(&format!("Successfully logged in to {api} as user."));
        }
        Ok(())
    }

    async fn get_debug_logs(&self) -> Result<(), VmError> {
        get_debug_logs(&self.ctx, &self.vm_config).await
    }
}
