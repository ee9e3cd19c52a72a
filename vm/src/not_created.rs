use async_trait::async_trait;
use pcfdev_config::VmConfig;
use pcfdev_ssh::{Sink, Stdin};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::opts::non_empty;
use crate::{StartOpts, Stopped, Vm, VmBuilder, VmContext, VmError};

const NOT_CREATED: &str = "PCF Dev VM has not been created.";

/// Nothing imported yet. `vm_config` holds the defaults a fresh import would use.
pub struct NotCreated {
    ctx: Arc<VmContext>,
    builder: Arc<dyn VmBuilder>,
    vm_config: VmConfig,
}

impl NotCreated {
    pub fn new(ctx: Arc<VmContext>, builder: Arc<dyn VmBuilder>, vm_config: VmConfig) -> Self {
        Self {
            ctx,
            builder,
            vm_config,
        }
    }

    fn requested_config(&self, opts: &StartOpts) -> VmConfig {
        VmConfig {
            name: self.vm_config.name.clone(),
            ..VmConfig::for_import(
                &self.ctx.config,
                opts.memory,
                opts.cpus,
                non_empty(&opts.ip),
                non_empty(&opts.domain),
            )
        }
    }

    fn say_not_created(&self) -> Result<(), VmError> {
        self.ctx.ui.say(NOT_CREATED);
        Ok(())
    }
}

#[async_trait]
impl Vm for NotCreated {
    #[instrument(skip(self, opts), fields(name = %self.vm_config.name))]
    async fn start(&self, opts: &StartOpts) -> Result<(), VmError> {
        self.verify_start_opts(opts).await?;

        let vm_config = self.requested_config(opts);
        self.ctx.ui.say("Importing VM...");
        self.ctx
            .hypervisor
            .import_vm(&self.ctx.config.ova_path, &vm_config)
            .await
            .map_err(VmError::import_vm)?;
        self.ctx.ui.say("PCF Dev is now imported to Virtualbox.");
        info!(memory = vm_config.memory, cpus = vm_config.cpus, "Imported");

        Stopped::new(self.ctx.clone(), self.builder.clone(), vm_config)
            .boot(opts)
            .await
    }

    async fn stop(&self) -> Result<(), VmError> {
        self.say_not_created()
    }

    async fn suspend(&self) -> Result<(), VmError> {
        self.say_not_created()
    }

    async fn resume(&self) -> Result<(), VmError> {
        self.say_not_created()
    }

    fn status(&self) -> &'static str {
        "Not created"
    }

    /// No immutability rules yet; instead the host must have room for the VM
    /// and no leftover PCF Dev VM may be registered.
    async fn verify_start_opts(&self, opts: &StartOpts) -> Result<(), VmError> {
        if self
            .ctx
            .hypervisor
            .conflicting_vm_present(&self.vm_config.name)
            .await?
        {
            return Err(VmError::OldVmPresent);
        }

        let memory = opts.memory.unwrap_or(self.ctx.config.default_memory);
        if memory < self.ctx.config.min_memory {
            return Err(VmError::InsufficientMemory {
                requested: memory,
                minimum: self.ctx.config.min_memory,
            });
        }
        self.ctx.confirm_free_memory(memory)
    }

    async fn trust(&self, _opts: &StartOpts) -> Result<(), VmError> {
        self.say_not_created()
    }

    async fn ssh(
        &self,
        _stdin: Stdin<'_>,
        _stdout: Sink<'_>,
        _stderr: Sink<'_>,
    ) -> Result<(), VmError> {
        self.say_not_created()
    }

    async fn target(&self, _auto_target: bool) -> Result<(), VmError> {
        self.say_not_created()
    }

    async fn get_debug_logs(&self) -> Result<(), VmError> {
        self.say_not_created()
    }
}
