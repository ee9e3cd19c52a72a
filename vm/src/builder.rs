use async_trait::async_trait;
use pcfdev_config::VmConfig;
use pcfdev_vbox::VmStatus;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::context::{HEALTHCHECK_TIMEOUT, ssh_addresses};
use crate::provision::HEALTHCHECK_COMMAND;
use crate::{NotCreated, Running, Saved, Stopped, Unprovisioned, Vm, VmContext, VmError};

#[async_trait]
pub trait VmBuilder: Send + Sync {
    async fn vm(&self, name: &str) -> Result<Box<dyn Vm>, VmError>;
}

/// Picks the variant matching what the hypervisor reports right now.
#[derive(Clone)]
pub struct Builder {
    ctx: Arc<VmContext>,
}

impl Builder {
    pub fn new(ctx: Arc<VmContext>) -> Self {
        Self { ctx }
    }

    /// A running guest counts as provisioned once its health-check file exists.
    /// Without the operator key there is no way to tell, so it counts as not.
    async fn is_provisioned(&self, vm_config: &VmConfig) -> bool {
        let private_key = match self.ctx.read_private_key().await {
            Ok(private_key) => private_key,
            Err(error) => {
                debug!(%error, "Private key unreadable, skipping health check");
                return false;
            }
        };
        match self
            .ctx
            .ssh
            .get_ssh_output(
                HEALTHCHECK_COMMAND,
                &ssh_addresses(vm_config),
                &private_key,
                HEALTHCHECK_TIMEOUT,
            )
            .await
        {
            Ok(_) => true,
            Err(error) => {
                debug!(%error, "Health check not passing");
                false
            }
        }
    }
}

#[async_trait]
impl VmBuilder for Builder {
    #[instrument(skip(self))]
    async fn vm(&self, name: &str) -> Result<Box<dyn Vm>, VmError> {
        let ctx = self.ctx.clone();
        let builder: Arc<dyn VmBuilder> = Arc::new(self.clone());

        let status = ctx.hypervisor.status(name).await?;
        let vm: Box<dyn Vm> = match status {
            VmStatus::NotCreated => {
                let vm_config = VmConfig {
                    name: name.to_string(),
                    ..VmConfig::for_import(&ctx.config, None, None, None, None)
                };
                Box::new(NotCreated::new(ctx, builder, vm_config))
            }
            VmStatus::Stopped => {
                let vm_config = ctx.hypervisor.vm_config(name).await?;
                if ctx.hypervisor.is_suspended(name).await? {
                    Box::new(Saved::new(ctx, vm_config))
                } else {
                    Box::new(Stopped::new(ctx, builder, vm_config))
                }
            }
            VmStatus::Running => {
                let vm_config = ctx.hypervisor.vm_config(name).await?;
                if self.is_provisioned(&vm_config).await {
                    Box::new(Running::new(ctx, builder, vm_config))
                } else {
                    Box::new(Unprovisioned::new(ctx, builder, vm_config))
                }
            }
        };
        debug!(status = vm.status(), "Selected VM state");
        Ok(vm)
    }
}
