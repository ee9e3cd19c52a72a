use async_trait::async_trait;
use pcfdev_cmd::Command;
use pcfdev_vm::{CmdRunner, VmError};

/// Runs host programs with stdout passed through to the user.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessCmdRunner;

#[async_trait]
impl CmdRunner for ProcessCmdRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<(), VmError> {
        Command::new(program).args(args).stdout(true).run().await?;
        Ok(())
    }
}
