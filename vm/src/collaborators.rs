use async_trait::async_trait;
use pcfdev_config::VmConfig;

use crate::VmError;

/// Where status text goes and where yes/no questions are asked.
pub trait Ui: Send + Sync {
    fn say(&self, message: &str);
    fn confirm(&self, message: &str) -> bool;
}

#[async_trait]
pub trait CertStore: Send + Sync {
    async fn store(&self, pem: &str) -> Result<(), VmError>;
}

#[async_trait]
pub trait LogFetcher: Send + Sync {
    async fn fetch_logs(&self, vm_config: &VmConfig) -> Result<(), VmError>;
}

#[async_trait]
pub trait CmdRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<(), VmError>;
}
