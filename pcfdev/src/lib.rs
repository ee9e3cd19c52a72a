mod cert_store;
mod cmd_runner;
mod log_fetcher;
mod ui;

pub use crate::cert_store::PemCertStore;
pub use crate::cmd_runner::ProcessCmdRunner;
pub use crate::log_fetcher::SshLogFetcher;
pub use crate::ui::TerminalUi;

use clap::{Args, Parser, Subcommand};
use pcfdev_config::{Config, ConfigError, Environment};
use pcfdev_fs::{Fs, LocalFs};
use pcfdev_ssh::{DetachedStdin, Ssh, SshClient, SshError, StdTerminal};
use pcfdev_vbox::{Hypervisor, VBox};
use pcfdev_vboxdriver::{DriverError, VBoxDriver};
use pcfdev_vm::{Builder, StartOpts, Ui, Vm, VmBuilder, VmContext, VmError};
use std::sync::Arc;
use sysinfo::System;
use thiserror::Error;
use tracing::debug;

const MB: u64 = 1024 * 1024;

#[derive(Parser, Debug)]
#[command(name = "pcfdev", version, about = "Run PCF Dev in a local VirtualBox VM")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(long = "log", global = true, default_value = "warn")]
    pub log: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import if needed, boot and provision the VM
    Start(StartArgs),
    /// Power the VM off
    Stop,
    /// Save the VM state to disk
    Suspend,
    /// Restore a suspended VM
    Resume,
    /// Print the VM state
    Status,
    /// Trust the VM's certificate authority
    Trust {
        /// Print the CA certificate instead of storing it
        #[arg(long = "print-ca")]
        print_ca: bool,
    },
    /// Open an interactive shell in the VM
    Ssh,
    /// Log the cf CLI in to PCF Dev
    Target,
    /// Collect debug logs from the VM
    Debug,
    /// Remove every PCF Dev VM
    Destroy,
}

#[derive(Args, Debug, Default)]
pub struct StartArgs {
    /// Memory in MB
    #[arg(short = 'm', long = "memory")]
    pub memory: Option<u64>,

    #[arg(short = 'c', long = "cpus")]
    pub cpus: Option<u32>,

    /// Comma-separated services, e.g. "all", "default" or "redis,scs"
    #[arg(short = 's', long = "services", default_value = "")]
    pub services: String,

    #[arg(short = 'd', long = "domain", default_value = "")]
    pub domain: String,

    #[arg(short = 'i', long = "ip", default_value = "")]
    pub ip: String,

    /// Comma-separated insecure docker registries
    #[arg(short = 'r', long = "registries", default_value = "")]
    pub registries: String,

    #[arg(
        short = 'x',
        long = "master-password",
        env = "PCFDEV_MASTER_PASSWORD",
        default_value = "",
        hide_env_values = true
    )]
    pub master_password: String,

    /// Boot without provisioning
    #[arg(short = 'n', long = "no-provision", conflicts_with = "provision")]
    pub no_provision: bool,

    /// Provision an already running VM
    #[arg(short = 'p', long = "provision")]
    pub provision: bool,

    /// Log the cf CLI in once started
    #[arg(short = 't', long = "target")]
    pub target: bool,
}

impl From<StartArgs> for StartOpts {
    fn from(args: StartArgs) -> Self {
        let StartArgs {
            memory,
            cpus,
            services,
            domain,
            ip,
            registries,
            master_password,
            no_provision,
            provision,
            target,
        } = args;
        StartOpts {
            memory,
            cpus,
            services,
            domain,
            ip,
            registries,
            master_password,
            provision,
            no_provision,
            print_ca: false,
            target,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Vm(#[from] VmError),

    #[error(transparent)]
    Ssh(#[from] SshError),
}

/// Available host memory in MB.
pub fn free_memory() -> u64 {
    let mut system = System::new();
    system.refresh_memory();
    system.available_memory() / MB
}

/// The assembled collaborators for one invocation.
pub struct App {
    vm_name: String,
    hypervisor: Arc<dyn Hypervisor>,
    ui: Arc<dyn Ui>,
    builder: Arc<dyn VmBuilder>,
}

impl App {
    pub fn new(env: &Environment, config: Arc<Config>) -> Result<Self, AppError> {
        let fs: Arc<dyn Fs> = Arc::new(LocalFs);
        let ssh: Arc<dyn SshClient> = Arc::new(Ssh::new(Arc::new(StdTerminal::new(
            env.term.clone(),
        ))));
        let driver = Arc::new(VBoxDriver::locate()?);
        let hypervisor: Arc<dyn Hypervisor> = Arc::new(VBox::new(
            driver,
            ssh.clone(),
            fs.clone(),
            config.clone(),
        ));
        let ui: Arc<dyn Ui> = Arc::new(TerminalUi::stdio());

        let ctx = Arc::new(VmContext {
            config: config.clone(),
            hypervisor: hypervisor.clone(),
            ssh: ssh.clone(),
            fs: fs.clone(),
            ui: ui.clone(),
            cert_store: Arc::new(PemCertStore::new(
                fs.clone(),
                PemCertStore::default_path(&config),
            )),
            log_fetcher: Arc::new(SshLogFetcher::new(ssh, fs, config.clone())),
            cmd_runner: Arc::new(ProcessCmdRunner),
        });

        Ok(Self {
            vm_name: config.vm_name.clone(),
            hypervisor,
            ui,
            builder: Arc::new(Builder::new(ctx)),
        })
    }

    async fn vm(&self) -> Result<Box<dyn Vm>, VmError> {
        let vm = self.builder.vm(&self.vm_name).await?;
        debug!(vm = %self.vm_name, status = vm.status(), "Built VM");
        Ok(vm)
    }

    pub async fn execute(&self, command: Command) -> Result<(), AppError> {
        match command {
            Command::Start(args) => {
                let opts = StartOpts::from(args);
                self.vm().await?.start(&opts).await?;
                if opts.target {
                    self.vm().await?.target(true).await?;
                }
            }
            Command::Stop => self.vm().await?.stop().await?,
            Command::Suspend => self.vm().await?.suspend().await?,
            Command::Resume => self.vm().await?.resume().await?,
            Command::Status => self.ui.say(self.vm().await?.status()),
            Command::Trust { print_ca } => {
                let opts = StartOpts {
                    print_ca,
                    ..Default::default()
                };
                self.vm().await?.trust(&opts).await?;
            }
            Command::Ssh => {
                let vm = self.vm().await?;
                // A blocked stdin read must not keep the process alive once
                // the remote shell exits.
                let mut stdin = DetachedStdin::spawn().map_err(SshError::Io)?;
                vm.ssh(
                    &mut stdin,
                    &mut tokio::io::stdout(),
                    &mut tokio::io::stderr(),
                )
                .await?;
            }
            Command::Target => self.vm().await?.target(false).await?,
            Command::Debug => self.vm().await?.get_debug_logs().await?,
            Command::Destroy => self.destroy().await?,
        }
        Ok(())
    }

    async fn destroy(&self) -> Result<(), VmError> {
        let names = self.hypervisor.get_pcfdev_vms().await?;
        if names.is_empty() {
            self.ui.say("PCF Dev VM has not been created.");
            return Ok(());
        }
        self.ui.say("Destroying VM...");
        self.hypervisor.destroy_vms(&names).await?;
        self.ui.say("PCF Dev VM has been destroyed.");
        Ok(())
    }
}

pub async fn run(cli: Cli) -> Result<(), AppError> {
    let env = Environment::from_process();
    let config = Arc::new(Config::load(&env, free_memory()).await?);
    let app = App::new(&env, config)?;
    app.execute(cli.command).await
}
