mod environment;
mod vm_config;

pub use crate::environment::Environment;
pub use crate::vm_config::{DEFAULT_DOMAIN, DEFAULT_IP, PROVIDER, VmConfig, domain_for_ip};

use serde::Deserialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::read_to_string;
use tracing::debug;

pub const VM_NAME_PREFIX: &str = "pcfdev-";
pub const DEFAULT_VM_NAME: &str = "pcfdev-v0.1.0";
pub const DEBUG_LOGS_FILE: &str = "pcfdev-debug.log";

const CONFIG_FILE: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("neither PCFDEV_HOME nor HOME is set")]
    MissingHome,

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigToml {
    vm_name: Option<String>,
    default_memory: Option<u64>,
    min_memory: Option<u64>,
    default_cpus: Option<u32>,
}

/// Host-side settings. Memory figures are in MB.
#[derive(Debug, Clone)]
pub struct Config {
    pub home_dir: PathBuf,
    pub vm_name: String,
    pub ova_path: PathBuf,
    pub private_key_path: PathBuf,
    /// Key baked into the appliance, only good until first boot swaps it out.
    pub insecure_private_key_path: PathBuf,
    pub debug_logs_path: PathBuf,
    pub default_memory: u64,
    pub min_memory: u64,
    pub default_cpus: u32,
    pub free_memory: u64,
}

impl Config {
    pub fn new(home_dir: PathBuf, free_memory: u64) -> Self {
        Self {
            vm_name: DEFAULT_VM_NAME.to_string(),
            ova_path: home_dir.join("ova").join("pcfdev.ova"),
            private_key_path: home_dir.join("key.pem"),
            insecure_private_key_path: home_dir.join("insecure.key"),
            debug_logs_path: PathBuf::from(DEBUG_LOGS_FILE),
            default_memory: 4096,
            min_memory: 3072,
            default_cpus: 2,
            free_memory,
            home_dir,
        }
    }

    /// Defaults, overridden by `config.toml` in the home directory when present.
    pub async fn load(env: &Environment, free_memory: u64) -> Result<Self, ConfigError> {
        let home_dir = env.home_dir()?;
        let overrides = Self::load_overrides(&home_dir.join(CONFIG_FILE)).await?;
        let mut config = Self::new(home_dir, free_memory);
        config.apply(overrides);
        Ok(config)
    }

    fn apply(&mut self, overrides: ConfigToml) {
        let ConfigToml {
            vm_name,
            default_memory,
            min_memory,
            default_cpus,
        } = overrides;
        if let Some(vm_name) = vm_name {
            self.vm_name = vm_name;
        }
        if let Some(default_memory) = default_memory {
            self.default_memory = default_memory;
        }
        if let Some(min_memory) = min_memory {
            self.min_memory = min_memory;
        }
        if let Some(default_cpus) = default_cpus {
            self.default_cpus = default_cpus;
        }
    }

    async fn load_overrides(path: &Path) -> Result<ConfigToml, ConfigError> {
        let string = match read_to_string(path).await {
            Ok(string) => string,
            Err(source) if source.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(ConfigToml::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_owned(),
                    source,
                });
            }
        };
        toml::from_str(&string).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }
}
