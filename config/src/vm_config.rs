use crate::Config;

pub const DEFAULT_IP: &str = "192.168.11.11";
pub const DEFAULT_DOMAIN: &str = "local.pcfdev.io";
pub const PROVIDER: &str = "virtualbox";

/// Identity and static facts about one guest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmConfig {
    pub name: String,
    pub domain: String,
    pub ip: String,
    pub ssh_port: Option<u16>,
    /// In MB.
    pub memory: u64,
    pub cpus: u32,
    pub provider: String,
}

impl VmConfig {
    /// Config for a VM that does not exist yet, with overrides applied on top of defaults.
    pub fn for_import(
        config: &Config,
        memory: Option<u64>,
        cpus: Option<u32>,
        ip: Option<&str>,
        domain: Option<&str>,
    ) -> Self {
        let ip = ip.unwrap_or(DEFAULT_IP).to_string();
        let domain = domain
            .map(str::to_string)
            .unwrap_or_else(|| domain_for_ip(&ip));
        Self {
            name: config.vm_name.clone(),
            domain,
            ip,
            ssh_port: None,
            memory: memory.unwrap_or(config.default_memory),
            cpus: cpus.unwrap_or(config.default_cpus),
            provider: PROVIDER.to_string(),
        }
    }
}

pub fn domain_for_ip(ip: &str) -> String {
    if ip == DEFAULT_IP {
        DEFAULT_DOMAIN.to_string()
    } else {
        format!("{ip}.xip.io")
    }
}
