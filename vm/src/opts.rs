use crate::VmError;

/// What the user asked for on one `start`. Empty strings mean "not given".
#[derive(Clone, Default, PartialEq, Eq)]
pub struct StartOpts {
    /// In MB.
    pub memory: Option<u64>,
    pub cpus: Option<u32>,
    pub services: String,
    pub domain: String,
    pub ip: String,
    pub registries: String,
    pub master_password: String,
    pub provision: bool,
    pub no_provision: bool,
    pub print_ca: bool,
    pub target: bool,
}

impl std::fmt::Debug for StartOpts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartOpts")
            .field("memory", &self.memory)
            .field("cpus", &self.cpus)
            .field("services", &self.services)
            .field("domain", &self.domain)
            .field("ip", &self.ip)
            .field("registries", &self.registries)
            .field("master_password", &!self.master_password.is_empty())
            .field("provision", &self.provision)
            .field("no_provision", &self.no_provision)
            .field("print_ca", &self.print_ca)
            .field("target", &self.target)
            .finish()
    }
}

impl StartOpts {
    /// Rejects every option that only makes sense before the VM exists.
    pub(crate) fn check_unchanged(&self) -> Result<(), VmError> {
        if self.memory.is_some() {
            return Err(VmError::MemoryChanged);
        }
        if self.cpus.is_some() {
            return Err(VmError::CoresChanged);
        }
        if !self.services.is_empty() {
            return Err(VmError::ServicesChanged);
        }
        if !self.domain.is_empty() {
            return Err(VmError::DomainChanged);
        }
        if !self.ip.is_empty() {
            return Err(VmError::IpChanged);
        }
        if !self.registries.is_empty() {
            return Err(VmError::RegistriesChanged);
        }
        Ok(())
    }

    pub(crate) fn registry_list(&self) -> Vec<String> {
        self.registries
            .split(',')
            .map(str::trim)
            .filter(|registry| !registry.is_empty())
            .map(str::to_string)
            .collect()
    }
}

pub(crate) fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}
