//! Commands sent to the guest.

use pcfdev_config::VmConfig;
use serde::Serialize;
use shell_escape::unix::escape;
use std::borrow::Cow;

use crate::{StartOpts, VmError, services::normalize_services};

pub(crate) const CA_CERT_COMMAND: &str = "cat /var/pcfdev/openssl/ca_cert.pem";
pub(crate) const HEALTHCHECK_COMMAND: &str = "test -f /run/pcfdev-healthcheck";
pub(crate) const REMOVE_HEALTHCHECK_COMMAND: &str = "sudo rm -f /run/pcfdev-healthcheck";

const OPTIONS_PATH: &str = "/var/pcfdev/provision-options.json";
const PROVISION_SCRIPT: &str = "/var/pcfdev/provision";

#[derive(Debug, Serialize)]
struct ProvisionOptions<'a> {
    domain: &'a str,
    ip: &'a str,
    services: String,
    registries: Vec<String>,
    provider: &'a str,
}

/// Writes the provisioning options document read by the guest's provision script.
pub(crate) fn options_command(vm_config: &VmConfig, opts: &StartOpts) -> Result<String, VmError> {
    let options = ProvisionOptions {
        domain: &vm_config.domain,
        ip: &vm_config.ip,
        services: normalize_services(&opts.services),
        registries: opts.registry_list(),
        provider: &vm_config.provider,
    };
    let json = serde_json::to_string(&options).map_err(VmError::ProvisionOptions)?;
    Ok(format!(
        "echo {} | sudo tee {OPTIONS_PATH} >/dev/null",
        escape(Cow::from(json))
    ))
}

pub(crate) fn provision_command(master_password: &str) -> String {
    if master_password.is_empty() {
        format!("sudo -H {PROVISION_SCRIPT}")
    } else {
        format!(
            "sudo -H {PROVISION_SCRIPT} {}",
            escape(Cow::from(master_password))
        )
    }
}
