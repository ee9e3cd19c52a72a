use std::net::Ipv4Addr;

use crate::VBoxError;

/// NAT rule carrying host traffic to the guest's SSH daemon.
pub const SSH_RULE: &str = "ssh";
pub const GUEST_SSH_PORT: u16 = 22;

/// Host side of the host-only network: the guest's /24 with `.1` as last octet.
pub(crate) fn host_ip_for(guest_ip: &str) -> Result<String, VBoxError> {
    let ip: Ipv4Addr = guest_ip.parse().map_err(|_| VBoxError::InvalidIp {
        ip: guest_ip.to_string(),
    })?;
    let [a, b, c, _] = ip.octets();
    Ok(Ipv4Addr::new(a, b, c, 1).to_string())
}

const INTERFACES_PATH: &str = "/etc/network/interfaces";

/// Appends a static address for the second NIC to the guest's interfaces file,
/// unless an eth1 stanza is already there.
pub fn network_command(ip: &str) -> String {
    stanza_command(ip, INTERFACES_PATH)
}

fn stanza_command(ip: &str, path: &str) -> String {
    format!(
        "grep -q '^auto eth1$' {path} 2>/dev/null || echo -e \"auto eth1\niface eth1 inet static\naddress {ip}\nnetmask 255.255.255.0\" | sudo tee -a {path}"
    )
}

pub(crate) fn authorize_key_command(public_key: &str) -> String {
    format!(
        "mkdir -p ~/.ssh && echo '{public_key}' >> ~/.ssh/authorized_keys && chmod 600 ~/.ssh/authorized_keys"
    )
}
