use std::{
    fmt::Display,
    net::{Ipv4Addr, TcpListener},
};

use crate::SshError;

pub const LOOPBACK: &str = "127.0.0.1";

/// One path to the guest's SSH daemon.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SshAddress {
    pub host: String,
    pub port: u16,
}

impl SshAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Display for SshAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Loopback address on a port which was free a moment ago.
pub fn generate_address() -> Result<SshAddress, SshError> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
    let port = listener.local_addr()?.port();
    Ok(SshAddress::new(LOOPBACK, port))
}
