use base64ct::LineEnding;
use russh::keys::ssh_key::{private::Ed25519Keypair, rand_core::OsRng};
use russh::keys::{PrivateKey, PublicKey};
use tracing::debug;

use crate::SshError;

/// Freshly generated key material, both halves already encoded for disk.
#[derive(Clone)]
pub struct SshKeypair {
    /// OpenSSH PEM.
    pub private_key: Vec<u8>,
    /// `authorized_keys` line, newline terminated.
    pub public_key: Vec<u8>,
}

impl std::fmt::Debug for SshKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshKeypair")
            .field("public_key", &String::from_utf8_lossy(&self.public_key))
            .finish_non_exhaustive()
    }
}

impl SshKeypair {
    #[tracing::instrument]
    pub fn generate() -> Result<Self, SshError> {
        let ed25519 = Ed25519Keypair::random(&mut OsRng);
        let private_key = PrivateKey::from(ed25519);
        let public_key = authorized_key(private_key.public_key())?;
        let private_key = private_key.to_openssh(LineEnding::default())?;
        debug!("Created new SSH keypair");
        Ok(Self {
            private_key: private_key.as_bytes().to_vec(),
            public_key,
        })
    }
}

pub fn authorized_key(public_key: &PublicKey) -> Result<Vec<u8>, SshError> {
    let mut line = public_key.to_openssh()?;
    line.push('\n');
    Ok(line.into_bytes())
}
