use russh::{
    client::{self, Config, Handle, Handler},
    keys::{PrivateKey, PrivateKeyWithHashAlg, decode_secret_key},
};
use std::{io, sync::Arc, time::Duration};
use tokio::{net::TcpStream, task::JoinSet, time};
use tracing::{debug, info, instrument};

use crate::{SshAddress, SshError};

const RETRY_INTERVAL: Duration = Duration::from_secs(1);
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) type ClientHandle = Handle<ClientHandler>;

#[derive(Debug, Clone)]
pub(crate) struct ClientHandler;

impl Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

pub(crate) fn parse_private_key(private_key: &[u8]) -> Result<PrivateKey, SshError> {
    decode_secret_key(&String::from_utf8_lossy(private_key), None)
        .map_err(SshError::ParsePrivateKey)
}

/// Race a retrying dial against every address; first authenticated session wins.
///
/// Losing attempts live in the [`JoinSet`] and are aborted when it drops, so a
/// late handshake can never outlive this call.
#[instrument(skip(private_key))]
pub(crate) async fn connect_any(
    addresses: &[SshAddress],
    private_key: PrivateKey,
    username: &str,
    timeout: Duration,
) -> Result<ClientHandle, SshError> {
    let private_key = Arc::new(private_key);
    let config = Arc::new(Config::default());

    let mut attempts = JoinSet::new();
    for address in addresses {
        attempts.spawn(dial_with_retry(
            address.clone(),
            config.clone(),
            private_key.clone(),
            username.to_string(),
        ));
    }

    let first = async {
        while let Some(joined) = attempts.join_next().await {
            match joined {
                Ok(handle) => return Some(handle),
                Err(error) => debug!(%error, "Dial task ended without a connection"),
            }
        }
        None
    };

    let winner = time::timeout(timeout, first).await;
    attempts.abort_all();

    match winner {
        Ok(Some(handle)) => Ok(handle),
        Ok(None) | Err(_) => Err(SshError::Timeout { timeout }),
    }
}

async fn dial_with_retry(
    address: SshAddress,
    config: Arc<Config>,
    private_key: Arc<PrivateKey>,
    username: String,
) -> ClientHandle {
    loop {
        match dial(&address, config.clone(), private_key.clone(), &username).await {
            Ok(handle) => {
                info!(%address, "SSH connection established");
                return handle;
            }
            Err(error) => debug!(%address, %error, "SSH dial failed, retrying"),
        }
        time::sleep(RETRY_INTERVAL).await;
    }
}

async fn dial(
    address: &SshAddress,
    config: Arc<Config>,
    private_key: Arc<PrivateKey>,
    username: &str,
) -> Result<ClientHandle, SshError> {
    let stream = time::timeout(
        ATTEMPT_TIMEOUT,
        TcpStream::connect((address.host.as_str(), address.port)),
    )
    .await
    .map_err(|_| io::Error::from(io::ErrorKind::TimedOut))??;

    let mut handle = client::connect_stream(config, stream, ClientHandler).await?;

    let auth = handle
        .authenticate_publickey(username, PrivateKeyWithHashAlg::new(private_key, None))
        .await?;

    if !auth.success() {
        return Err(SshError::AuthFailed);
    }

    Ok(handle)
}
