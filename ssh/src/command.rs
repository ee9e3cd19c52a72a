use russh::ChannelMsg;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, instrument};

use crate::{SshError, connect::ClientHandle};

/// Run `command` and stream its output as it arrives.
///
/// Without a separate `stderr` sink both streams land in `stdout`.
#[instrument(skip(handle, stdout, stderr))]
pub(crate) async fn exec<'a>(
    handle: &ClientHandle,
    command: &str,
    stdout: &'a mut (dyn AsyncWrite + Unpin + Send + 'a),
    mut stderr: Option<&'a mut (dyn AsyncWrite + Unpin + Send + 'a)>,
) -> Result<Option<u32>, SshError> {
    let mut channel = handle.channel_open_session().await?;

    info!("Executing remote command");
    channel.exec(true, command).await?;

    let mut exit_status = None;

    // Exit status usually follows EOF, so only Close ends the loop.
    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { data } => {
                stdout.write_all(&data).await?;
                stdout.flush().await?;
            }
            ChannelMsg::ExtendedData { data, ext: 1 } => {
                let sink: &mut (dyn AsyncWrite + Unpin + Send + 'a) =
                    match stderr.as_deref_mut() {
                        Some(stderr) => stderr,
                        None => &mut *stdout,
                    };
                sink.write_all(&data).await?;
                sink.flush().await?;
            }
            ChannelMsg::ExitStatus {
                exit_status: status,
            } => {
                debug!(status, "Remote process reported exit status");
                exit_status = Some(status);
            }
            ChannelMsg::Close => break,
            _ => {}
        }
    }

    info!(?exit_status, "Remote command completed");

    Ok(exit_status)
}
