use russh::{Channel, ChannelMsg, client::Msg};
use std::sync::Arc;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc,
};
use tracing::{debug, info, instrument};

use crate::{
    SshError,
    connect::ClientHandle,
    terminal::{RawModeGuard, ResizeWatcher, Terminal},
};

const DEFAULT_SIZE: (u16, u16) = (80, 24);

/// Interactive shell on a pty, with local raw mode and live window resizing.
///
/// The raw-mode guard and the resize watcher are both released before this
/// returns, whichever way the session ends.
#[instrument(skip_all)]
pub(crate) async fn interactive(
    handle: &ClientHandle,
    terminal: Arc<dyn Terminal>,
    stdin: &mut (dyn AsyncRead + Unpin + Send),
    stdout: &mut (dyn AsyncWrite + Unpin + Send),
    stderr: &mut (dyn AsyncWrite + Unpin + Send),
) -> Result<Option<u32>, SshError> {
    let mut channel = handle.channel_open_session().await?;

    let (cols, rows) = terminal.size().unwrap_or(DEFAULT_SIZE);
    channel
        .request_pty(
            false,
            &terminal.term(),
            cols.into(),
            rows.into(),
            0,
            0,
            &[],
        )
        .await?;
    channel.request_shell(true).await?;

    let _raw_mode = RawModeGuard::enter(terminal.clone())?;

    let (resize_tx, mut resize_rx) = mpsc::channel(4);
    let watcher = ResizeWatcher::spawn(terminal, resize_tx)?;

    let result = pump(&mut channel, &mut resize_rx, stdin, stdout, stderr).await;

    watcher.stop().await;

    info!(exit_status = ?result.as_ref().ok(), "Remote session ended");

    result
}

async fn pump(
    channel: &mut Channel<Msg>,
    resizes: &mut mpsc::Receiver<(u16, u16)>,
    stdin: &mut (dyn AsyncRead + Unpin + Send),
    stdout: &mut (dyn AsyncWrite + Unpin + Send),
    stderr: &mut (dyn AsyncWrite + Unpin + Send),
) -> Result<Option<u32>, SshError> {
    let mut stdin_buf = vec![0u8; 4096];
    let mut stdin_open = true;
    let mut exit_status = None;

    loop {
        tokio::select! {
            read = stdin.read(&mut stdin_buf), if stdin_open => {
                match read? {
                    0 => {
                        stdin_open = false;
                        channel.eof().await?;
                    }
                    n => channel.data(&stdin_buf[..n]).await?,
                }
            }

            Some((cols, rows)) = resizes.recv() => {
                debug!(cols, rows, "Forwarding window change");
                channel.window_change(cols.into(), rows.into(), 0, 0).await?;
            }

            msg = channel.wait() => {
                match msg {
                    Some(ChannelMsg::Data { data }) => {
                        stdout.write_all(&data).await?;
                        stdout.flush().await?;
                    }
                    Some(ChannelMsg::ExtendedData { data, ext: 1 }) => {
                        stderr.write_all(&data).await?;
                        stderr.flush().await?;
                    }
                    Some(ChannelMsg::ExitStatus { exit_status: status }) => {
                        exit_status = Some(status);
                    }
                    Some(ChannelMsg::Close) | None => break,
                    _ => {}
                }
            }
        }
    }

    Ok(exit_status)
}
