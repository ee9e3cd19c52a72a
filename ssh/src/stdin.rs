use std::io::{self, Read};
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc;
use tracing::debug;

const CHUNK_SIZE: usize = 4096;

/// Stdin read on a plain thread the runtime never waits for.
///
/// `tokio::io::stdin` parks its read on the blocking pool, and a pending read
/// there holds up runtime shutdown until the next keypress. Here the reader
/// thread is detached, so an interactive session can end while stdin is still
/// open and the process exits straight away.
pub struct DetachedStdin {
    chunks: mpsc::Receiver<io::Result<Vec<u8>>>,
    pending: Vec<u8>,
    offset: usize,
}

impl DetachedStdin {
    pub fn spawn() -> io::Result<Self> {
        Self::from_reader(io::stdin())
    }

    pub fn from_reader<R: Read + Send + 'static>(mut reader: R) -> io::Result<Self> {
        let (tx, rx) = mpsc::channel(16);
        std::thread::Builder::new()
            .name("pcfdev-stdin".into())
            .spawn(move || {
                loop {
                    let mut chunk = vec![0u8; CHUNK_SIZE];
                    let read = match reader.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => {
                            chunk.truncate(n);
                            Ok(chunk)
                        }
                        Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                        Err(error) => Err(error),
                    };
                    let failed = read.is_err();
                    if tx.blocking_send(read).is_err() || failed {
                        break;
                    }
                }
                debug!("Stdin reader finished");
            })?;

        Ok(Self {
            chunks: rx,
            pending: Vec::new(),
            offset: 0,
        })
    }
}

impl AsyncRead for DetachedStdin {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            if this.offset < this.pending.len() {
                let n = buf.remaining().min(this.pending.len() - this.offset);
                buf.put_slice(&this.pending[this.offset..this.offset + n]);
                this.offset += n;
                return Poll::Ready(Ok(()));
            }
            match ready!(this.chunks.poll_recv(cx)) {
                Some(Ok(chunk)) => {
                    this.pending = chunk;
                    this.offset = 0;
                }
                Some(Err(error)) => return Poll::Ready(Err(error)),
                // Reader hit EOF.
                None => return Poll::Ready(Ok(())),
            }
        }
    }
}
