use crate::circular_buffer::RingBuffer;
use crate::config::Config;
use crate::error::Error;
use futures::future::join;
use log::{info, warn};
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::time::{sleep_until, Instant};

/// Output of one stream, capped at the buffer's capacity.
#[derive(Debug)]
pub struct StreamCapture {
    pub buffer: RingBuffer,
    /// Everything the stream produced, kept or not.
    pub total_bytes: u64,
    pub dropped_bytes: u64,
}

impl StreamCapture {
    pub fn new(capacity: usize) -> Result<Self, Error> {
        Ok(Self {
            buffer: RingBuffer::new(capacity)?,
            total_bytes: 0,
            dropped_bytes: 0,
        })
    }

    pub fn captured(&self) -> Vec<u8> {
        self.buffer.bytes()
    }

    pub fn truncated(&self) -> bool {
        self.dropped_bytes > 0
    }

    fn push(&mut self, chunk: &[u8]) {
        self.total_bytes += chunk.len() as u64;
        if let Err(e) = self.buffer.write(chunk) {
            if self.dropped_bytes == 0 {
                warn!(
                    "capture budget of {} bytes exhausted, dropping further output",
                    self.buffer.capacity()
                );
            }
            self.dropped_bytes += (chunk.len() - e.written()) as u64;
        }
    }
}

/// Drain `reader` to EOF into `capture`.
///
/// Keeps reading after the buffer fills up so the writer on the other end of
/// a pipe never stalls; the excess is only counted.
pub async fn capture_into<R>(
    mut reader: R,
    capture: &mut StreamCapture,
    chunk_size: usize,
) -> Result<(), Error>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = vec![0u8; chunk_size.max(1)];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => capture.push(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[derive(Debug)]
pub struct CommandCapture {
    pub stdout: StreamCapture,
    /// `None` when stderr was left attached to the parent.
    pub stderr: Option<StreamCapture>,
    /// `None` if the child was killed at the deadline.
    pub status: Option<ExitStatus>,
    pub timed_out: bool,
}

/// Run `program` and capture its output under the configured byte budget.
pub async fn run_command(
    program: &str,
    args: &[String],
    cfg: &Config,
) -> Result<CommandCapture, Error> {
    let mut cfg = cfg.clone();
    let capacity = cfg.validate()?;
    let chunk_size = cfg.chunk_size;

    let mut stdout = StreamCapture::new(capacity)?;
    let mut stderr = if cfg.capture_stderr {
        Some(StreamCapture::new(capacity)?)
    } else {
        None
    };

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(if cfg.capture_stderr {
            Stdio::piped()
        } else {
            Stdio::inherit()
        })
        .kill_on_drop(true)
        .spawn()?;
    info!("Spawned '{}' (pid {:?})", program, child.id());

    let stdout_pipe = child.stdout.take().ok_or(Error::Unexpected)?;
    let stderr_pipe = child.stderr.take();

    let status = {
        let work = async {
            let drain_stderr = async {
                match (stderr_pipe, stderr.as_mut()) {
                    (Some(pipe), Some(capture)) => capture_into(pipe, capture, chunk_size).await,
                    _ => Ok(()),
                }
            };
            let (out_res, err_res) =
                join(capture_into(stdout_pipe, &mut stdout, chunk_size), drain_stderr).await;
            out_res?;
            err_res?;
            let status = child.wait().await?;
            Ok::<_, Error>(status)
        };

        if cfg.timeout_ms == 0 {
            Some(work.await?)
        } else {
            let deadline = Instant::now() + Duration::from_millis(cfg.timeout_ms);
            let sleep = sleep_until(deadline);
            tokio::pin!(sleep);
            tokio::pin!(work);
            tokio::select! {
                res = &mut work => Some(res?),
                _ = &mut sleep => None,
            }
        }
    };

    let timed_out = status.is_none();
    if timed_out {
        warn!("'{}' exceeded {} ms, killing it", program, cfg.timeout_ms);
        child.kill().await?;
    }

    info!(
        "'{}' finished ({:?}): kept {} of {} stdout bytes",
        program,
        status,
        stdout.buffer.len(),
        stdout.total_bytes
    );

    Ok(CommandCapture {
        stdout,
        stderr,
        status,
        timed_out,
    })
}
