use super::LinkChannel;
use async_trait::async_trait;
use pairkit_lib::{PairkitError, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum frame size (handshake messages are a few KB, batches somewhat more)
const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// A [`LinkChannel`] over any byte stream.
///
/// Frames are UTF-8 text behind a 4-byte big-endian length prefix.
pub struct StreamChannel<S> {
    stream: S,
    closed: bool,
}

impl<S> StreamChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

#[async_trait]
impl<S> LinkChannel for StreamChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, frame: String) -> Result<()> {
        if self.closed {
            return Err(PairkitError::Transport("channel is closed".into()));
        }
        if frame.len() > MAX_FRAME_SIZE {
            return Err(PairkitError::Transport(format!(
                "Frame too large: {} bytes (max {})",
                frame.len(),
                MAX_FRAME_SIZE
            )));
        }

        let len = (frame.len() as u32).to_be_bytes();
        self.stream.write_all(&len).await.map_err(|e| {
            PairkitError::Transport(format!("Failed to write frame length: {}", e))
        })?;
        self.stream
            .write_all(frame.as_bytes())
            .await
            .map_err(|e| PairkitError::Transport(format!("Failed to write frame: {}", e)))?;
        self.stream
            .flush()
            .await
            .map_err(|e| PairkitError::Transport(format!("Failed to flush frame: {}", e)))?;

        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<String>> {
        if self.closed {
            return Ok(None);
        }

        let mut len_bytes = [0u8; 4];
        match self.stream.read_exact(&mut len_bytes).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => {
                return Err(PairkitError::Transport(format!(
                    "Failed to read frame length: {}",
                    e
                )))
            }
        }
        let len = u32::from_be_bytes(len_bytes) as usize;

        // Reject before allocating
        if len > MAX_FRAME_SIZE {
            return Err(PairkitError::Transport(format!(
                "Frame too large: {} bytes (max {})",
                len, MAX_FRAME_SIZE
            )));
        }

        let mut buf = vec![0u8; len];
        self.stream
            .read_exact(&mut buf)
            .await
            .map_err(|e| PairkitError::Transport(format!("Failed to read frame: {}", e)))?;

        String::from_utf8(buf)
            .map(Some)
            .map_err(|_| PairkitError::Transport("frame is not valid UTF-8".into()))
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.stream.shutdown().await {
            tracing::debug!("shutdown after close failed: {}", e);
        }
    }
}
