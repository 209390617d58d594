//! Native messaging framing: a 32-bit length in native byte order followed
//! by that many bytes of UTF-8 JSON.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::HostError;

/// Largest frame accepted from the browser.
pub const MAX_INBOUND_BYTES: usize = 64 * 1024 * 1024;

/// Browsers reject host messages above 1 MiB.
pub const MAX_OUTBOUND_BYTES: usize = 1024 * 1024;

/// Reads one frame. Returns `None` when the browser closed the channel
/// cleanly between frames.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, HostError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_ne_bytes(len_buf) as usize;
    if len > MAX_INBOUND_BYTES {
        return Err(HostError::MessageTooLarge(len));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

pub async fn write_frame<W>(writer: &mut W, body: &[u8]) -> Result<(), HostError>
where
    W: AsyncWrite + Unpin,
{
    if body.len() > MAX_OUTBOUND_BYTES {
        return Err(HostError::MessageTooLarge(body.len()));
    }

    writer.write_all(&(body.len() as u32).to_ne_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}
