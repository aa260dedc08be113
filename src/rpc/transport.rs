//! Content-Length header framing, as used by LSP stdio transports.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use super::error::Error;
use super::message::Message;

const CONTENT_LENGTH: &str = "Content-Length: ";

/// Read one framed message. Returns `None` on a clean EOF.
pub async fn read_message<R>(reader: &mut BufReader<R>) -> Result<Option<Message>, Error>
where
    R: AsyncRead + Unpin,
{
    let mut content_length: Option<usize> = None;

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        if line == "\r\n" {
            break;
        }
        if let Some(value) = line.strip_prefix(CONTENT_LENGTH) {
            content_length = Some(
                value
                    .trim()
                    .parse()
                    .map_err(|e| Error::parse(format!("invalid Content-Length: {e}")))?,
            );
        }
    }

    let content_length =
        content_length.ok_or_else(|| Error::parse("missing Content-Length header"))?;

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).await?;

    Ok(Some(serde_json::from_slice(&body)?))
}

/// Frame and write one message.
pub async fn write_message<W>(writer: &mut W, message: &Message) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(message)?;
    let header = format!("{CONTENT_LENGTH}{}\r\n\r\n", body.len());
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}
