use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

const LINE_DELIMITER: u8 = b'\n';

/// Trims a raw line and rejects it when nothing is left.
///
/// Every line that enters a hub, whether read from a peer or injected by the
/// owning process, goes through here first.
pub fn normalize(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Reads lines until one survives [`normalize`] and returns it.
///
/// Returns `Ok(None)` once the peer closes its side. Invalid UTF-8 is replaced
/// rather than treated as an error, so a noisy peer cannot break its own
/// connection with a stray byte.
pub async fn read_message<R>(reader: &mut R) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        let bytes = reader.read_until(LINE_DELIMITER, &mut buffer).await?;
        if bytes == 0 {
            return Ok(None);
        }

        let line = String::from_utf8_lossy(&buffer);
        if let Some(message) = normalize(&line) {
            return Ok(Some(message.to_string()));
        }
    }
}

/// Writes one line followed by `\n` and flushes it.
pub async fn write_message<W>(writer: &mut W, message: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    // Single write so concurrent readers on the other end never see half a line.
    let mut encoded = Vec::with_capacity(message.len() + 1);
    encoded.extend_from_slice(message.as_bytes());
    encoded.push(LINE_DELIMITER);
    writer.write_all(&encoded).await?;
    writer.flush().await
}
