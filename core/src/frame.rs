//! Newline-delimited framing for the request/reply transport.

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Reads one frame. `Ok(None)` means the peer closed the stream cleanly.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let limit = max_len as u64 + 1;
    let n = reader.take(limit).read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if buf.len() > max_len {
        return Err(io::Error::new(io::ErrorKind::InvalidData, format!("frame exceeds {max_len} bytes")));
    } else {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stream closed mid-frame"));
    }
    String::from_utf8(buf)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

pub async fn write_frame<W>(writer: &mut W, frame: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn reads_consecutive_frames() {
        let mut reader = BufReader::new(&b"REGISTER REQUEST\r\nQUIT\n"[..]);
        assert_eq!(read_frame(&mut reader, 64).await.unwrap().as_deref(), Some("REGISTER REQUEST"));
        assert_eq!(read_frame(&mut reader, 64).await.unwrap().as_deref(), Some("QUIT"));
        assert_eq!(read_frame(&mut reader, 64).await.unwrap(), None);
    }

    #[tokio::test]
    async fn rejects_oversized_and_truncated_frames() {
        let mut reader = BufReader::new(&b"0123456789\n"[..]);
        let err = read_frame(&mut reader, 4).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let mut reader = BufReader::new(&b"partial"[..]);
        let err = read_frame(&mut reader, 64).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn writes_newline_terminated() {
        let mut out = Vec::new();
        write_frame(&mut out, "INDEX REPLY: OK").await.unwrap();
        assert_eq!(out, b"INDEX REPLY: OK\n");
    }
}
