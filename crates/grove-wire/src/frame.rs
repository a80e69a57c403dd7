//! Length-prefixed framing over async byte channels.
//!
//! Every message is `[u32 length][payload]`, length in network byte
//! order. A zero-length frame is valid (the unit response). EOF exactly on
//! a frame boundary is a clean close; EOF anywhere else is a short read.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::codec::Wire;
use crate::error::{WireError, WireResult};

/// Default cap on a single frame's payload.
pub const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Write one frame carrying `payload`.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> WireResult<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_FRAME_BYTES {
        return Err(WireError::FrameTooLarge {
            size: payload.len(),
            max: MAX_FRAME_BYTES,
        });
    }
    writer.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Encode `message` and write it as one frame.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> WireResult<()>
where
    W: AsyncWrite + Unpin,
    T: Wire,
{
    write_frame(writer, &message.to_bytes()).await
}

/// Read one frame's payload.
///
/// Returns `Ok(None)` on a clean close (EOF before any header byte).
/// EOF inside the header or body is `ShortRead`; a declared length above
/// `max_frame_bytes` fails before any body allocation.
pub async fn read_frame<R>(reader: &mut R, max_frame_bytes: usize) -> WireResult<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    let mut filled = 0usize;
    while filled < header.len() {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(WireError::ShortRead);
        }
        filled += n;
    }

    let length = u32::from_be_bytes(header) as usize;
    if length > max_frame_bytes {
        return Err(WireError::FrameTooLarge {
            size: length,
            max: max_frame_bytes,
        });
    }

    let mut payload = vec![0u8; length];
    if length > 0 {
        reader
            .read_exact(&mut payload)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::UnexpectedEof => WireError::ShortRead,
                _ => WireError::Io(e),
            })?;
    }
    Ok(Some(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn frame_roundtrip() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"hello").await.unwrap();

        let mut reader = Cursor::new(buf);
        let payload = read_frame(&mut reader, MAX_FRAME_BYTES).await.unwrap();
        assert_eq!(payload.as_deref(), Some(&b"hello"[..]));
    }

    #[tokio::test]
    async fn zero_length_frame_roundtrips() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"").await.unwrap();
        assert_eq!(buf, vec![0, 0, 0, 0]);

        let mut reader = Cursor::new(buf);
        let payload = read_frame(&mut reader, MAX_FRAME_BYTES).await.unwrap();
        assert_eq!(payload, Some(vec![]));
    }

    #[tokio::test]
    async fn eof_at_boundary_is_clean_close() {
        let mut reader = Cursor::new(Vec::<u8>::new());
        let out = read_frame(&mut reader, MAX_FRAME_BYTES).await.unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn eof_mid_header_is_short_read() {
        let mut reader = Cursor::new(vec![0u8, 0]);
        let err = read_frame(&mut reader, MAX_FRAME_BYTES).await.unwrap_err();
        assert!(matches!(err, WireError::ShortRead));
    }

    #[tokio::test]
    async fn eof_mid_body_is_short_read() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"hello").await.unwrap();
        buf.truncate(buf.len() - 2);

        let mut reader = Cursor::new(buf);
        let err = read_frame(&mut reader, MAX_FRAME_BYTES).await.unwrap_err();
        assert!(matches!(err, WireError::ShortRead));
    }

    #[tokio::test]
    async fn oversized_declared_length_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(1024u32).to_be_bytes());
        let mut reader = Cursor::new(buf);
        let err = read_frame(&mut reader, 16).await.unwrap_err();
        assert!(matches!(err, WireError::FrameTooLarge { size: 1024, max: 16 }));
    }

    #[tokio::test]
    async fn oversized_payload_is_rejected_on_write() {
        let payload = vec![0u8; MAX_FRAME_BYTES + 1];
        let mut buf = Vec::new();
        let err = write_frame(&mut buf, &payload).await.unwrap_err();
        assert!(matches!(err, WireError::FrameTooLarge { .. }));
    }

    #[tokio::test]
    async fn back_to_back_frames() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"one").await.unwrap();
        write_frame(&mut buf, b"").await.unwrap();
        write_frame(&mut buf, b"three").await.unwrap();

        let mut reader = Cursor::new(buf);
        assert_eq!(
            read_frame(&mut reader, MAX_FRAME_BYTES).await.unwrap(),
            Some(b"one".to_vec())
        );
        assert_eq!(
            read_frame(&mut reader, MAX_FRAME_BYTES).await.unwrap(),
            Some(vec![])
        );
        assert_eq!(
            read_frame(&mut reader, MAX_FRAME_BYTES).await.unwrap(),
            Some(b"three".to_vec())
        );
        assert!(read_frame(&mut reader, MAX_FRAME_BYTES).await.unwrap().is_none());
    }
}
