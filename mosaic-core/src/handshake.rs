//! Per-connection session preamble.
//!
//! # Wire Protocol
//!
//! ```text
//! Transmitter ──[identity: 50 bytes, UTF-8, NUL-padded]───► Receiver
//! Transmitter ──[filename: 100 bytes, UTF-8, NUL-padded]──► Receiver
//! Transmitter ──[frame_size: u32 big-endian]──────────────► Receiver
//! Transmitter ──[frame × N, frame_size bytes each]────────► Receiver
//! ```
//!
//! The receiver reads each field with exact lengths and never touches the
//! stream past the 154-byte preamble until the frame size is validated.

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{HandshakeField, MosaicError, ProtocolError};
use crate::frame::HEADER_SIZE;

pub const IDENTITY_LEN: usize = 50;
pub const FILENAME_LEN: usize = 100;
pub const FRAME_SIZE_LEN: usize = 4;

/// Total preamble length on the wire.
pub const HANDSHAKE_LEN: usize = IDENTITY_LEN + FILENAME_LEN + FRAME_SIZE_LEN;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    identity: String,
    filename: String,
    frame_size: u32,
}

impl Handshake {
    /// Validate and build a handshake.
    pub fn new(
        identity: impl Into<String>,
        filename: impl Into<String>,
        frame_size: u32,
    ) -> Result<Self, ProtocolError> {
        let identity = identity.into();
        let filename = filename.into();
        check_width(HandshakeField::Identity, &identity, IDENTITY_LEN)?;
        check_width(HandshakeField::Filename, &filename, FILENAME_LEN)?;
        check_frame_size(frame_size)?;
        Ok(Self {
            identity,
            filename,
            frame_size,
        })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Total bytes per frame, header included.
    pub fn frame_size(&self) -> u32 {
        self.frame_size
    }

    pub fn payload_size(&self) -> usize {
        self.frame_size as usize - HEADER_SIZE
    }

    /// Serialize the fixed-width preamble.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(HANDSHAKE_LEN);
        put_padded(&mut buf, &self.identity, IDENTITY_LEN);
        put_padded(&mut buf, &self.filename, FILENAME_LEN);
        buf.put_u32(self.frame_size);
        buf
    }

    /// Send the preamble over an established connection.
    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), MosaicError>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(&self.encode()).await?;
        Ok(())
    }

    /// Read and validate the preamble. Consumes exactly [`HANDSHAKE_LEN`]
    /// bytes on success, or fewer if the peer closed early.
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, MosaicError>
    where
        R: AsyncRead + Unpin,
    {
        let mut identity = [0u8; IDENTITY_LEN];
        read_field(reader, &mut identity, HandshakeField::Identity).await?;
        let identity = decode_padded(&identity, HandshakeField::Identity)?;

        let mut filename = [0u8; FILENAME_LEN];
        read_field(reader, &mut filename, HandshakeField::Filename).await?;
        let filename = decode_padded(&filename, HandshakeField::Filename)?;

        let mut size = [0u8; FRAME_SIZE_LEN];
        read_field(reader, &mut size, HandshakeField::FrameSize).await?;
        let frame_size = u32::from_be_bytes(size);
        check_frame_size(frame_size)?;

        Ok(Self {
            identity,
            filename,
            frame_size,
        })
    }
}

fn check_width(field: HandshakeField, value: &str, max: usize) -> Result<(), ProtocolError> {
    if value.len() > max {
        return Err(ProtocolError::FieldTooLong {
            field,
            len: value.len(),
            max,
        });
    }
    Ok(())
}

fn check_frame_size(frame_size: u32) -> Result<(), ProtocolError> {
    if frame_size as usize <= HEADER_SIZE {
        return Err(ProtocolError::FrameSizeTooSmall {
            frame_size,
            header: HEADER_SIZE,
        });
    }
    Ok(())
}

fn put_padded(buf: &mut BytesMut, value: &str, width: usize) {
    buf.put_slice(value.as_bytes());
    buf.put_bytes(0, width - value.len());
}

fn decode_padded(raw: &[u8], field: HandshakeField) -> Result<String, ProtocolError> {
    let text = std::str::from_utf8(raw).map_err(|_| ProtocolError::InvalidUtf8 { field })?;
    Ok(text.trim_matches('\0').to_string())
}

/// Fill `buf` completely, tracking how much arrived before a close.
async fn read_field<R>(
    reader: &mut R,
    buf: &mut [u8],
    field: HandshakeField,
) -> Result<(), MosaicError>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(ProtocolError::HandshakeTruncated {
                field,
                received: filled,
                expected: buf.len(),
            }
            .into());
        }
        filled += n;
    }
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────
