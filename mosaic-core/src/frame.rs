//! Fixed-length grid frames.
//!
//! ## Wire format
//!
//! **Frame header** (10 bytes, big-endian):
//! ```text
//! frame_index:   u16  (2)   informational ordinal, never used for placement
//! row:           u16  (2)
//! col:           u16  (2)
//! total_frames:  u16  (2)
//! reserved:      u16  (2)   zero on send, ignored on receive
//! ```
//!
//! The header is followed by `frame_size - 10` payload bytes. The final
//! chunk of an image is zero-padded up to that length.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

/// Encoded size of a frame header.
pub const HEADER_SIZE: usize = 10;

/// Largest value any header field can carry.
pub const MAX_FIELD_VALUE: usize = u16::MAX as usize;

// ── GridPos ──────────────────────────────────────────────────────

/// A chunk's `(row, col)` address in the image grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridPos {
    pub row: u16,
    pub col: u16,
}

impl GridPos {
    pub fn new(row: u16, col: u16) -> Self {
        Self { row, col }
    }
}

impl std::fmt::Display for GridPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(R:{}, C:{})", self.row, self.col)
    }
}

// ── FrameHeader ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub frame_index: u16,
    pub row: u16,
    pub col: u16,
    pub total_frames: u16,
}

impl FrameHeader {
    /// Encoded size on the wire.
    pub const SIZE: usize = HEADER_SIZE;

    /// Build a header, rejecting any field above 65535.
    pub fn new(
        frame_index: usize,
        row: usize,
        col: usize,
        total_frames: usize,
    ) -> Result<Self, ProtocolError> {
        Ok(Self {
            frame_index: narrow("frame_index", frame_index)?,
            row: narrow("row", row)?,
            col: narrow("col", col)?,
            total_frames: narrow("total_frames", total_frames)?,
        })
    }

    pub fn pos(&self) -> GridPos {
        GridPos::new(self.row, self.col)
    }

    /// Serialize to bytes (big-endian, reserved field zeroed).
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..2].copy_from_slice(&self.frame_index.to_be_bytes());
        buf[2..4].copy_from_slice(&self.row.to_be_bytes());
        buf[4..6].copy_from_slice(&self.col.to_be_bytes());
        buf[6..8].copy_from_slice(&self.total_frames.to_be_bytes());
        buf
    }

    /// Deserialize from the first ten bytes of `data`.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < Self::SIZE {
            return Err(ProtocolError::FrameTooShort {
                len: data.len(),
                min: Self::SIZE,
            });
        }
        let field = |at: usize| u16::from_be_bytes([data[at], data[at + 1]]);
        Ok(Self {
            frame_index: field(0),
            row: field(2),
            col: field(4),
            total_frames: field(6),
        })
    }
}

fn narrow(field: &'static str, value: usize) -> Result<u16, ProtocolError> {
    u16::try_from(value).map_err(|_| ProtocolError::FieldOutOfRange { field, value })
}

// ── Frame ────────────────────────────────────────────────────────

/// One network unit: header plus a chunk payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    header: FrameHeader,
    payload: Bytes,
}

impl Frame {
    pub fn new(header: FrameHeader, payload: Bytes) -> Self {
        Self { header, payload }
    }

    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn pos(&self) -> GridPos {
        self.header.pos()
    }

    /// Total encoded length (header + payload).
    pub fn len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Write header and payload into `dst`.
    pub fn encode_into(&self, dst: &mut BytesMut) {
        dst.reserve(self.len());
        dst.put_slice(&self.header.encode());
        dst.put_slice(&self.payload);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.len());
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Split a raw frame into header and payload without copying.
    pub fn from_bytes(mut bytes: Bytes) -> Result<Self, ProtocolError> {
        let header = FrameHeader::decode(&bytes)?;
        let payload = bytes.split_off(HEADER_SIZE);
        Ok(Self { header, payload })
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout_is_big_endian() {
        let hdr = FrameHeader::new(0x0102, 3, 0x0405, 12).unwrap();
        assert_eq!(
            hdr.encode(),
            [0x01, 0x02, 0x00, 0x03, 0x04, 0x05, 0x00, 0x0C, 0x00, 0x00]
        );
    }

    #[test]
    fn header_decode() {
        let hdr = FrameHeader::new(7, 1, 19, 240).unwrap();
        let decoded = FrameHeader::decode(&hdr.encode()).unwrap();
        assert_eq!(decoded, hdr);
        assert_eq!(decoded.pos(), GridPos::new(1, 19));
    }

    #[test]
    fn reserved_field_ignored_on_decode() {
        let mut raw = FrameHeader::new(1, 2, 3, 4).unwrap().encode();
        raw[8] = 0xFF;
        raw[9] = 0xEE;
        let decoded = FrameHeader::decode(&raw).unwrap();
        assert_eq!(decoded, FrameHeader::new(1, 2, 3, 4).unwrap());
    }

    #[test]
    fn out_of_range_fields_rejected() {
        let err = FrameHeader::new(0, 65_536, 0, 1).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::FieldOutOfRange { field: "row", value: 65_536 }
        ));
        assert!(FrameHeader::new(65_535, 65_535, 65_535, 65_535).is_ok());
        assert!(FrameHeader::new(0, 0, 0, 70_000).is_err());
    }

    #[test]
    fn header_too_short() {
        assert!(matches!(
            FrameHeader::decode(&[0u8; 9]),
            Err(ProtocolError::FrameTooShort { len: 9, min: 10 })
        ));
    }

    #[test]
    fn frame_splits_header_from_payload() {
        let header = FrameHeader::new(5, 0, 5, 6).unwrap();
        let frame = Frame::new(header, Bytes::from_static(b"abcdef"));
        let raw = frame.to_bytes();
        assert_eq!(raw.len(), 16);
        assert_eq!(&raw[10..], b"abcdef");

        let parsed = Frame::from_bytes(raw).unwrap();
        assert_eq!(parsed, frame);
    }
}
