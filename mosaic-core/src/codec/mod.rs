//! `tokio_util` codec for fixed-size grid frames.
//!
//! Every frame on a connection has the length negotiated in the
//! handshake, so the decoder only waits until that many bytes are
//! buffered and then splits them off.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{MosaicError, ProtocolError, TransportError};
use crate::frame::{Frame, HEADER_SIZE};

#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    frame_size: usize,
}

impl FrameCodec {
    /// Create a codec for frames of `frame_size` bytes (header included).
    pub fn new(frame_size: u32) -> Result<Self, ProtocolError> {
        if frame_size as usize <= HEADER_SIZE {
            return Err(ProtocolError::FrameSizeTooSmall {
                frame_size,
                header: HEADER_SIZE,
            });
        }
        Ok(Self {
            frame_size: frame_size as usize,
        })
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = MosaicError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < self.frame_size {
            src.reserve(self.frame_size - src.len());
            return Ok(None);
        }
        let raw = src.split_to(self.frame_size).freeze();
        Ok(Some(Frame::from_bytes(raw)?))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(TransportError::ClosedMidFrame {
                received: src.len(),
                expected: self.frame_size,
            }
            .into()),
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = MosaicError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() != self.frame_size {
            return Err(ProtocolError::FrameLengthMismatch {
                expected: self.frame_size,
                actual: item.len(),
            }
            .into());
        }
        item.encode_into(dst);
        Ok(())
    }
}
