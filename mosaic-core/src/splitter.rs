//! Sender-side chunk splitter.
//!
//! Slices an encoded image into `frame_size - HEADER_SIZE` byte chunks
//! laid out row-major on a grid of `columns` columns. Frames are produced
//! lazily and deterministically from the same input, so iterating again
//! regenerates the exact same sequence for a retransmission.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::ConfigError;
use crate::frame::{Frame, FrameHeader, GridPos, HEADER_SIZE, MAX_FIELD_VALUE};

/// Default grid width used by transmitters.
pub const DEFAULT_COLUMNS: u16 = 20;

#[derive(Debug, Clone)]
pub struct ChunkSplitter {
    image: Bytes,
    frame_size: usize,
    payload_size: usize,
    columns: u16,
    total_frames: u16,
}

impl ChunkSplitter {
    /// Plan the split. Fails before producing any frame if the frame size
    /// cannot carry payload, the grid has no columns, or the image needs
    /// more frames than the 16-bit header count allows.
    pub fn new(image: Bytes, frame_size: usize, columns: u16) -> Result<Self, ConfigError> {
        let payload_size = frame_size
            .checked_sub(HEADER_SIZE)
            .filter(|size| *size > 0)
            .ok_or(ConfigError::FrameSizeTooSmall {
                frame_size,
                header: HEADER_SIZE,
            })?;
        if columns == 0 {
            return Err(ConfigError::ZeroColumns);
        }

        let frames = image.len().div_ceil(payload_size);
        let total_frames = u16::try_from(frames).map_err(|_| ConfigError::TooManyFrames {
            frames,
            max: MAX_FIELD_VALUE,
        })?;

        Ok(Self {
            image,
            frame_size,
            payload_size,
            columns,
            total_frames,
        })
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn payload_size(&self) -> usize {
        self.payload_size
    }

    pub fn columns(&self) -> u16 {
        self.columns
    }

    pub fn total_frames(&self) -> u16 {
        self.total_frames
    }

    pub fn image_len(&self) -> usize {
        self.image.len()
    }

    /// Grid position of the chunk at linear `index`.
    pub fn position(&self, index: u16) -> GridPos {
        GridPos::new(index / self.columns, index % self.columns)
    }

    /// Build the frame for chunk `index`, or `None` past the end.
    pub fn frame(&self, index: u16) -> Option<Frame> {
        if index >= self.total_frames {
            return None;
        }
        let start = index as usize * self.payload_size;
        let end = (start + self.payload_size).min(self.image.len());

        let payload = if end - start == self.payload_size {
            self.image.slice(start..end)
        } else {
            let mut padded = BytesMut::with_capacity(self.payload_size);
            padded.put_slice(&self.image[start..end]);
            padded.put_bytes(0, self.payload_size - (end - start));
            padded.freeze()
        };

        let pos = self.position(index);
        let header = FrameHeader {
            frame_index: index,
            row: pos.row,
            col: pos.col,
            total_frames: self.total_frames,
        };
        Some(Frame::new(header, payload))
    }

    /// Frames in transmission order. Call again to restart.
    pub fn frames(&self) -> Frames<'_> {
        Frames {
            splitter: self,
            next: 0,
        }
    }
}

/// Lazy, finite iterator over a splitter's frames.
#[derive(Debug, Clone)]
pub struct Frames<'a> {
    splitter: &'a ChunkSplitter,
    next: u16,
}

impl Iterator for Frames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Self::Item> {
        let frame = self.splitter.frame(self.next)?;
        self.next += 1;
        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.splitter.total_frames - self.next) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Frames<'_> {}
