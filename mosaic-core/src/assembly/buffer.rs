use std::collections::HashMap;
use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::frame::GridPos;

/// Non-fatal reconstruction anomaly. Logged, never aborts a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityWarning {
    /// A frame disagreed with the first frame's `total_frames`.
    TotalFramesMismatch { expected: u16, got: u16, pos: GridPos },

    /// No chunk arrived for a position inside the expected grid.
    MissingChunk { pos: GridPos },
}

impl fmt::Display for IntegrityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TotalFramesMismatch { expected, got, pos } => write!(
                f,
                "total frames mismatch at {pos}: expected {expected}, got {got}; keeping {expected}"
            ),
            Self::MissingChunk { pos } => {
                write!(f, "missing chunk at {pos}; inserted empty bytes")
            }
        }
    }
}

/// Concatenated image bytes plus any gaps found on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconstruction {
    pub bytes: Bytes,
    pub warnings: Vec<IntegrityWarning>,
}

/// Chunks keyed by grid position.
#[derive(Debug, Default)]
pub struct ReconstructionBuffer {
    chunks: HashMap<GridPos, Bytes>,
    expected_total: Option<u16>,
    max_row: u16,
    max_col: u16,
}

impl ReconstructionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the expected frame count. Only the first call has any effect.
    pub fn set_expected_total(&mut self, total: u16) {
        self.expected_total.get_or_insert(total);
    }

    pub fn expected_total(&self) -> Option<u16> {
        self.expected_total
    }

    /// Store `payload` at `pos`, replacing any earlier chunk there.
    /// Returns `true` if the position was new.
    pub fn insert(&mut self, pos: GridPos, payload: Bytes) -> bool {
        if self.chunks.is_empty() {
            self.max_row = pos.row;
            self.max_col = pos.col;
        } else {
            self.max_row = self.max_row.max(pos.row);
            self.max_col = self.max_col.max(pos.col);
        }
        self.chunks.insert(pos, payload).is_none()
    }

    pub fn get(&self, pos: GridPos) -> Option<&Bytes> {
        self.chunks.get(&pos)
    }

    /// Distinct grid positions filled.
    pub fn received_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_complete(&self) -> bool {
        self.expected_total
            .is_some_and(|total| self.chunks.len() == total as usize)
    }

    /// Largest `(row, col)` seen, if any chunk arrived.
    pub fn extent(&self) -> Option<(u16, u16)> {
        (!self.chunks.is_empty()).then_some((self.max_row, self.max_col))
    }

    /// Concatenate chunks row-major over `0..=max_row × 0..=max_col`.
    ///
    /// Positions whose linear index `row * width + col` falls inside the
    /// expected frame count but never arrived contribute empty bytes and a
    /// [`IntegrityWarning::MissingChunk`]. Cells past the count are the
    /// unfilled tail of the grid: they also contribute nothing, but unlike
    /// a hole inside the count they are not reported.
    ///
    /// Work is bounded by the chunks held plus the expected count, not by
    /// the grid area, so a stray far-away position stays cheap.
    pub fn reconstruct(&self) -> Reconstruction {
        let mut warnings = Vec::new();
        let Some((max_row, max_col)) = self.extent() else {
            return Reconstruction {
                bytes: Bytes::new(),
                warnings,
            };
        };

        let width = max_col as usize + 1;
        let expected = self.expected_total.map_or(0, usize::from);
        for index in 0..expected {
            let (row, col) = (index / width, index % width);
            if row > max_row as usize {
                break;
            }
            // Both fit in u16: row <= max_row and col <= max_col.
            let pos = GridPos::new(row as u16, col as u16);
            if !self.chunks.contains_key(&pos) {
                warnings.push(IntegrityWarning::MissingChunk { pos });
            }
        }

        // Missing cells add no bytes, so row-major order over the grid is
        // the sorted order of the positions actually held.
        let mut held: Vec<(&GridPos, &Bytes)> = self.chunks.iter().collect();
        held.sort_unstable_by_key(|(pos, _)| **pos);
        let capacity = held.iter().map(|(_, chunk)| chunk.len()).sum();
        let mut out = BytesMut::with_capacity(capacity);
        for (_, chunk) in held {
            out.put_slice(chunk);
        }

        Reconstruction {
            bytes: out.freeze(),
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(b: u8) -> Bytes {
        Bytes::from(vec![b; 4])
    }

    #[test]
    fn expected_total_is_sticky() {
        let mut buf = ReconstructionBuffer::new();
        buf.set_expected_total(6);
        buf.set_expected_total(9);
        assert_eq!(buf.expected_total(), Some(6));
    }

    #[test]
    fn duplicate_position_replaces() {
        let mut buf = ReconstructionBuffer::new();
        assert!(buf.insert(GridPos::new(0, 0), chunk(1)));
        assert!(!buf.insert(GridPos::new(0, 0), chunk(2)));
        assert_eq!(buf.received_count(), 1);
        assert_eq!(buf.get(GridPos::new(0, 0)), Some(&chunk(2)));
    }

    #[test]
    fn grid_tail_is_not_missing() {
        // 6 chunks on a 4-wide grid: row 1 only has two columns.
        let mut buf = ReconstructionBuffer::new();
        buf.set_expected_total(6);
        for i in 0..6u16 {
            buf.insert(GridPos::new(i / 4, i % 4), chunk(i as u8));
        }
        assert!(buf.is_complete());
        let rec = buf.reconstruct();
        assert!(rec.warnings.is_empty());
        assert_eq!(rec.bytes.len(), 24);
        assert_eq!(&rec.bytes[20..], &[5, 5, 5, 5]);
    }

    #[test]
    fn stray_position_leaves_a_gap() {
        // Six distinct positions, but (0, 2) never came and (2, 0) did.
        let mut buf = ReconstructionBuffer::new();
        buf.set_expected_total(6);
        for (r, c) in [(0, 0), (0, 1), (0, 3), (1, 0), (1, 1), (2, 0)] {
            buf.insert(GridPos::new(r, c), chunk(r as u8 * 4 + c as u8));
        }
        assert!(buf.is_complete());

        let rec = buf.reconstruct();
        assert_eq!(
            rec.warnings,
            vec![IntegrityWarning::MissingChunk {
                pos: GridPos::new(0, 2)
            }]
        );
        assert_eq!(rec.bytes.len(), 24);
    }

    #[test]
    fn far_away_position_does_not_walk_the_grid() {
        let mut buf = ReconstructionBuffer::new();
        buf.set_expected_total(2);
        buf.insert(GridPos::new(0, 0), chunk(1));
        buf.insert(GridPos::new(u16::MAX, u16::MAX), chunk(2));
        assert!(buf.is_complete());

        let started = std::time::Instant::now();
        let rec = buf.reconstruct();
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
        assert_eq!(&rec.bytes[..], &[1, 1, 1, 1, 2, 2, 2, 2]);
        // Index 1 on a 65536-wide grid is (0, 1), which never came.
        assert_eq!(
            rec.warnings,
            vec![IntegrityWarning::MissingChunk {
                pos: GridPos::new(0, 1)
            }]
        );
    }

    #[test]
    fn chunks_concatenate_in_row_major_order() {
        let mut buf = ReconstructionBuffer::new();
        buf.set_expected_total(4);
        for (r, c, b) in [(1, 1, 4), (0, 1, 2), (1, 0, 3), (0, 0, 1)] {
            buf.insert(GridPos::new(r, c), chunk(b));
        }
        let rec = buf.reconstruct();
        assert_eq!(
            &rec.bytes[..],
            &[1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4]
        );
    }

    #[test]
    fn empty_buffer_reconstructs_to_nothing() {
        let rec = ReconstructionBuffer::new().reconstruct();
        assert!(rec.bytes.is_empty());
        assert!(rec.warnings.is_empty());
    }
}
