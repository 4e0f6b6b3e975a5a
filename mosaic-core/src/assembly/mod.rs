//! Receiver-side grid reconstruction.
//!
//! A [`GridAssembler`] accumulates frames for one session purely by their
//! `(row, col)` header fields. Wire order and `frame_index` never affect
//! placement, so frames may arrive in any permutation and re-delivered
//! frames simply overwrite their slot.

pub mod buffer;
pub mod state;

pub use buffer::{IntegrityWarning, Reconstruction, ReconstructionBuffer};
pub use state::AssemblyState;

use tracing::{debug, warn};

use crate::error::ProtocolError;
use crate::frame::Frame;

/// Received vs expected counts at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub received: usize,
    pub expected: Option<u16>,
    pub state: AssemblyState,
}

impl Progress {
    pub fn is_complete(&self) -> bool {
        self.state == AssemblyState::Complete
    }
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.expected {
            Some(expected) => write!(f, "{}/{} frames", self.received, expected),
            None => write!(f, "{} frames (total unknown)", self.received),
        }
    }
}

#[derive(Debug, Default)]
pub struct GridAssembler {
    state: AssemblyState,
    buffer: ReconstructionBuffer,
    warnings: Vec<IntegrityWarning>,
}

impl GridAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AssemblyState {
        self.state
    }

    pub fn progress(&self) -> Progress {
        Progress {
            received: self.buffer.received_count(),
            expected: self.buffer.expected_total(),
            state: self.state,
        }
    }

    /// Warnings collected while accepting frames.
    pub fn warnings(&self) -> &[IntegrityWarning] {
        &self.warnings
    }

    /// Place one frame.
    ///
    /// The first frame fixes `expected_total_frames`; later disagreement
    /// is recorded as a warning and otherwise ignored.
    pub fn accept(&mut self, frame: &Frame) -> Result<Progress, ProtocolError> {
        let header = frame.header();
        match self.state {
            AssemblyState::AwaitingFirstFrame => {
                if header.total_frames == 0 {
                    return Err(ProtocolError::ZeroTotalFrames);
                }
                self.buffer.set_expected_total(header.total_frames);
                self.state.begin_accumulating()?;
                debug!(total_frames = header.total_frames, "expecting frames");
            }
            AssemblyState::Accumulating => {
                if let Some(expected) = self.buffer.expected_total() {
                    if header.total_frames != expected {
                        let warning = IntegrityWarning::TotalFramesMismatch {
                            expected,
                            got: header.total_frames,
                            pos: frame.pos(),
                        };
                        warn!("{warning}");
                        self.warnings.push(warning);
                    }
                }
            }
            AssemblyState::Complete | AssemblyState::Aborted => {
                return Err(ProtocolError::Violation(
                    "frame received after the session closed",
                ));
            }
        }

        if !self.buffer.insert(frame.pos(), frame.payload().clone()) {
            debug!(pos = %frame.pos(), "re-delivered chunk replaced");
        }
        if self.buffer.is_complete() {
            self.state.complete()?;
        }
        Ok(self.progress())
    }

    /// Give up on the session. Returns the partial counts for reporting;
    /// the buffer itself goes away with the assembler.
    pub fn abort(&mut self) -> Progress {
        if let Err(e) = self.state.abort() {
            debug!("abort ignored: {e}");
        }
        self.progress()
    }

    /// Concatenate the completed grid. Consumes the assembler so the
    /// buffer is reconstructed exactly once.
    pub fn reconstruct(self) -> Result<Reconstruction, ProtocolError> {
        if self.state != AssemblyState::Complete {
            return Err(ProtocolError::Violation(
                "cannot reconstruct an incomplete grid",
            ));
        }
        let mut reconstruction = self.buffer.reconstruct();
        for warning in &reconstruction.warnings {
            warn!("{warning}");
        }
        let mut warnings = self.warnings;
        warnings.append(&mut reconstruction.warnings);
        reconstruction.warnings = warnings;
        Ok(reconstruction)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameHeader, GridPos};
    use crate::splitter::ChunkSplitter;
    use bytes::Bytes;
    use proptest::prelude::*;

    fn assemble(frames: &[Frame]) -> GridAssembler {
        let mut asm = GridAssembler::new();
        for frame in frames {
            asm.accept(frame).unwrap();
        }
        asm
    }

    fn assert_padded_prefix(rebuilt: &[u8], original: &[u8], payload: usize) {
        assert!(rebuilt.len() >= original.len());
        assert_eq!(&rebuilt[..original.len()], original);
        let padding = &rebuilt[original.len()..];
        assert!(padding.len() < payload);
        assert!(padding.iter().all(|&b| b == 0));
    }

    #[test]
    fn state_transitions() {
        let splitter = ChunkSplitter::new(Bytes::from_static(b"0123456789abcdef"), 18, 2).unwrap();
        let frames: Vec<_> = splitter.frames().collect();
        assert_eq!(frames.len(), 2);

        let mut asm = GridAssembler::new();
        assert_eq!(asm.state(), AssemblyState::AwaitingFirstFrame);
        let p = asm.accept(&frames[1]).unwrap();
        assert_eq!(p.state, AssemblyState::Accumulating);
        assert_eq!(p.expected, Some(2));
        let p = asm.accept(&frames[0]).unwrap();
        assert!(p.is_complete());

        assert!(asm.accept(&frames[0]).is_err());
        let rec = asm.reconstruct().unwrap();
        assert_eq!(rec.bytes.as_ref(), b"0123456789abcdef");
        assert!(rec.warnings.is_empty());
    }

    #[test]
    fn idempotent_redelivery() {
        let image = Bytes::from((0..100u8).collect::<Vec<_>>());
        let splitter = ChunkSplitter::new(image.clone(), 30, 3).unwrap();
        let frames: Vec<_> = splitter.frames().collect();
        assert_eq!(frames.len(), 5);

        let mut asm = GridAssembler::new();
        for frame in &frames[..3] {
            asm.accept(frame).unwrap();
            asm.accept(frame).unwrap();
        }
        assert_eq!(asm.progress().received, 3);
        asm.accept(&frames[0]).unwrap();
        assert_eq!(asm.progress().received, 3);

        for frame in &frames[3..] {
            asm.accept(frame).unwrap();
        }
        let rec = asm.reconstruct().unwrap();
        assert_padded_prefix(&rec.bytes, &image, 20);
    }

    #[test]
    fn total_mismatch_warns_and_keeps_first() {
        let splitter = ChunkSplitter::new(Bytes::from(vec![1u8; 30]), 20, 4).unwrap();
        let mut frames: Vec<_> = splitter.frames().collect();
        let odd = *frames[1].header();
        frames[1] = Frame::new(
            FrameHeader {
                total_frames: 9,
                ..odd
            },
            frames[1].payload().clone(),
        );

        let asm = assemble(&frames);
        assert_eq!(asm.state(), AssemblyState::Complete);
        assert_eq!(asm.progress().expected, Some(3));
        assert_eq!(
            asm.warnings(),
            &[IntegrityWarning::TotalFramesMismatch {
                expected: 3,
                got: 9,
                pos: GridPos::new(0, 1)
            }]
        );
        let rec = asm.reconstruct().unwrap();
        assert_eq!(rec.warnings.len(), 1);
    }

    #[test]
    fn missing_chunk_in_twelve_frame_grid() {
        let image: Vec<u8> = (0..96u8).collect();
        let splitter = ChunkSplitter::new(Bytes::from(image.clone()), 18, 4).unwrap();
        assert_eq!(splitter.total_frames(), 12);

        let omitted = GridPos::new(1, 2);
        let mut buffer = ReconstructionBuffer::new();
        buffer.set_expected_total(12);
        for frame in splitter.frames().filter(|f| f.pos() != omitted) {
            buffer.insert(frame.pos(), frame.payload().clone());
        }
        assert!(!buffer.is_complete());

        let rec = buffer.reconstruct();
        assert_eq!(rec.warnings, vec![IntegrityWarning::MissingChunk { pos: omitted }]);
        let gap = 6 * 8..7 * 8;
        let mut expected = image[..gap.start].to_vec();
        expected.extend_from_slice(&image[gap.end..]);
        assert_eq!(rec.bytes.as_ref(), expected.as_slice());
    }

    #[test]
    fn zero_total_first_frame_rejected() {
        let frame = Frame::new(
            FrameHeader::new(0, 0, 0, 0).unwrap(),
            Bytes::from_static(b"xx"),
        );
        let mut asm = GridAssembler::new();
        assert!(matches!(asm.accept(&frame), Err(ProtocolError::ZeroTotalFrames)));
    }

    #[test]
    fn abort_reports_partial_counts() {
        let splitter = ChunkSplitter::new(Bytes::from(vec![3u8; 50]), 20, 4).unwrap();
        let frames: Vec<_> = splitter.frames().collect();
        let mut asm = assemble(&frames[..2]);

        let p = asm.progress();
        assert_eq!((p.received, p.expected), (2, Some(5)));
        let aborted = asm.abort();
        assert_eq!(aborted.state, AssemblyState::Aborted);
        assert!(asm.accept(&frames[2]).is_err());
        assert!(asm.reconstruct().is_err());
    }

    proptest! {
        #[test]
        fn split_then_reconstruct_recovers_bytes(
            image in proptest::collection::vec(any::<u8>(), 1..2048),
            payload in 1usize..200,
            columns in 1u16..40,
        ) {
            let splitter = ChunkSplitter::new(Bytes::from(image.clone()), payload + 10, columns).unwrap();
            let frames: Vec<_> = splitter.frames().collect();
            let rec = assemble(&frames).reconstruct().unwrap();
            prop_assert!(rec.warnings.is_empty());
            prop_assert_eq!(&rec.bytes[..image.len()], image.as_slice());
            prop_assert!(rec.bytes[image.len()..].iter().all(|&b| b == 0));
            prop_assert!(rec.bytes.len() - image.len() < payload);
        }

        #[test]
        fn arrival_order_does_not_matter(
            image in proptest::collection::vec(any::<u8>(), 1..1024),
            payload in 1usize..64,
            columns in 1u16..12,
            seed in any::<u64>(),
        ) {
            let splitter = ChunkSplitter::new(Bytes::from(image), payload + 10, columns).unwrap();
            let in_order: Vec<_> = splitter.frames().collect();
            let mut shuffled = in_order.clone();
            // Deterministic Fisher-Yates driven by the seed.
            let mut state = seed | 1;
            for i in (1..shuffled.len()).rev() {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                shuffled.swap(i, (state % (i as u64 + 1)) as usize);
            }

            let a = assemble(&in_order).reconstruct().unwrap();
            let b = assemble(&shuffled).reconstruct().unwrap();
            prop_assert_eq!(a.bytes, b.bytes);
        }
    }
}
