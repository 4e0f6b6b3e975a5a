//! Handshake followed by N fixed-size frames over one ordered byte stream.
//!
//! Both halves are generic over tokio I/O so they run on a `TcpStream`
//! in production and on `tokio::io::duplex` pipes in tests.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::codec::FrameCodec;
use crate::error::{MosaicError, TransportError};
use crate::frame::Frame;
use crate::handshake::Handshake;

// ── Sender ───────────────────────────────────────────────────────

pub struct FrameStreamSender<W> {
    inner: FramedWrite<W, FrameCodec>,
    sent: usize,
}

impl<W> FrameStreamSender<W>
where
    W: AsyncWrite + Unpin,
{
    /// Write the handshake and return a sender for its frames.
    pub async fn open(mut writer: W, handshake: &Handshake) -> Result<Self, MosaicError> {
        let codec = FrameCodec::new(handshake.frame_size())?;
        handshake.write_to(&mut writer).await?;
        Ok(Self {
            inner: FramedWrite::new(writer, codec),
            sent: 0,
        })
    }

    /// Queue one frame. Backpressure flushes as the write buffer fills.
    pub async fn send(&mut self, frame: Frame) -> Result<(), MosaicError> {
        self.inner.feed(frame).await?;
        self.sent += 1;
        Ok(())
    }

    /// Send every frame in order, stopping at the first failure.
    pub async fn send_all<I>(&mut self, frames: I) -> Result<usize, MosaicError>
    where
        I: IntoIterator<Item = Frame>,
    {
        for frame in frames {
            self.send(frame).await?;
        }
        self.inner.flush().await?;
        Ok(self.sent)
    }

    /// Frames handed to the transport so far.
    pub fn sent(&self) -> usize {
        self.sent
    }

    /// Flush and half-close the write side.
    pub async fn finish(mut self) -> Result<W, MosaicError> {
        self.inner.flush().await?;
        let mut writer = self.inner.into_inner();
        writer.shutdown().await?;
        Ok(writer)
    }
}

// ── Receiver ─────────────────────────────────────────────────────

pub struct FrameStreamReceiver<R> {
    inner: FramedRead<R, FrameCodec>,
    idle_timeout: Duration,
}

impl<R> FrameStreamReceiver<R>
where
    R: AsyncRead + Unpin,
{
    /// Wrap a reader positioned right after a validated handshake.
    pub fn new(reader: R, handshake: &Handshake, idle_timeout: Duration) -> Result<Self, MosaicError> {
        let codec = FrameCodec::new(handshake.frame_size())?;
        Ok(Self {
            inner: FramedRead::with_capacity(reader, codec, codec.frame_size()),
            idle_timeout,
        })
    }

    /// Read the next whole frame.
    ///
    /// `Ok(None)` means the peer closed cleanly on a frame boundary; a
    /// close inside a frame or an idle timeout is a transport error.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>, MosaicError> {
        match tokio::time::timeout(self.idle_timeout, self.inner.next()).await {
            Err(_) => Err(TransportError::Timeout(self.idle_timeout).into()),
            Ok(None) => Ok(None),
            Ok(Some(result)) => result.map(Some),
        }
    }

    /// Bytes already read from the socket past the last whole frame.
    pub fn buffered(&self) -> usize {
        self.inner.read_buffer().len()
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splitter::ChunkSplitter;
    use bytes::Bytes;

    const IDLE: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn frames_arrive_in_write_order() {
        let image = Bytes::from((0..=255u8).cycle().take(1000).collect::<Vec<_>>());
        let splitter = ChunkSplitter::new(image, 74, 5).unwrap();
        let handshake = Handshake::new("TX1", "img.jpg", 74).unwrap();

        let (client, mut server) = tokio::io::duplex(256);
        let expected: Vec<_> = splitter.frames().collect();
        let hs = handshake.clone();
        let writer = tokio::spawn(async move {
            let mut sender = FrameStreamSender::open(client, &hs).await?;
            let n = sender.send_all(splitter.frames()).await?;
            sender.finish().await?;
            Ok::<_, MosaicError>(n)
        });

        let received_hs = Handshake::read_from(&mut server).await.unwrap();
        assert_eq!(received_hs, handshake);
        let mut receiver = FrameStreamReceiver::new(server, &received_hs, IDLE).unwrap();

        let mut got = Vec::new();
        while let Some(frame) = receiver.next_frame().await.unwrap() {
            got.push(frame);
        }
        assert_eq!(writer.await.unwrap().unwrap(), expected.len());
        assert_eq!(got, expected);
    }

    #[tokio::test]
    async fn short_read_is_incomplete_transfer() {
        let handshake = Handshake::new("TX1", "img.jpg", 20).unwrap();
        let mut raw = handshake.encode().to_vec();
        raw.extend_from_slice(&[0u8; 20]);
        raw.extend_from_slice(&[0u8; 7]);

        let mut stream = &raw[..];
        let hs = Handshake::read_from(&mut stream).await.unwrap();
        let mut receiver = FrameStreamReceiver::new(stream, &hs, IDLE).unwrap();

        assert!(receiver.next_frame().await.unwrap().is_some());
        let err = receiver.next_frame().await.unwrap_err();
        assert!(matches!(
            err,
            MosaicError::Transport(TransportError::ClosedMidFrame { received: 7, expected: 20 })
        ));
    }

    #[tokio::test]
    async fn frames_split_across_reads_are_reassembled() {
        let splitter = ChunkSplitter::new(Bytes::from_static(b"0123456789abcdef"), 18, 2).unwrap();
        let handshake = Handshake::new("TX1", "img.jpg", 18).unwrap();
        let frames: Vec<_> = splitter.frames().collect();
        let wire: Vec<u8> = frames.iter().flat_map(|f| f.to_bytes().to_vec()).collect();

        // 36 bytes delivered as 5 + 20 + 11: no read lines up with a frame.
        let mock = tokio_test::io::Builder::new()
            .read(&wire[..5])
            .read(&wire[5..25])
            .read(&wire[25..])
            .build();
        let mut receiver = FrameStreamReceiver::new(mock, &handshake, IDLE).unwrap();

        assert_eq!(receiver.next_frame().await.unwrap().as_ref(), Some(&frames[0]));
        assert_eq!(receiver.next_frame().await.unwrap().as_ref(), Some(&frames[1]));
        assert!(receiver.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn write_failure_abandons_remaining_frames() {
        // Frames above the 8 KiB write buffer boundary: queueing each new
        // frame pushes the previous one to the socket.
        const FRAME: usize = 9000;
        let image = Bytes::from(vec![7u8; (FRAME - 10) * 4]);
        let splitter = ChunkSplitter::new(image, FRAME, 2).unwrap();
        let handshake = Handshake::new("TX1", "big.jpg", FRAME as u32).unwrap();
        let frames: Vec<_> = splitter.frames().collect();
        assert_eq!(frames.len(), 4);

        let mock = tokio_test::io::Builder::new()
            .write(&handshake.encode())
            .write(&frames[0].to_bytes())
            .write_error(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "peer gone"))
            .build();

        let mut sender = FrameStreamSender::open(mock, &handshake).await.unwrap();
        let err = sender.send_all(splitter.frames()).await.unwrap_err();
        assert!(matches!(err, MosaicError::Transport(_)));
        assert_eq!(sender.sent(), 2);
        assert!(sender.sent() < frames.len());
    }

    #[tokio::test]
    async fn idle_peer_times_out() {
        let handshake = Handshake::new("TX1", "img.jpg", 20).unwrap();
        let (_client, server) = tokio::io::duplex(64);
        let mut receiver =
            FrameStreamReceiver::new(server, &handshake, Duration::from_millis(50)).unwrap();
        let err = receiver.next_frame().await.unwrap_err();
        assert!(matches!(err, MosaicError::Transport(TransportError::Timeout(_))));
    }
}
