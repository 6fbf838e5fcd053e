//! Frame Encoder
//!
//! Snapshots the unsent range of the ring buffer, serializes at most 255
//! samples of it, and moves the read position only once the frame has
//! been written out.

use ecg_protocol::{FrameBuilder, ProtocolError, MAX_FRAME_LEN, MAX_SAMPLES_PER_FRAME};
use ring_buffer::RingBuffer;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

/// Result of building one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedFrame {
    /// Samples in the frame (0 means nothing was built)
    pub count: usize,
    /// Ring position of the first sample
    pub tail: usize,
    /// Samples were dropped since the previous snapshot. Not sent on the wire.
    pub overflow: bool,
}

/// Consumer side of the sample path
pub struct FrameEncoder {
    buffer: Arc<RingBuffer>,
    /// Preallocated output, reused for every frame
    frame: Vec<u8>,
}

impl FrameEncoder {
    pub fn new(buffer: Arc<RingBuffer>) -> Self {
        Self {
            buffer,
            frame: Vec::with_capacity(MAX_FRAME_LEN),
        }
    }

    /// Build a frame from a fresh snapshot without advancing the buffer.
    ///
    /// The bytes are available from [`FrameEncoder::frame`] until the next
    /// call.
    pub fn encode(&mut self) -> EncodedFrame {
        let snapshot = self.buffer.snapshot();
        let available = snapshot.count(self.buffer.capacity());
        let count = available.min(MAX_SAMPLES_PER_FRAME);

        if snapshot.overflow {
            debug!("Samples were dropped since the previous frame");
        }

        let encoded = EncodedFrame {
            count,
            tail: snapshot.tail,
            overflow: snapshot.overflow,
        };

        self.frame.clear();
        if count == 0 {
            return encoded;
        }
        if available > count {
            trace!("Deferring {} samples to the next frame", available - count);
        }

        let mut builder = FrameBuilder::begin(&mut self.frame, count as u8);
        for i in 0..count {
            builder.push_value(self.buffer.read(snapshot.tail + i).value);
        }
        for i in 0..count {
            builder.push_timestamp(self.buffer.read(snapshot.tail + i).timestamp_ms);
        }
        builder.finish();

        encoded
    }

    /// Bytes of the most recently encoded frame
    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    /// Release the samples of a transmitted frame
    pub fn commit(&self, encoded: EncodedFrame) {
        if encoded.count > 0 {
            self.buffer.advance_tail_to(encoded.tail + encoded.count);
        }
    }

    /// Encode, write and flush one frame, then commit it.
    ///
    /// Writes nothing when no samples are pending. On a write error the
    /// samples stay queued for the next request.
    pub async fn send<W>(&mut self, writer: &mut W) -> Result<usize, ProtocolError>
    where
        W: AsyncWrite + Unpin,
    {
        let encoded = self.encode();
        if encoded.count == 0 {
            trace!("No samples pending");
            return Ok(0);
        }

        writer.write_all(&self.frame).await?;
        writer.flush().await?;
        self.commit(encoded);

        debug!(
            "Sent frame with {} samples ({} bytes)",
            encoded.count,
            self.frame.len()
        );
        Ok(encoded.count)
    }

    /// Get the shared buffer
    pub fn buffer(&self) -> &Arc<RingBuffer> {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecg_protocol::{decode_frame, Crc16, Sample};
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Writer whose every write fails
    struct BrokenLink;

    impl AsyncWrite for BrokenLink {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn filled(capacity: usize, samples: u32) -> Arc<RingBuffer> {
        let buffer = Arc::new(RingBuffer::new(capacity).unwrap());
        for i in 0..samples {
            buffer.append((i % 1024) as u16, 1000 + i * 5);
        }
        buffer
    }

    async fn request(encoder: &mut FrameEncoder) -> Vec<u8> {
        let mut wire = Vec::new();
        encoder.send(&mut wire).await.unwrap();
        wire
    }

    #[tokio::test]
    async fn test_returns_all_pending_samples() {
        let buffer = filled(200, 199);
        let mut encoder = FrameEncoder::new(Arc::clone(&buffer));

        let wire = request(&mut encoder).await;
        let samples = decode_frame(&wire).unwrap();

        assert_eq!(samples.len(), 199);
        for (i, sample) in samples.iter().enumerate() {
            assert_eq!(*sample, Sample::new(i as u16, 1000 + i as u32 * 5));
        }
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn test_exact_bytes_for_small_frame() {
        let buffer = Arc::new(RingBuffer::new(8).unwrap());
        buffer.append(0x0201, 0x06050403);
        let mut encoder = FrameEncoder::new(buffer);

        let wire = request(&mut encoder).await;
        let crc = Crc16::checksum(&[1, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06]).to_le_bytes();
        assert_eq!(
            wire,
            vec![1, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, crc[0], crc[1]]
        );
    }

    #[tokio::test]
    async fn test_nothing_pending_sends_nothing() {
        let buffer = filled(16, 0);
        let mut encoder = FrameEncoder::new(Arc::clone(&buffer));
        assert!(request(&mut encoder).await.is_empty());

        // Again after a successful request drained everything
        buffer.append(1, 1);
        assert_eq!(request(&mut encoder).await.len(), 9);
        assert!(request(&mut encoder).await.is_empty());
    }

    #[tokio::test]
    async fn test_drop_oldest_then_request() {
        const N: usize = 200;
        let buffer = filled(N, N as u32 + 5);
        let mut encoder = FrameEncoder::new(Arc::clone(&buffer));

        let samples = decode_frame(&request(&mut encoder).await).unwrap();
        assert_eq!(samples.len(), N - 1);
        // Samples 0..=5 are gone: N + 5 appends keep the last N - 1
        assert_eq!(samples[0].value, 6);
        assert_eq!(samples[N - 2].value, N as u16 + 4);

        assert!(request(&mut encoder).await.is_empty());
    }

    #[tokio::test]
    async fn test_clamps_and_defers() {
        let buffer = filled(400, 300);
        let mut encoder = FrameEncoder::new(Arc::clone(&buffer));

        let first = decode_frame(&request(&mut encoder).await).unwrap();
        assert_eq!(first.len(), 255);
        assert_eq!(buffer.len(), 45);

        let second = decode_frame(&request(&mut encoder).await).unwrap();
        assert_eq!(second.len(), 45);
        assert_eq!(second[0], Sample::new(255, 1000 + 255 * 5));
        assert_eq!(second[44], Sample::new(299, 1000 + 299 * 5));

        assert!(request(&mut encoder).await.is_empty());
    }

    #[tokio::test]
    async fn test_frame_across_wrap_point() {
        let buffer = Arc::new(RingBuffer::new(10).unwrap());
        let mut encoder = FrameEncoder::new(Arc::clone(&buffer));
        for i in 0..7 {
            buffer.append(i, i as u32);
        }
        request(&mut encoder).await;

        for i in 7..13 {
            buffer.append(i, i as u32);
        }
        let samples = decode_frame(&request(&mut encoder).await).unwrap();
        let values: Vec<u16> = samples.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![7, 8, 9, 10, 11, 12]);
    }

    #[tokio::test]
    async fn test_failed_write_keeps_samples() {
        let buffer = filled(32, 10);
        let mut encoder = FrameEncoder::new(Arc::clone(&buffer));

        let result = encoder.send(&mut BrokenLink).await;
        assert!(matches!(result, Err(ProtocolError::Io(_))));
        assert_eq!(buffer.len(), 10);

        let samples = decode_frame(&request(&mut encoder).await).unwrap();
        assert_eq!(samples.len(), 10);
    }

    #[test]
    fn test_encode_reports_overflow_once() {
        let buffer = filled(4, 6);
        let mut encoder = FrameEncoder::new(Arc::clone(&buffer));

        let first = encoder.encode();
        assert!(first.overflow);
        assert_eq!(first.count, 3);

        // Not committed, so the same samples come back without the flag
        let second = encoder.encode();
        assert!(!second.overflow);
        assert_eq!(second.count, 3);
        assert_eq!(second.tail, first.tail);

        encoder.commit(second);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_frame_buffer_reused() {
        let buffer = filled(400, 300);
        let mut encoder = FrameEncoder::new(buffer);
        let before = encoder.frame.capacity();
        let encoded = encoder.encode();
        assert_eq!(encoder.frame().len(), MAX_FRAME_LEN);
        assert_eq!(encoder.frame.capacity(), before);
        encoder.commit(encoded);
    }
}
