//! PCM audio frames and the replay frame sequence

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};

/// Bytes per 16-bit PCM sample
pub const BYTES_PER_SAMPLE: usize = 2;

/// A chunk of interleaved 16-bit PCM audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// Little-endian `i16` samples, channels interleaved
    pub data: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples_per_channel: u32,
}

impl AudioFrame {
    /// Build a frame from raw bytes, deriving `samples_per_channel`
    #[must_use]
    pub fn from_bytes(data: Vec<u8>, sample_rate: u32, channels: u16) -> Self {
        let block = BYTES_PER_SAMPLE * usize::from(channels.max(1));
        let samples_per_channel = u32::try_from(data.len() / block).unwrap_or(u32::MAX);
        Self {
            data,
            sample_rate,
            channels,
            samples_per_channel,
        }
    }

    /// Build a frame from `i16` samples
    #[must_use]
    pub fn from_samples(samples: &[i16], sample_rate: u32, channels: u16) -> Self {
        let data = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self::from_bytes(data, sample_rate, channels)
    }

    /// Whether the frame carries usable encoding metadata
    #[must_use]
    pub const fn has_format(&self) -> bool {
        self.sample_rate > 0 && self.channels > 0
    }
}

/// Lazy, single-pass sequence of fixed-duration frames over an asset snapshot
///
/// Holds its own reference to the buffer, so a capture replacing the asset
/// mid-stream does not affect frames still being drained.
#[derive(Debug, Clone)]
pub struct ReplayFrames {
    buffer: Arc<[u8]>,
    offset: usize,
    chunk_size: usize,
    sample_rate: u32,
    channels: u16,
}

impl ReplayFrames {
    /// Create a frame sequence over `buffer`
    ///
    /// The chunk size covers `frame_duration_ms` of audio and is never smaller
    /// than one sample per channel.
    #[must_use]
    pub fn new(buffer: Arc<[u8]>, sample_rate: u32, channels: u16, frame_duration_ms: u32) -> Self {
        let chunk_size = chunk_size(sample_rate, channels, frame_duration_ms);
        Self {
            buffer,
            offset: 0,
            chunk_size,
            sample_rate,
            channels,
        }
    }

    /// Bytes per emitted frame (the last frame may be shorter)
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Total number of frames in a full pass
    #[must_use]
    pub fn total_frames(&self) -> usize {
        self.buffer.len().div_ceil(self.chunk_size)
    }

    /// Adapt into a boxed stream for session playback
    #[must_use]
    pub fn into_stream(self) -> BoxStream<'static, AudioFrame> {
        stream::iter(self).boxed()
    }
}

impl Iterator for ReplayFrames {
    type Item = AudioFrame;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.buffer.len() {
            return None;
        }
        let end = (self.offset + self.chunk_size).min(self.buffer.len());
        let data = self.buffer[self.offset..end].to_vec();
        self.offset = end;
        Some(AudioFrame::from_bytes(data, self.sample_rate, self.channels))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.buffer.len() - self.offset).div_ceil(self.chunk_size);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ReplayFrames {}

/// Bytes covering `frame_duration_ms` of audio at the given format
fn chunk_size(sample_rate: u32, channels: u16, frame_duration_ms: u32) -> usize {
    let block = BYTES_PER_SAMPLE * usize::from(channels.max(1));
    let samples = u64::from(sample_rate) * u64::from(frame_duration_ms) / 1000;
    let samples = usize::try_from(samples).unwrap_or(usize::MAX / block);
    samples.max(1) * block
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames_over(len: usize, sample_rate: u32, channels: u16) -> ReplayFrames {
        let buffer: Arc<[u8]> = vec![7u8; len].into();
        ReplayFrames::new(buffer, sample_rate, channels, 20)
    }

    #[test]
    fn chunk_covers_twenty_milliseconds() {
        // 48kHz mono: 960 samples * 2 bytes
        assert_eq!(frames_over(10, 48_000, 1).chunk_size(), 1920);
        // 16kHz stereo: 320 samples * 2 channels * 2 bytes
        assert_eq!(frames_over(10, 16_000, 2).chunk_size(), 1280);
    }

    #[test]
    fn yields_ceil_frames_summing_to_buffer_length() {
        let len = 1920 * 3 + 100;
        let frames: Vec<AudioFrame> = frames_over(len, 48_000, 1).collect();

        assert_eq!(frames.len(), 4);
        assert_eq!(frames.iter().map(|f| f.data.len()).sum::<usize>(), len);
        assert_eq!(frames[3].data.len(), 100);
        assert_eq!(frames[3].samples_per_channel, 50);
        assert!(frames.iter().all(|f| f.sample_rate == 48_000 && f.channels == 1));
    }

    #[test]
    fn exact_multiple_has_no_partial_frame() {
        let frames = frames_over(1920 * 2, 48_000, 1);
        assert_eq!(frames.total_frames(), 2);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames.count(), 2);
    }

    #[test]
    fn empty_buffer_yields_nothing() {
        assert_eq!(frames_over(0, 48_000, 1).count(), 0);
    }

    #[test]
    fn tiny_sample_rate_still_advances() {
        let frames: Vec<_> = frames_over(9, 10, 1).collect();
        // 10 Hz * 20 ms rounds to zero samples, clamped to one sample block
        assert_eq!(frames.len(), 5);
        assert_eq!(frames.iter().map(|f| f.data.len()).sum::<usize>(), 9);
    }

    #[test]
    fn stream_adapter_drains_all_frames() {
        let frames = frames_over(5000, 48_000, 1);
        let collected: Vec<AudioFrame> =
            tokio_test::block_on(frames.into_stream().collect::<Vec<_>>());
        assert_eq!(collected.len(), 3);
    }

    #[test]
    fn from_samples_encodes_little_endian() {
        let frame = AudioFrame::from_samples(&[1, -2], 16_000, 1);
        assert_eq!(frame.data, vec![1, 0, 0xFE, 0xFF]);
        assert_eq!(frame.samples_per_channel, 2);
        assert!(frame.has_format());
    }
}
