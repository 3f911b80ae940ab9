//! The single captured utterance held for replay

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::frame::BYTES_PER_SAMPLE;
use crate::{Error, Result};

/// Minimum duration for an asset to be worth replaying
pub const MIN_REPLAY_SECONDS: f64 = 0.1;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One captured utterance: synthesized audio plus its transcript
#[derive(Debug, Clone)]
pub struct AudioAsset {
    /// Interleaved 16-bit PCM, shared with in-flight replays
    pub buffer: Arc<[u8]>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Number of source frames concatenated into `buffer`
    pub frame_count: usize,
    pub text_content: String,
    pub clean_text: String,
    pub created_at: Option<DateTime<Utc>>,
    pub duration_seconds: f64,
}

impl AudioAsset {
    /// Create an empty asset with the given encoding defaults
    #[must_use]
    pub fn empty(sample_rate: u32, channels: u16) -> Self {
        Self {
            buffer: Arc::from(Vec::new()),
            sample_rate,
            channels,
            frame_count: 0,
            text_content: String::new(),
            clean_text: String::new(),
            created_at: None,
            duration_seconds: 0.0,
        }
    }

    /// Whether the asset can be replayed
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.duration_seconds > MIN_REPLAY_SECONDS
            && !self.clean_text.is_empty()
            && self.frame_count > 0
    }

    /// Buffer size in megabytes
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn size_mb(&self) -> f64 {
        self.buffer.len() as f64 / BYTES_PER_MB
    }

    /// Reset every field and release the buffer
    pub fn clear(&mut self) {
        self.buffer = Arc::from(Vec::new());
        self.sample_rate = 0;
        self.channels = 0;
        self.frame_count = 0;
        self.text_content.clear();
        self.text_content.shrink_to_fit();
        self.clean_text.clear();
        self.clean_text.shrink_to_fit();
        self.created_at = None;
        self.duration_seconds = 0.0;
    }

    /// Derive `duration_seconds` from the buffer length and encoding
    #[allow(clippy::cast_precision_loss)]
    pub fn recompute_duration(&mut self) {
        self.duration_seconds = if self.sample_rate == 0 || self.channels == 0 {
            0.0
        } else {
            let bytes_per_second =
                BYTES_PER_SAMPLE as f64 * f64::from(self.channels) * f64::from(self.sample_rate);
            self.buffer.len() as f64 / bytes_per_second
        };
    }

    /// Serializable summary for diagnostics
    #[must_use]
    pub fn summary(&self) -> AssetSummary {
        AssetSummary {
            valid: self.is_valid(),
            text: self.clean_text.clone(),
            duration_seconds: self.duration_seconds,
            frame_count: self.frame_count,
            size_bytes: self.buffer.len(),
            size_mb: self.size_mb(),
            sample_rate: self.sample_rate,
            channels: self.channels,
            created_at: self.created_at,
        }
    }

    /// Encode the buffer as a 16-bit PCM WAV file
    ///
    /// # Errors
    ///
    /// Returns error if the asset has no encoding metadata or WAV writing fails
    pub fn to_wav(&self) -> Result<Vec<u8>> {
        if self.sample_rate == 0 || self.channels == 0 {
            return Err(Error::Audio("asset has no audio format".to_string()));
        }

        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer =
                hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

            // Whole interleaved blocks only; a trailing partial block is dropped
            let block = BYTES_PER_SAMPLE * usize::from(self.channels);
            for pair in self
                .buffer
                .chunks_exact(block)
                .flat_map(|b| b.chunks_exact(BYTES_PER_SAMPLE))
            {
                writer
                    .write_sample(i16::from_le_bytes([pair[0], pair[1]]))
                    .map_err(|e| Error::Audio(e.to_string()))?;
            }

            writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
        }

        Ok(cursor.into_inner())
    }
}

/// Snapshot of the current asset for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct AssetSummary {
    pub valid: bool,
    pub text: String,
    pub duration_seconds: f64,
    pub frame_count: usize,
    pub size_bytes: usize,
    pub size_mb: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset_with(len: usize, text: &str, frames: usize) -> AudioAsset {
        let mut asset = AudioAsset::empty(16_000, 1);
        asset.buffer = Arc::from(vec![0u8; len]);
        asset.clean_text = text.to_string();
        asset.text_content = text.to_string();
        asset.frame_count = frames;
        asset.recompute_duration();
        asset
    }

    #[test]
    fn duration_follows_buffer_length() {
        // one second at 16kHz mono
        let asset = asset_with(32_000, "hola", 1);
        assert!((asset.duration_seconds - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn validity_requires_all_three_conditions() {
        assert!(asset_with(32_000, "hola", 3).is_valid());
        assert!(!asset_with(32_000, "", 3).is_valid());
        assert!(!asset_with(32_000, "hola", 0).is_valid());
        // 0.1s exactly is not enough
        assert!(!asset_with(3_200, "hola", 1).is_valid());
    }

    #[test]
    fn clear_releases_everything() {
        let mut asset = asset_with(32_000, "hola", 2);
        asset.created_at = Some(Utc::now());
        asset.clear();

        assert!(asset.buffer.is_empty());
        assert_eq!(asset.frame_count, 0);
        assert!(asset.clean_text.is_empty());
        assert!(asset.created_at.is_none());
        assert!(asset.duration_seconds.abs() < f64::EPSILON);
        assert!(!asset.is_valid());
    }

    #[test]
    fn zero_format_has_zero_duration() {
        let mut asset = asset_with(1000, "x", 1);
        asset.channels = 0;
        asset.recompute_duration();
        assert!(asset.duration_seconds.abs() < f64::EPSILON);
    }

    #[test]
    fn size_mb_is_fractional() {
        let asset = asset_with(512 * 1024, "x", 1);
        assert!((asset.size_mb() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn wav_export_has_header_and_samples() {
        let asset = asset_with(3_200, "x", 1);
        let wav = asset.to_wav().unwrap();
        let reader = hound::WavReader::new(std::io::Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16_000);
        assert_eq!(reader.len(), 1_600);
    }

    #[test]
    fn wav_export_rejects_cleared_asset() {
        let mut asset = asset_with(100, "x", 1);
        asset.clear();
        assert!(asset.to_wav().is_err());
    }
}
