//! WAV input for offline feature extraction.
//!
//! - PCM 16-bit and IEEE float 32-bit, any channel count, down-mixed to mono
//! - linear resampling to the pipeline's configured rate

use thiserror::Error;

use crate::spectrogram::AudioBuffer;

/// Linearly resample `input` from `src_hz` to `dst_hz`.
#[must_use]
pub fn resample_linear_mono_f32(input: &[f32], src_hz: u32, dst_hz: u32) -> Vec<f32> {
    if src_hz == dst_hz || input.is_empty() || src_hz == 0 {
        return input.to_vec();
    }

    let new_n_u64 = (input.len() as u64) * u64::from(dst_hz) / u64::from(src_hz);
    let new_n = usize::try_from(new_n_u64).unwrap_or(usize::MAX);
    let step = f64::from(src_hz) / f64::from(dst_hz);

    (0..new_n)
        .map(|i| {
            let src_pos = (i as f64) * step;
            let idx = src_pos.floor() as usize;
            let frac = (src_pos - idx as f64) as f32;

            let a = input.get(idx).copied().unwrap_or(0.0);
            let b = input.get(idx + 1).copied().unwrap_or(a);
            a * (1.0 - frac) + b * frac
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct WavData {
    pub sample_rate_hz: u32,
    pub channels: u16,
    pub samples_mono: Vec<f32>,
}

impl WavData {
    pub fn as_buffer(&self) -> AudioBuffer<'_> {
        AudioBuffer::new(&self.samples_mono, self.sample_rate_hz)
    }

    /// Resample in place to `dst_hz` (no-op when already there).
    pub fn resample_to(&mut self, dst_hz: u32) {
        if self.sample_rate_hz != dst_hz {
            self.samples_mono =
                resample_linear_mono_f32(&self.samples_mono, self.sample_rate_hz, dst_hz);
            self.sample_rate_hz = dst_hz;
        }
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate_hz == 0 {
            return 0.0;
        }
        self.samples_mono.len() as f32 / self.sample_rate_hz as f32
    }
}

#[derive(Debug, Error)]
pub enum WavError {
    #[error("not a valid WAV file")]
    InvalidHeader,
    #[error("unsupported WAV format {format} with {bits} bits per sample")]
    UnsupportedFormat { format: u16, bits: u16 },
    #[error("malformed WAV chunks")]
    MalformedChunks,
}

const FORMAT_PCM: u16 = 1;
const FORMAT_IEEE_FLOAT: u16 = 3;

fn read_u16_le(p: &[u8]) -> u16 {
    u16::from_le_bytes([p[0], p[1]])
}

fn read_u32_le(p: &[u8]) -> u32 {
    u32::from_le_bytes([p[0], p[1], p[2], p[3]])
}

/// Parse WAV bytes and return mono `f32` samples at the file's sample rate.
pub fn parse_wav_bytes(data: &[u8]) -> Result<WavData, WavError> {
    if data.len() < 12 || &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
        return Err(WavError::InvalidHeader);
    }

    let mut fmt: Option<(u16, u16, u32, u16)> = None;
    let mut pcm_data: Option<&[u8]> = None;

    let mut p = 12usize;
    while p + 8 <= data.len() {
        let chunk_id = &data[p..p + 4];
        let chunk_size = read_u32_le(&data[p + 4..p + 8]) as usize;
        let start = p + 8;
        let end = start.saturating_add(chunk_size);
        if end > data.len() {
            return Err(WavError::MalformedChunks);
        }

        if chunk_id == b"fmt " && chunk_size >= 16 {
            let c = &data[start..end];
            fmt = Some((
                read_u16_le(&c[0..2]),
                read_u16_le(&c[2..4]),
                read_u32_le(&c[4..8]),
                read_u16_le(&c[14..16]),
            ));
        } else if chunk_id == b"data" {
            pcm_data = Some(&data[start..end]);
        }

        // Chunks are word aligned.
        p = end + (chunk_size & 1);
    }

    let (Some((format, channels, sample_rate_hz, bits)), Some(pcm_data)) = (fmt, pcm_data) else {
        return Err(WavError::MalformedChunks);
    };
    if channels == 0 {
        return Err(WavError::MalformedChunks);
    }

    let decode: fn(&[u8]) -> f32 = match (format, bits) {
        (FORMAT_PCM, 16) => |b: &[u8]| f32::from(i16::from_le_bytes([b[0], b[1]])) / 32768.0,
        (FORMAT_IEEE_FLOAT, 32) => |b: &[u8]| f32::from_le_bytes([b[0], b[1], b[2], b[3]]),
        _ => return Err(WavError::UnsupportedFormat { format, bits }),
    };

    let sample_bytes = usize::from(bits / 8);
    let frame_bytes = usize::from(channels) * sample_bytes;
    let samples_mono = pcm_data
        .chunks_exact(frame_bytes)
        .map(|frame| {
            let sum: f32 = frame.chunks_exact(sample_bytes).map(decode).sum();
            sum / f32::from(channels)
        })
        .collect();

    Ok(WavData {
        sample_rate_hz,
        channels,
        samples_mono,
    })
}
