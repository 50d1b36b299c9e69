//! Pipeline configuration (`SpectrogramConfig`) and validation.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    DEFAULT_FFT_SIZE, DEFAULT_HOP_SIZE, DEFAULT_MEL_BANDS, DEFAULT_SAMPLE_RATE_HZ,
    DEFAULT_YIELD_EVERY_BANDS, DEFAULT_YIELD_EVERY_FRAMES,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("mel band count must be at least 1")]
    NoMelBands,
    #[error("fft size must be a power of two >= 2, got {0}")]
    BadFftSize(usize),
    #[error("hop size must be at least 1")]
    ZeroHop,
    #[error("sample rate must be positive")]
    ZeroSampleRate,
}

/// How the frame count is derived from the input length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// Only frames that lie fully inside the buffer.
    #[default]
    Exact,
    /// Also emit the trailing partial frame, zero-padded.
    PadTail,
}

/// Parameters of the triangular filter bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterBankConfig {
    pub mel_bands: usize,
    pub fft_size: usize,
    pub sample_rate: u32,
}

impl FilterBankConfig {
    /// Number of magnitude bins, `fft_size / 2 + 1`.
    pub fn bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Elements needed to hold the whole bank, `None` if that overflows `usize`.
    pub fn elements(&self) -> Option<usize> {
        self.mel_bands.checked_mul(self.bins())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mel_bands == 0 {
            return Err(ConfigError::NoMelBands);
        }
        if self.fft_size < 2 || !self.fft_size.is_power_of_two() {
            return Err(ConfigError::BadFftSize(self.fft_size));
        }
        if self.sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrogramConfig {
    pub mel_bands: usize,
    pub fft_size: usize,
    pub hop_size: usize,
    pub sample_rate: u32,
    pub framing: Framing,
    /// Yield before every n-th frame; 0 disables.
    pub yield_every_frames: usize,
    /// Yield before every n-th band within a frame; 0 disables.
    pub yield_every_bands: usize,
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            mel_bands: DEFAULT_MEL_BANDS,
            fft_size: DEFAULT_FFT_SIZE,
            hop_size: DEFAULT_HOP_SIZE,
            sample_rate: DEFAULT_SAMPLE_RATE_HZ,
            framing: Framing::Exact,
            yield_every_frames: DEFAULT_YIELD_EVERY_FRAMES,
            yield_every_bands: DEFAULT_YIELD_EVERY_BANDS,
        }
    }
}

impl SpectrogramConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json).context("parse spectrogram config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_json_str(&json)
    }

    pub fn filter_bank(&self) -> FilterBankConfig {
        FilterBankConfig {
            mel_bands: self.mel_bands,
            fft_size: self.fft_size,
            sample_rate: self.sample_rate,
        }
    }

    /// Magnitude bins per spectrum, `fft_size / 2 + 1`.
    pub fn bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.filter_bank().validate()?;
        if self.hop_size == 0 {
            return Err(ConfigError::ZeroHop);
        }
        Ok(())
    }

    /// Number of analysis frames for `total_samples` of input.
    ///
    /// Exact framing: `floor((total - fft) / hop) + 1` when `total >= fft`, else 0.
    /// Tail padding adds the final partial frame when one exists.
    #[must_use]
    pub fn num_frames(&self, total_samples: usize) -> usize {
        debug_assert!(self.hop_size > 0);
        match self.framing {
            Framing::Exact => {
                if total_samples < self.fft_size {
                    0
                } else {
                    (total_samples - self.fft_size) / self.hop_size + 1
                }
            }
            Framing::PadTail => {
                if total_samples == 0 {
                    0
                } else if total_samples <= self.fft_size {
                    1
                } else {
                    (total_samples - self.fft_size).div_ceil(self.hop_size) + 1
                }
            }
        }
    }
}
