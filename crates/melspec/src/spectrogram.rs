//! Whole-buffer mel spectrogram orchestration.
//!
//! Per invocation: validate, acquire the filter-bank buffer from the injected
//! allocator, build the bank once, then walk frames in order and bands in
//! order, writing each `[band][frame]` cell exactly once. The filter-bank
//! buffer is released on every exit path.

use thiserror::Error;
use tracing::{debug, error, info};

use crate::alloc::{BufferAllocator, HeapAllocator, ScopedBuffer};
use crate::config::{ConfigError, SpectrogramConfig};
use crate::cooperative::{CooperativeYield, NoYield, yield_due};
use crate::filterbank::fill_filter_bank;
use crate::project::project_band;
use crate::spectral::{RustFftMagnitude, SpectralTransform};
use crate::window::{hamming_window, window_frame};

const PROGRESS_EVERY_FRAMES: usize = 256;

#[derive(Debug, Error)]
pub enum SpectrogramError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to allocate filter bank ({requested} f32 elements)")]
    AllocationFailure { requested: usize },
    #[error("audio is {actual} Hz but the pipeline is configured for {expected} Hz")]
    SampleRateMismatch { expected: u32, actual: u32 },
    #[error("output matrix is {bands}x{frames}, expected {expected_bands}x{expected_frames}")]
    ShapeMismatch {
        bands: usize,
        frames: usize,
        expected_bands: usize,
        expected_frames: usize,
    },
    #[error("spectral transform size {actual} does not match fft size {expected}")]
    TransformSize { expected: usize, actual: usize },
}

/// Borrowed mono PCM input.
#[derive(Debug, Clone, Copy)]
pub struct AudioBuffer<'a> {
    samples: &'a [f32],
    sample_rate: u32,
}

impl<'a> AudioBuffer<'a> {
    #[must_use]
    pub fn new(samples: &'a [f32], sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &'a [f32] {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Log-mel matrix addressed `[band][frame]`, stored band-major.
#[derive(Debug, Clone, PartialEq)]
pub struct MelSpectrogram {
    data: Vec<f32>, // [bands * frames]
    bands: usize,
    frames: usize,
}

impl MelSpectrogram {
    /// `None` when `bands x frames` overflows or cannot be allocated.
    pub fn zeros(bands: usize, frames: usize) -> Option<Self> {
        Self::filled(bands, frames, 0.0)
    }

    pub fn filled(bands: usize, frames: usize, value: f32) -> Option<Self> {
        let len = bands.checked_mul(frames)?;
        let mut data = Vec::new();
        data.try_reserve_exact(len).ok()?;
        data.resize(len, value);
        Some(Self {
            data,
            bands,
            frames,
        })
    }

    /// Wrap band-major `data`; `None` when the length does not match.
    pub fn from_band_major(bands: usize, frames: usize, data: Vec<f32>) -> Option<Self> {
        (bands.checked_mul(frames) == Some(data.len())).then_some(Self {
            data,
            bands,
            frames,
        })
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn get(&self, band: usize, frame: usize) -> f32 {
        self.data[band * self.frames + frame]
    }

    /// One band across all frames.
    pub fn band(&self, band: usize) -> &[f32] {
        &self.data[band * self.frames..(band + 1) * self.frames]
    }

    /// One frame across all bands.
    pub fn frame_column(&self, frame: usize) -> impl Iterator<Item = f32> + '_ {
        self.data[frame..].iter().step_by(self.frames.max(1)).copied()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    fn set(&mut self, band: usize, frame: usize, value: f32) {
        self.data[band * self.frames + frame] = value;
    }
}

/// Compute the log-mel spectrogram of `audio` into `out`.
///
/// `out` must be `cfg.mel_bands x cfg.num_frames(audio.len())`. All checks
/// and the filter-bank allocation happen before the first write, so on any
/// error `out` is left as it was.
pub fn compute_mel_spectrogram_into<A, T, Y>(
    cfg: &SpectrogramConfig,
    audio: &AudioBuffer<'_>,
    allocator: &A,
    transform: &mut T,
    yielder: &mut Y,
    out: &mut MelSpectrogram,
) -> Result<(), SpectrogramError>
where
    A: BufferAllocator + ?Sized,
    T: SpectralTransform + ?Sized,
    Y: CooperativeYield + ?Sized,
{
    cfg.validate()?;
    if audio.sample_rate() != cfg.sample_rate {
        return Err(SpectrogramError::SampleRateMismatch {
            expected: cfg.sample_rate,
            actual: audio.sample_rate(),
        });
    }
    if transform.fft_size() != cfg.fft_size {
        return Err(SpectrogramError::TransformSize {
            expected: cfg.fft_size,
            actual: transform.fft_size(),
        });
    }

    let num_frames = cfg.num_frames(audio.len());
    if out.bands() != cfg.mel_bands || out.frames() != num_frames {
        return Err(SpectrogramError::ShapeMismatch {
            bands: out.bands(),
            frames: out.frames(),
            expected_bands: cfg.mel_bands,
            expected_frames: num_frames,
        });
    }

    info!(
        samples = audio.len(),
        bands = cfg.mel_bands,
        frames = num_frames,
        "starting mel spectrogram"
    );

    let fb_cfg = cfg.filter_bank();
    let Some(requested) = fb_cfg.elements() else {
        error!(bands = cfg.mel_bands, "mel filter bank size overflows usize");
        return Err(SpectrogramError::AllocationFailure {
            requested: usize::MAX,
        });
    };
    let Some(mut filters) = ScopedBuffer::acquire(allocator, requested) else {
        error!(requested, "failed to allocate mel filter bank");
        return Err(SpectrogramError::AllocationFailure { requested });
    };
    fill_filter_bank(&fb_cfg, &mut filters);
    debug!(bands = fb_cfg.mel_bands, bins = fb_cfg.bins(), "mel filter bank built");

    let n_bins = cfg.bins();
    let window = hamming_window(cfg.fft_size);
    let mut frame_buf = vec![0.0f32; cfg.fft_size];
    let mut spectrum = vec![0.0f32; n_bins];

    for frame in 0..num_frames {
        if yield_due(frame, cfg.yield_every_frames) {
            yielder.yield_now();
        }

        window_frame(audio.samples(), frame, cfg.hop_size, &window, &mut frame_buf);
        transform.magnitude(&frame_buf, &mut spectrum);

        for (band, row) in filters.chunks_exact(n_bins).enumerate() {
            if yield_due(band, cfg.yield_every_bands) {
                yielder.yield_now();
            }
            out.set(band, frame, project_band(&spectrum, row));
        }

        if frame > 0 && frame % PROGRESS_EVERY_FRAMES == 0 {
            debug!(frame, num_frames, "mel spectrogram progress");
        }
    }

    info!(frames = num_frames, "mel spectrogram complete");
    Ok(())
}

/// Owns a configuration and the three capabilities the pipeline needs.
///
/// Defaults to the process heap, a `rustfft` transform and no yielding.
#[derive(Debug)]
pub struct MelSpectrogramExtractor<A = HeapAllocator, T = RustFftMagnitude, Y = NoYield> {
    config: SpectrogramConfig,
    allocator: A,
    transform: T,
    yielder: Y,
}

impl MelSpectrogramExtractor {
    pub fn new(config: SpectrogramConfig) -> Result<Self, SpectrogramError> {
        config.validate()?;
        let transform = RustFftMagnitude::new(config.fft_size);
        Ok(Self {
            config,
            allocator: HeapAllocator,
            transform,
            yielder: NoYield,
        })
    }
}

impl<A, T, Y> MelSpectrogramExtractor<A, T, Y>
where
    A: BufferAllocator,
    T: SpectralTransform,
    Y: CooperativeYield,
{
    pub fn with_parts(
        config: SpectrogramConfig,
        allocator: A,
        transform: T,
        yielder: Y,
    ) -> Result<Self, SpectrogramError> {
        config.validate()?;
        if transform.fft_size() != config.fft_size {
            return Err(SpectrogramError::TransformSize {
                expected: config.fft_size,
                actual: transform.fft_size(),
            });
        }
        Ok(Self {
            config,
            allocator,
            transform,
            yielder,
        })
    }

    #[must_use]
    pub fn with_allocator<A2: BufferAllocator>(
        self,
        allocator: A2,
    ) -> MelSpectrogramExtractor<A2, T, Y> {
        MelSpectrogramExtractor {
            config: self.config,
            allocator,
            transform: self.transform,
            yielder: self.yielder,
        }
    }

    #[must_use]
    pub fn with_yield<Y2: CooperativeYield>(
        self,
        yielder: Y2,
    ) -> MelSpectrogramExtractor<A, T, Y2> {
        MelSpectrogramExtractor {
            config: self.config,
            allocator: self.allocator,
            transform: self.transform,
            yielder,
        }
    }

    pub fn config(&self) -> &SpectrogramConfig {
        &self.config
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    pub fn num_frames(&self, total_samples: usize) -> usize {
        self.config.num_frames(total_samples)
    }

    pub fn compute(
        &mut self,
        audio: &AudioBuffer<'_>,
    ) -> Result<MelSpectrogram, SpectrogramError> {
        let bands = self.config.mel_bands;
        let frames = self.num_frames(audio.len());
        let mut out = MelSpectrogram::zeros(bands, frames).ok_or(
            SpectrogramError::AllocationFailure {
                requested: bands.saturating_mul(frames),
            },
        )?;
        self.compute_into(audio, &mut out)?;
        Ok(out)
    }

    pub fn compute_into(
        &mut self,
        audio: &AudioBuffer<'_>,
        out: &mut MelSpectrogram,
    ) -> Result<(), SpectrogramError> {
        compute_mel_spectrogram_into(
            &self.config,
            audio,
            &self.allocator,
            &mut self.transform,
            &mut self.yielder,
            out,
        )
    }
}
