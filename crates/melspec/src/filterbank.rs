//! Triangular mel filter bank.
//!
//! Breakpoints are spaced evenly on the HTK mel scale between 0 Hz and
//! Nyquist, mapped to FFT bins with `floor((fft_size + 1) * hz / sample_rate)`,
//! and each band is a rising/falling triangle over three consecutive
//! breakpoints. Weights are unnormalized (peak 1).

use std::ops::Range;

use crate::config::FilterBankConfig;
use crate::constants::{MEL_BREAK_HZ, MEL_SCALE};

#[inline]
#[must_use]
pub fn hz_to_mel(hz: f64) -> f64 {
    MEL_SCALE * (1.0 + hz / MEL_BREAK_HZ).log10()
}

#[inline]
#[must_use]
pub fn mel_to_hz(mel: f64) -> f64 {
    MEL_BREAK_HZ * (10f64.powf(mel / MEL_SCALE) - 1.0)
}

/// FFT bin index of each of the `mel_bands + 2` breakpoints.
#[must_use]
pub fn breakpoint_bins(cfg: &FilterBankConfig) -> Vec<usize> {
    let sample_rate = f64::from(cfg.sample_rate);
    let mel_high = hz_to_mel(sample_rate / 2.0);
    let step = mel_high / ((cfg.mel_bands + 1) as f64);

    (0..cfg.mel_bands + 2)
        .map(|i| {
            let hz = mel_to_hz(step * (i as f64));
            let bin = ((cfg.fft_size + 1) as f64 * hz / sample_rate).floor();
            // Rounding in the mel round-trip can leave a tiny negative at 0 Hz.
            bin.max(0.0) as usize
        })
        .collect()
}

/// Write the filter bank into `out` as `[band][bin]`, band-major.
///
/// `out` must hold exactly `cfg.mel_bands * (cfg.fft_size / 2 + 1)` elements.
/// A band whose breakpoints collapse gets a zero segment instead of a
/// division by zero.
pub fn fill_filter_bank(cfg: &FilterBankConfig, out: &mut [f32]) {
    debug_assert_eq!(Some(out.len()), cfg.elements());

    let n_bins = cfg.bins();
    let points = breakpoint_bins(cfg);

    for (band, row) in out.chunks_exact_mut(n_bins).enumerate() {
        let (left, center, right) = (points[band], points[band + 1], points[band + 2]);
        for (k, w) in row.iter_mut().enumerate() {
            *w = if k < left || k >= right {
                0.0
            } else if k < center {
                // center > left here, the range is otherwise empty.
                (k - left) as f32 / (center - left) as f32
            } else if right > center {
                (right - k) as f32 / (right - center) as f32
            } else {
                0.0
            };
        }
    }
}

/// Owned filter bank, `mel_bands` rows of `fft_size / 2 + 1` weights.
#[derive(Debug, Clone, PartialEq)]
pub struct MelFilterBank {
    weights: Vec<f32>,
    bands: usize,
    bins: usize,
}

impl MelFilterBank {
    /// Build the bank on the heap; `None` if it does not fit in memory.
    pub fn new(cfg: &FilterBankConfig) -> Option<Self> {
        let len = cfg.elements()?;
        let mut weights = Vec::new();
        weights.try_reserve_exact(len).ok()?;
        weights.resize(len, 0.0f32);
        fill_filter_bank(cfg, &mut weights);
        Some(Self {
            weights,
            bands: cfg.mel_bands,
            bins: cfg.bins(),
        })
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn row(&self, band: usize) -> &[f32] {
        &self.weights[band * self.bins..(band + 1) * self.bins]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.weights
    }

    /// Bins with non-zero weight for `band`, or `None` for a degenerate row.
    pub fn support(&self, band: usize) -> Option<Range<usize>> {
        let row = self.row(band);
        let start = row.iter().position(|&w| w > 0.0)?;
        let end = row.iter().rposition(|&w| w > 0.0)? + 1;
        Some(start..end)
    }
}
