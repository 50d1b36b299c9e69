//! Forward real-input magnitude spectrum.
//!
//! The orchestrator only sees [`SpectralTransform`]; the FFT kernel itself
//! comes from `rustfft`. Every transform owns its own work buffers, so two
//! pipelines never share scratch state.

use std::sync::Arc;

use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

pub trait SpectralTransform {
    /// Frame length this transform accepts.
    fn fft_size(&self) -> usize;

    /// Write `|X[k]|` for `k in 0..=fft_size/2` into `spectrum`.
    ///
    /// `frame.len()` must equal `fft_size()` and `spectrum.len()` must equal
    /// `fft_size() / 2 + 1`.
    fn magnitude(&mut self, frame: &[f32], spectrum: &mut [f32]);
}

impl<T: SpectralTransform + ?Sized> SpectralTransform for &mut T {
    fn fft_size(&self) -> usize {
        (**self).fft_size()
    }

    fn magnitude(&mut self, frame: &[f32], spectrum: &mut [f32]) {
        (**self).magnitude(frame, spectrum);
    }
}

/// Planned `rustfft` forward transform.
pub struct RustFftMagnitude {
    fft: Arc<dyn Fft<f32>>,
    buf: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl std::fmt::Debug for RustFftMagnitude {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RustFftMagnitude")
            .field("fft_size", &self.buf.len())
            .finish_non_exhaustive()
    }
}

impl RustFftMagnitude {
    #[must_use]
    pub fn new(fft_size: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch = vec![Complex32::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Self {
            fft,
            buf: vec![Complex32::new(0.0, 0.0); fft_size],
            scratch,
        }
    }
}

impl SpectralTransform for RustFftMagnitude {
    fn fft_size(&self) -> usize {
        self.buf.len()
    }

    fn magnitude(&mut self, frame: &[f32], spectrum: &mut [f32]) {
        debug_assert_eq!(frame.len(), self.buf.len());
        debug_assert_eq!(spectrum.len(), self.buf.len() / 2 + 1);

        for (dst, &x) in self.buf.iter_mut().zip(frame) {
            *dst = Complex32::new(x, 0.0);
        }
        self.fft.process_with_scratch(&mut self.buf, &mut self.scratch);

        for (m, c) in spectrum.iter_mut().zip(&self.buf) {
            *m = c.norm();
        }
    }
}

/// Direct DFT over precomputed cos/sin tables, `O(N^2)`.
///
/// Slow but literal; used to cross-check the FFT path.
#[derive(Debug, Clone)]
pub struct DirectDft {
    n: usize,
    cos_t: Vec<f32>, // [n_freq * n]
    sin_t: Vec<f32>, // [n_freq * n]
}

impl DirectDft {
    #[must_use]
    pub fn new(fft_size: usize) -> Self {
        let n_freq = fft_size / 2 + 1;
        let mut cos_t = vec![0.0f32; n_freq * fft_size];
        let mut sin_t = vec![0.0f32; n_freq * fft_size];

        for k in 0..n_freq {
            for n in 0..fft_size {
                // Reduce k*n mod N first to keep the angle small in f32.
                let phase = (k * n) % fft_size;
                let angle = 2.0 * std::f64::consts::PI * (phase as f64) / (fft_size as f64);
                cos_t[k * fft_size + n] = angle.cos() as f32;
                sin_t[k * fft_size + n] = angle.sin() as f32;
            }
        }

        Self {
            n: fft_size,
            cos_t,
            sin_t,
        }
    }
}

impl SpectralTransform for DirectDft {
    fn fft_size(&self) -> usize {
        self.n
    }

    fn magnitude(&mut self, frame: &[f32], spectrum: &mut [f32]) {
        debug_assert_eq!(frame.len(), self.n);
        debug_assert_eq!(spectrum.len(), self.n / 2 + 1);

        for (k, mk) in spectrum.iter_mut().enumerate() {
            let cos_row = &self.cos_t[k * self.n..(k + 1) * self.n];
            let sin_row = &self.sin_t[k * self.n..(k + 1) * self.n];
            let mut re = 0.0f32;
            let mut im = 0.0f32;
            for n in 0..self.n {
                re += frame[n] * cos_row[n];
                im -= frame[n] * sin_row[n];
            }
            *mk = (re * re + im * im).sqrt();
        }
    }
}
