//! Default signal-processing constants.
//!
//! Defaults target a 10 s, 44.1 kHz recording on the embedded device.
//! Frame counts are never a constant: see [`crate::config::SpectrogramConfig::num_frames`].

pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 44_100;
pub const DEFAULT_MEL_BANDS: usize = 128;
pub const DEFAULT_FFT_SIZE: usize = 512;
pub const DEFAULT_HOP_SIZE: usize = 256; // 50% overlap

/// Additive floor inside the log so silence maps to `log10(1e-6) = -6`.
pub const LOG_EPSILON: f32 = 1e-6;

// Cooperative yield cadence.
pub const DEFAULT_YIELD_EVERY_FRAMES: usize = 4;
pub const DEFAULT_YIELD_EVERY_BANDS: usize = 32;

// mel(f) = 2595 * log10(1 + f / 700)
pub const MEL_SCALE: f64 = 2595.0;
pub const MEL_BREAK_HZ: f64 = 700.0;
