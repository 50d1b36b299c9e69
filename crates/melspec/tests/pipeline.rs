use melspec::filterbank::{MelFilterBank, breakpoint_bins};
use melspec::project::project_band;
use melspec::spectral::SpectralTransform;
use melspec::window::{hamming_window, window_frame};
use melspec::{
    AudioBuffer, DirectDft, FnYield, Framing, HeapAllocator, MelSpectrogram,
    MelSpectrogramExtractor, NoYield, RegionAllocator, RustFftMagnitude, SpectrogramConfig,
    SpectrogramError, compute_mel_spectrogram_into,
};

const SR: u32 = 16_000;

fn kws_config() -> SpectrogramConfig {
    SpectrogramConfig {
        mel_bands: 40,
        fft_size: 512,
        hop_size: 256,
        sample_rate: SR,
        ..SpectrogramConfig::default()
    }
}

fn tone(freq_hz: f32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq_hz * (i as f32) / SR as f32).sin())
        .collect()
}

#[test]
fn tone_lights_up_its_own_band() {
    let cfg = kws_config();
    let fb_cfg = cfg.filter_bank();
    let points = breakpoint_bins(&fb_cfg);

    // Upper bands are wide enough that Hamming leakage stays inside them.
    let band = 30;
    let center_bin = points[band + 1];
    assert!(center_bin - points[band] >= 4 && points[band + 2] - center_bin >= 4);
    let freq = center_bin as f32 * SR as f32 / cfg.fft_size as f32;

    let samples = tone(freq, SR as usize);
    let mut ex = MelSpectrogramExtractor::new(cfg).expect("extractor");
    let mel = ex.compute(&AudioBuffer::new(&samples, SR)).expect("compute");

    for frame in 0..mel.frames() {
        let column: Vec<f32> = mel.frame_column(frame).collect();
        let own = column[band];
        for (b, &v) in column.iter().enumerate() {
            if b != band {
                assert!(own - v > 0.5, "frame {frame}: band {band}={own}, band {b}={v}");
            }
        }
    }
}

#[test]
fn silence_is_minus_six_for_default_config() {
    let cfg = SpectrogramConfig::default();
    let samples = vec![0.0f32; 44_100];
    let mut ex = MelSpectrogramExtractor::new(cfg).expect("extractor");
    let mel = ex.compute(&AudioBuffer::new(&samples, 44_100)).expect("compute");

    assert_eq!(mel.bands(), 128);
    assert_eq!(mel.frames(), (44_100 - 512) / 256 + 1);
    assert!(mel.as_slice().iter().all(|&v| (v + 6.0).abs() < 1e-5));
}

#[test]
fn documented_frame_counts() {
    let cfg = SpectrogramConfig::default();
    assert_eq!(cfg.num_frames(441_000), 1721);
    assert_eq!(cfg.num_frames(512), 1);
}

#[test]
fn padded_tail_frame_matches_manual_reference() {
    let cfg = SpectrogramConfig {
        framing: Framing::PadTail,
        ..kws_config()
    };
    let samples = tone(1_000.0, 512 + 256 + 100);
    assert_eq!(cfg.num_frames(samples.len()), 3);

    let mut ex = MelSpectrogramExtractor::new(cfg).expect("extractor");
    let mel = ex.compute(&AudioBuffer::new(&samples, SR)).expect("compute");

    // Reference for the last frame: explicit zero-padded copy, windowed by hand.
    let start = 2 * 256;
    let mut padded = samples[start..].to_vec();
    padded.resize(512, 0.0);
    let window = hamming_window(512);
    let manual: Vec<f32> = padded.iter().zip(&window).map(|(x, w)| x * w).collect();

    let mut framed = vec![0.0f32; 512];
    window_frame(&samples, 2, 256, &window, &mut framed);
    assert_eq!(framed, manual);

    let mut fft = RustFftMagnitude::new(512);
    let mut spectrum = vec![0.0f32; 257];
    fft.magnitude(&manual, &mut spectrum);
    let fb = MelFilterBank::new(&cfg.filter_bank()).expect("filter bank");
    for band in 0..cfg.mel_bands {
        let want = project_band(&spectrum, fb.row(band));
        assert_eq!(mel.get(band, 2), want, "band {band}");
    }
}

#[test]
fn fft_and_direct_dft_pipelines_agree() {
    let cfg = SpectrogramConfig {
        mel_bands: 20,
        fft_size: 128,
        hop_size: 64,
        ..kws_config()
    };
    let samples: Vec<f32> = tone(440.0, 2_000)
        .iter()
        .zip(tone(3_100.0, 2_000))
        .map(|(a, b)| a + 0.3 * b)
        .collect();
    let audio = AudioBuffer::new(&samples, SR);
    let frames = cfg.num_frames(samples.len());

    let mut via_fft = MelSpectrogram::zeros(20, frames).expect("matrix");
    compute_mel_spectrogram_into(
        &cfg,
        &audio,
        &HeapAllocator,
        &mut RustFftMagnitude::new(128),
        &mut NoYield,
        &mut via_fft,
    )
    .expect("fft");

    let mut via_dft = MelSpectrogram::zeros(20, frames).expect("matrix");
    compute_mel_spectrogram_into(
        &cfg,
        &audio,
        &HeapAllocator,
        &mut DirectDft::new(128),
        &mut NoYield,
        &mut via_dft,
    )
    .expect("dft");

    for (a, b) in via_fft.as_slice().iter().zip(via_dft.as_slice()) {
        assert!((a - b).abs() < 5e-3, "{a} vs {b}");
    }
}

#[test]
fn region_backed_run_with_yield_hook() {
    let cfg = kws_config();
    let samples = tone(2_500.0, 8_000);
    let region = RegionAllocator::new(cfg.filter_bank().elements().expect("bank size"));

    let mut yields = 0usize;
    {
        let mut ex = MelSpectrogramExtractor::with_parts(
            cfg,
            &region,
            RustFftMagnitude::new(512),
            FnYield(|| yields += 1),
        )
        .expect("extractor");
        let mel = ex.compute(&AudioBuffer::new(&samples, SR)).expect("compute");
        assert_eq!(mel.frames(), (8_000 - 512) / 256 + 1);
        assert!(mel.as_slice().iter().all(|v| v.is_finite()));
    }

    // 30 frames: 8 frame-level yields, 2 band-level yields per frame (bands 0 and 32).
    assert_eq!(yields, 8 + 30 * 2);
    assert_eq!(region.in_use(), 0);
    assert_eq!(region.peak(), 40 * 257);
}

#[test]
fn region_exhaustion_is_reported() {
    let cfg = kws_config();
    let samples = tone(2_500.0, 4_000);
    let region = RegionAllocator::new(1_000);
    let mut ex = MelSpectrogramExtractor::new(cfg)
        .expect("extractor")
        .with_allocator(&region);

    let err = ex.compute(&AudioBuffer::new(&samples, SR)).expect_err("exhausted");
    assert!(matches!(err, SpectrogramError::AllocationFailure { requested: 10_280 }));
    assert_eq!(region.in_use(), 0);
}
