use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use melspec::audio::parse_wav_bytes;
use melspec::features::save_spectrogram;
use melspec::{
    BufferAllocator, Framing, HeapAllocator, MelSpectrogram, MelSpectrogramExtractor,
    RegionAllocator, RustFftMagnitude, SpectrogramConfig, ThreadYield,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "melspec")]
#[command(about = "Compute a log-mel spectrogram from a WAV file", long_about = None)]
struct Args {
    /// Path to a WAV file (16-bit PCM or 32-bit float).
    #[arg(long)]
    audio: PathBuf,

    /// JSON spectrogram config; flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    mel_bands: Option<usize>,

    /// Must be a power of two.
    #[arg(long)]
    fft_size: Option<usize>,

    #[arg(long)]
    hop_size: Option<usize>,

    /// Target sample rate; the WAV is resampled to it.
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Keep the trailing partial frame (zero-padded).
    #[arg(long, default_value_t = false)]
    pad_tail: bool,

    /// Take the filter bank from a fixed region of this many f32 elements
    /// instead of the heap.
    #[arg(long)]
    region_capacity: Option<usize>,

    /// Write features to this safetensors file.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Debug-level logging (RUST_LOG overrides).
    #[arg(long, short, default_value_t = false)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let cfg = build_config(&args)?;
    let (mel, cfg) = match args.region_capacity {
        Some(capacity) => {
            let region = RegionAllocator::new(capacity);
            let out = run_file(&args.audio, cfg, &region)?;
            info!(
                capacity,
                peak = region.peak(),
                "filter bank served from region"
            );
            out
        }
        None => run_file(&args.audio, cfg, HeapAllocator)?,
    };

    report(&mel);

    if let Some(path) = &args.out {
        save_spectrogram(path, &mel, &cfg)
            .with_context(|| format!("write features {}", path.display()))?;
        info!(path = %path.display(), "features written");
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(args: &Args) -> Result<SpectrogramConfig> {
    let mut cfg = match &args.config {
        Some(path) => SpectrogramConfig::from_path(path)?,
        None => SpectrogramConfig::default(),
    };

    if let Some(v) = args.mel_bands {
        cfg.mel_bands = v;
    }
    if let Some(v) = args.fft_size {
        cfg.fft_size = v;
    }
    if let Some(v) = args.hop_size {
        cfg.hop_size = v;
    }
    if let Some(v) = args.sample_rate {
        cfg.sample_rate = v;
    }
    if args.pad_tail {
        cfg.framing = Framing::PadTail;
    }

    cfg.validate().context("invalid spectrogram config")?;
    Ok(cfg)
}

fn run_file<A: BufferAllocator>(
    path: &Path,
    cfg: SpectrogramConfig,
    allocator: A,
) -> Result<(MelSpectrogram, SpectrogramConfig)> {
    let bytes = std::fs::read(path).with_context(|| format!("read file {}", path.display()))?;
    let mut wav = parse_wav_bytes(&bytes).context("parse wav")?;
    info!(
        sample_rate = wav.sample_rate_hz,
        channels = wav.channels,
        seconds = wav.duration_secs(),
        "loaded audio"
    );

    if wav.sample_rate_hz != cfg.sample_rate {
        warn!(
            from = wav.sample_rate_hz,
            to = cfg.sample_rate,
            "resampling input"
        );
        wav.resample_to(cfg.sample_rate);
    }

    let mut extractor = MelSpectrogramExtractor::with_parts(
        cfg,
        allocator,
        RustFftMagnitude::new(cfg.fft_size),
        ThreadYield,
    )
    .context("set up extractor")?;
    let mel = extractor
        .compute(&wav.as_buffer())
        .context("compute mel spectrogram")?;
    Ok((mel, cfg))
}

fn report(mel: &MelSpectrogram) {
    let values = mel.as_slice();
    if values.is_empty() {
        warn!(bands = mel.bands(), "input shorter than one frame, no features");
        return;
    }
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mean = values.iter().sum::<f32>() / values.len() as f32;
    info!(
        bands = mel.bands(),
        frames = mel.frames(),
        min,
        max,
        mean,
        "mel spectrogram"
    );
}
