//! Mel spectrogram and MFCC summary of a mono clip.

use rustfft::FftPlanner;
use rustfft::num_complex::Complex;

/// STFT size in samples.
pub const FFT_SIZE: usize = 2048;
/// STFT hop in samples.
pub const HOP_SIZE: usize = 512;
/// Number of mel bands.
pub const MEL_BANDS: usize = 128;
/// Upper edge of the mel bank in Hz.
pub const MEL_F_MAX: f32 = 8_000.0;
/// Coefficients kept per frame.
pub const MFCC_COUNT: usize = 13;
/// Dynamic range kept by the dB conversion.
const TOP_DB: f32 = 80.0;
const POWER_FLOOR: f32 = 1e-10;

pub(crate) struct MelBank {
    filters: Vec<Vec<(usize, f32)>>,
}

impl MelBank {
    pub(crate) fn new(
        sample_rate: u32,
        fft_len: usize,
        mel_bands: usize,
        f_min: f32,
        f_max: f32,
    ) -> Self {
        let bins = mel_bins(sample_rate, fft_len, mel_bands, f_min, f_max);
        let filters = (0..mel_bands)
            .map(|m| {
                let left = bins[m];
                let center = bins[m + 1];
                let right = bins[m + 2].max(center + 1);
                tri_filter(left, center, right)
            })
            .collect();
        Self { filters }
    }

    pub(crate) fn apply(&self, power: &[f32]) -> Vec<f32> {
        self.filters
            .iter()
            .map(|filter| {
                filter
                    .iter()
                    .map(|&(bin, weight)| {
                        power.get(bin).copied().unwrap_or(0.0).max(0.0) as f64 * weight as f64
                    })
                    .sum::<f64>() as f32
            })
            .collect()
    }
}

/// Mel power spectrogram, one row of `MEL_BANDS` energies per frame.
///
/// Frames are centered: the signal is zero-padded by half a window on both
/// sides, so a clip of `n` samples yields `1 + n / HOP_SIZE` frames.
pub fn mel_spectrogram(samples: &[f32], sample_rate: u32) -> Vec<Vec<f32>> {
    let bank = MelBank::new(sample_rate, FFT_SIZE, MEL_BANDS, 0.0, MEL_F_MAX);
    let fft = FftPlanner::<f32>::new().plan_fft_forward(FFT_SIZE);
    let window = hann_window(FFT_SIZE);
    let pad = FFT_SIZE / 2;
    let frame_count = 1 + samples.len() / HOP_SIZE;
    let mut buffer = vec![Complex::new(0.0_f32, 0.0); FFT_SIZE];
    let mut frames = Vec::with_capacity(frame_count);
    for frame in 0..frame_count {
        let start = frame * HOP_SIZE;
        for (i, cell) in buffer.iter_mut().enumerate() {
            let sample = (start + i)
                .checked_sub(pad)
                .and_then(|pos| samples.get(pos))
                .copied()
                .unwrap_or(0.0);
            *cell = Complex::new(sanitize(sample) * window[i], 0.0);
        }
        fft.process(&mut buffer);
        let power: Vec<f32> = buffer[..FFT_SIZE / 2 + 1]
            .iter()
            .map(|c| c.norm_sqr())
            .collect();
        frames.push(bank.apply(&power));
    }
    frames
}

/// Per-frame MFCCs from a mel power spectrogram.
pub fn mfcc_from_mel(mel_frames: &[Vec<f32>], count: usize) -> Vec<Vec<f32>> {
    let db = power_to_db(mel_frames);
    db.iter().map(|frame| dct_ii_ortho(frame, count)).collect()
}

/// Mean over frames of the MFCCs of a clip: the feature vector of a mix.
pub fn mean_mfcc(samples: &[f32], sample_rate: u32) -> Vec<f32> {
    let mfcc = mfcc_from_mel(&mel_spectrogram(samples, sample_rate), MFCC_COUNT);
    let mut mean = vec![0.0_f64; MFCC_COUNT];
    for frame in &mfcc {
        for (acc, value) in mean.iter_mut().zip(frame) {
            *acc += *value as f64;
        }
    }
    let frames = mfcc.len().max(1) as f64;
    mean.into_iter().map(|v| (v / frames) as f32).collect()
}

/// `10 * log10(power)` clipped to `TOP_DB` below the loudest cell.
fn power_to_db(frames: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let db: Vec<Vec<f32>> = frames
        .iter()
        .map(|frame| {
            frame
                .iter()
                .map(|&p| 10.0 * p.max(POWER_FLOOR).log10())
                .collect()
        })
        .collect();
    let peak = db
        .iter()
        .flatten()
        .copied()
        .fold(f32::NEG_INFINITY, f32::max);
    let floor = peak - TOP_DB;
    db.into_iter()
        .map(|frame| frame.into_iter().map(|v| v.max(floor)).collect())
        .collect()
}

fn dct_ii_ortho(values: &[f32], count: usize) -> Vec<f32> {
    let n = values.len().max(1) as f64;
    (0..count)
        .map(|k| {
            let mut sum = 0.0_f64;
            for (m, &v) in values.iter().enumerate() {
                let angle = std::f64::consts::PI * (k as f64) * ((m as f64) + 0.5) / n;
                sum += v as f64 * angle.cos();
            }
            let scale = if k == 0 {
                (1.0 / n).sqrt()
            } else {
                (2.0 / n).sqrt()
            };
            (sum * scale) as f32
        })
        .collect()
}

fn hann_window(length: usize) -> Vec<f32> {
    // Periodic window, as used for spectral analysis.
    (0..length)
        .map(|n| {
            0.5_f32 * (1.0 - (2.0 * std::f32::consts::PI * n as f32 / length as f32).cos())
        })
        .collect()
}

fn sanitize(sample: f32) -> f32 {
    if sample.is_finite() {
        sample.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

fn mel_bins(
    sample_rate: u32,
    fft_len: usize,
    mel_bands: usize,
    f_min: f32,
    f_max: f32,
) -> Vec<usize> {
    let nyquist = sample_rate.max(1) as f32 * 0.5;
    let f_max = f_max.min(nyquist).max(f_min);
    let mel_min = hz_to_mel(f_min);
    let mel_max = hz_to_mel(f_max);
    (0..(mel_bands + 2))
        .map(|i| {
            let t = i as f32 / (mel_bands + 1) as f32;
            let hz = mel_to_hz(mel_min + (mel_max - mel_min) * t);
            freq_to_bin(hz, sample_rate, fft_len)
        })
        .collect()
}

fn tri_filter(left: usize, center: usize, right: usize) -> Vec<(usize, f32)> {
    let mut weights = Vec::new();
    for bin in left..=right {
        let w = if bin < center {
            (bin - left) as f32 / (center - left) as f32
        } else {
            (right - bin) as f32 / (right - center) as f32
        };
        if w > 0.0 {
            weights.push((bin, w));
        }
    }
    weights
}

fn freq_to_bin(freq_hz: f32, sample_rate: u32, fft_len: usize) -> usize {
    let nyquist = sample_rate.max(1) as f32 * 0.5;
    let freq = freq_hz.clamp(0.0, nyquist);
    (((freq * fft_len as f32) / sample_rate.max(1) as f32).floor() as usize).min(fft_len / 2)
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0_f32 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0_f32 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}
