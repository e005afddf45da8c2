//! Flute recordings: decoding, cropping, mixing and MFCC summaries.

pub mod mfcc;
mod resample;
mod voices;

use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

pub use mfcc::{MFCC_COUNT, mean_mfcc};
pub use voices::{FluteMixExtractor, VOICE_COUNT, VoiceBank, VoiceBankError, voice_of};

use resample::resample_linear_into;

/// Rate every clip is brought to before mixing.
pub const MIX_SAMPLE_RATE: u32 = 44_100;
/// Length of the centered excerpt taken from every take.
pub const CROP_SECONDS: f32 = 1.0;

const PCM24_PEAK: f32 = 8_388_607.0;

/// Mono samples decoded from a WAV file at its native rate.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Decode a WAV file and downmix it to mono in `[-1, 1]`.
pub fn decode_wav_mono(path: &Path) -> Result<DecodedClip, String> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|err| format!("Failed to open {}: {err}", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;
    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|err| format!("Failed to decode {}: {err}", path.display()))?,
        SampleFormat::Int => {
            let scale = (1_i64 << spec.bits_per_sample.saturating_sub(1).min(31)) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|err| format!("Failed to decode {}: {err}", path.display()))?
        }
    };
    Ok(DecodedClip {
        samples: downmix_to_mono(&interleaved, channels),
        sample_rate: spec.sample_rate.max(1),
    })
}

/// Decode `path`, resample it to `MIX_SAMPLE_RATE` and keep the centered
/// `CROP_SECONDS` excerpt.
pub fn load_middle_crop(path: &Path) -> Result<Vec<f32>, String> {
    let decoded = decode_wav_mono(path)?;
    let mut resampled = Vec::new();
    resample_linear_into(
        &mut resampled,
        &decoded.samples,
        decoded.sample_rate,
        MIX_SAMPLE_RATE,
    );
    let crop_len = (CROP_SECONDS * MIX_SAMPLE_RATE as f32).round() as usize;
    Ok(middle_crop(&resampled, crop_len))
}

/// Centered window of `len` samples; shorter clips are zero-padded at the end.
pub fn middle_crop(samples: &[f32], len: usize) -> Vec<f32> {
    let start = (samples.len() / 2).saturating_sub(len / 2);
    let mut out: Vec<f32> = samples.iter().skip(start).take(len).copied().collect();
    out.resize(len, 0.0);
    out
}

/// Sample-wise mean of equally long clips.
pub fn mean_mix<C: AsRef<[f32]>>(clips: &[C]) -> Vec<f32> {
    let len = clips
        .iter()
        .map(|clip| clip.as_ref().len())
        .max()
        .unwrap_or(0);
    let mut mix = vec![0.0_f32; len];
    for clip in clips {
        for (acc, sample) in mix.iter_mut().zip(clip.as_ref()) {
            *acc += *sample;
        }
    }
    let count = clips.len().max(1) as f32;
    for sample in &mut mix {
        *sample /= count;
    }
    mix
}

/// Write mono samples as 24-bit PCM.
pub fn write_wav_pcm24(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), String> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 24,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)
        .map_err(|err| format!("Failed to create {}: {err}", path.display()))?;
    for &sample in samples {
        let clamped = if sample.is_finite() {
            sample.clamp(-1.0, 1.0)
        } else {
            0.0
        };
        writer
            .write_sample((clamped * PCM24_PEAK).round() as i32)
            .map_err(|err| format!("Failed to write {}: {err}", path.display()))?;
    }
    writer
        .finalize()
        .map_err(|err| format!("Failed to finalize {}: {err}", path.display()))
}

fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}
