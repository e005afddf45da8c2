use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};

/// Mono float WAV holding a sine tone.
pub fn write_tone_wav(path: &Path, sample_rate: u32, freq: f32, seconds: f32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create wav parent dirs");
    }
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav writer");
    let frames = (sample_rate as f32 * seconds) as usize;
    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        let sample = 0.3 * (2.0 * std::f32::consts::PI * freq * t).sin();
        writer.write_sample(sample).expect("write wav sample");
    }
    writer.finalize().expect("finalize wav");
}

/// Six voices of `takes` short recordings each, named `take{t}_flute_{voice}_.wav`.
pub fn write_flute_bank(dir: &Path, takes: usize) {
    for voice in 0..6 {
        for take in 0..takes {
            let freq = 180.0 + 120.0 * voice as f32 + 35.0 * take as f32;
            let path = dir.join(format!("take{take}_flute_{voice}_.wav"));
            write_tone_wav(&path, 22_050, freq, 0.05);
        }
    }
}

/// Solid-colour PNG frames named `frame_{i:03}.png`.
pub fn write_frames(dir: &Path, colours: &[[u8; 3]]) -> Vec<PathBuf> {
    std::fs::create_dir_all(dir).expect("create frame dir");
    colours
        .iter()
        .enumerate()
        .map(|(i, colour)| {
            let path = dir.join(format!("frame_{i:03}.png"));
            RgbImage::from_pixel(24, 16, Rgb(*colour))
                .save(&path)
                .expect("write frame");
            path
        })
        .collect()
}

/// Greys spread evenly from black to white.
pub fn grey_ramp(count: usize) -> Vec<[u8; 3]> {
    (0..count)
        .map(|i| {
            let level = (i * 255 / count.saturating_sub(1).max(1)) as u8;
            [level, level, level]
        })
        .collect()
}
