use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::pool::{COMBINATION_LENGTH, CandidateIndex, Combination, has_extension};
use crate::provider::{FeatureExtractor, OnceCache};

use super::{MIX_SAMPLE_RATE, load_middle_crop, mean_mfcc, mean_mix};

/// One voice per combination digit.
pub const VOICE_COUNT: usize = COMBINATION_LENGTH;

/// Errors raised while grouping recordings into voices.
#[derive(Debug, Error)]
pub enum VoiceBankError {
    #[error("Failed to read audio folder {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("No recordings found for voice {voice}")]
    MissingVoice { voice: usize },
}

/// Voice of a recording: the second-to-last character of its file stem.
///
/// `flute_take_3_.wav` belongs to voice 3. Stems whose character is not a
/// digit below `VOICE_COUNT` belong to no voice.
pub fn voice_of(path: &Path) -> Option<usize> {
    let stem = path.file_stem()?.to_str()?;
    let mut chars = stem.chars().rev();
    chars.next()?;
    let voice = chars.next()?.to_digit(10)? as usize;
    (voice < VOICE_COUNT).then_some(voice)
}

/// Recordings grouped by voice, each voice sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceBank {
    voices: [Vec<PathBuf>; VOICE_COUNT],
}

impl VoiceBank {
    /// Group `paths` by voice. Paths belonging to no voice are dropped.
    pub fn from_paths(paths: impl IntoIterator<Item = PathBuf>) -> Result<Self, VoiceBankError> {
        let mut voices: [Vec<PathBuf>; VOICE_COUNT] = Default::default();
        for path in paths {
            if let Some(voice) = voice_of(&path) {
                voices[voice].push(path);
            }
        }
        for (voice, takes) in voices.iter_mut().enumerate() {
            if takes.is_empty() {
                return Err(VoiceBankError::MissingVoice { voice });
            }
            takes.sort();
        }
        Ok(Self { voices })
    }

    /// Collect every `*.wav` directly inside `dir`.
    pub fn discover(dir: &Path) -> Result<Self, VoiceBankError> {
        let read_err = |source| VoiceBankError::ReadDir {
            path: dir.to_path_buf(),
            source,
        };
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(read_err)? {
            let path = entry.map_err(read_err)?.path();
            if path.is_file() && has_extension(&path, &["wav"]) {
                paths.push(path);
            }
        }
        let bank = Self::from_paths(paths)?;
        for (voice, takes) in bank.voices.iter().enumerate() {
            tracing::info!("Found {} recordings for voice {voice}", takes.len());
        }
        Ok(bank)
    }

    pub fn takes(&self, voice: usize) -> &[PathBuf] {
        self.voices.get(voice).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Recording selected by `digit` for `voice`.
    pub fn take(&self, voice: usize, digit: u8) -> Option<&Path> {
        self.takes(voice).get(digit as usize).map(PathBuf::as_path)
    }

    /// Paths of the six recordings a combination mixes, in voice order.
    pub fn recordings(&self, combination: &Combination) -> Result<Vec<&Path>, String> {
        combination
            .digits()
            .iter()
            .enumerate()
            .map(|(voice, &digit)| {
                self.take(voice, digit).ok_or_else(|| {
                    format!(
                        "voice {voice} has {} recordings, no take for digit {digit}",
                        self.takes(voice).len()
                    )
                })
            })
            .collect()
    }
}

/// Mean MFCC of the six-voice mix selected by a combination index.
///
/// Cropped clips are decoded once per file and shared by every combination
/// that uses them.
pub struct FluteMixExtractor {
    bank: VoiceBank,
    clips: OnceCache<PathBuf, Arc<[f32]>>,
}

impl FluteMixExtractor {
    pub fn new(bank: VoiceBank) -> Self {
        Self {
            bank,
            clips: OnceCache::default(),
        }
    }

    /// Mixed audio of a combination at `MIX_SAMPLE_RATE`.
    pub fn mix(&self, combination: &Combination) -> Result<Vec<f32>, String> {
        let clips = self
            .bank
            .recordings(combination)?
            .into_iter()
            .map(|path| self.clip(path))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(mean_mix(&clips))
    }

    fn clip(&self, path: &Path) -> Result<Arc<[f32]>, String> {
        let key = path.to_path_buf();
        self.clips
            .get_or_compute(&key, || load_middle_crop(path).map(Arc::from))
    }
}

impl FeatureExtractor for FluteMixExtractor {
    fn extract(&self, index: CandidateIndex) -> Result<Vec<f32>, String> {
        let combination = Combination::from_index(index).map_err(|err| err.to_string())?;
        let mix = self.mix(&combination)?;
        Ok(mean_mfcc(&mix, MIX_SAMPLE_RATE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use tempfile::TempDir;

    fn write_tone(path: &Path, freq: f32) {
        let spec = WavSpec {
            channels: 1,
            sample_rate: MIX_SAMPLE_RATE,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for i in 0..(MIX_SAMPLE_RATE as usize / 20) {
            let t = i as f32 / MIX_SAMPLE_RATE as f32;
            writer
                .write_sample(0.3 * (2.0 * std::f32::consts::PI * freq * t).sin())
                .unwrap();
        }
        writer.finalize().unwrap();
    }

    fn bank_dir(takes_per_voice: usize) -> TempDir {
        let dir = TempDir::new().unwrap();
        for voice in 0..VOICE_COUNT {
            for take in 0..takes_per_voice {
                let freq = 200.0 + 150.0 * voice as f32 + 40.0 * take as f32;
                write_tone(&dir.path().join(format!("t{take}_flute_{voice}_.wav")), freq);
            }
        }
        std::fs::write(dir.path().join("notes_9_.wav.txt"), "skip").unwrap();
        dir
    }

    #[test]
    fn voice_is_second_to_last_stem_character() {
        assert_eq!(voice_of(Path::new("a/flute_3_.wav")), Some(3));
        assert_eq!(voice_of(Path::new("x05.wav")), Some(0));
        assert_eq!(voice_of(Path::new("flute_7_.wav")), None);
        assert_eq!(voice_of(Path::new("a.wav")), None);
    }

    #[test]
    fn bank_groups_and_sorts_takes() {
        let bank = VoiceBank::from_paths(
            ["b_1_.wav", "a_1_.wav", "c_0_.wav", "d_2_.wav", "e_3_.wav", "f_4_.wav", "g_5_.wav"]
                .into_iter()
                .map(PathBuf::from),
        )
        .unwrap();
        assert_eq!(
            bank.takes(1),
            &[PathBuf::from("a_1_.wav"), PathBuf::from("b_1_.wav")]
        );
        assert_eq!(bank.take(1, 1), Some(Path::new("b_1_.wav")));
        assert_eq!(bank.take(1, 2), None);
    }

    #[test]
    fn missing_voice_is_reported() {
        let err = VoiceBank::from_paths(["a_0_.wav", "b_1_.wav"].into_iter().map(PathBuf::from))
            .unwrap_err();
        assert!(matches!(err, VoiceBankError::MissingVoice { voice: 2 }));
    }

    #[test]
    fn discover_reads_wav_files_only() {
        let dir = bank_dir(2);
        let bank = VoiceBank::discover(dir.path()).unwrap();
        for voice in 0..VOICE_COUNT {
            assert_eq!(bank.takes(voice).len(), 2);
        }
    }

    #[test]
    fn extractor_yields_mfcc_for_available_takes() {
        let dir = bank_dir(2);
        let extractor = FluteMixExtractor::new(VoiceBank::discover(dir.path()).unwrap());
        let index = Combination::from_digits([1, 0, 1, 0, 1, 0]).unwrap().index();
        let features = extractor.extract(index).unwrap();
        assert_eq!(features.len(), super::super::MFCC_COUNT);
        assert_eq!(extractor.extract(index).unwrap(), features);
    }

    #[test]
    fn extractor_fails_for_missing_takes() {
        let dir = bank_dir(2);
        let extractor = FluteMixExtractor::new(VoiceBank::discover(dir.path()).unwrap());
        let index = Combination::from_digits([0, 0, 9, 0, 0, 0]).unwrap().index();
        let err = extractor.extract(index).unwrap_err();
        assert!(err.contains("voice 2"));
    }

    #[test]
    fn mix_has_one_second_of_audio() {
        let dir = bank_dir(1);
        let extractor = FluteMixExtractor::new(VoiceBank::discover(dir.path()).unwrap());
        let mix = extractor.mix(&Combination::from_index(0).unwrap()).unwrap();
        assert_eq!(mix.len(), MIX_SAMPLE_RATE as usize);
    }
}
