//! Combination space of six flute voices, each playing one of ten recordings.
//!
//! Candidates are never materialized: an index maps to its digits by base-10
//! decomposition, most significant digit first.

use std::fmt;

use thiserror::Error;

use super::{CandidateIndex, CandidatePool};

/// Number of voices mixed into one combination.
pub const COMBINATION_LENGTH: usize = 6;
/// Number of choices per voice.
pub const COMBINATION_BASE: usize = 10;

/// Per-digit synthesis recipe, indexed by digit value.
pub const PARAMETER_TABLE: [&str; COMBINATION_BASE] = [
    "0.05 0",
    "0.05 0.25",
    "0.05 0.5",
    "0.05 0.75",
    "0.05 0.99",
    "0.1 0.99",
    "0.1 0.75",
    "0.1 0.5",
    "0.1 0.25",
    "0.1 0",
];

/// Errors raised while decoding or parsing combinations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CombinationError {
    #[error("Combination index {index} is outside the space of {space} combinations")]
    OutOfRange { index: CandidateIndex, space: usize },
    #[error("Combination {text:?} must have {expected} digits, got {actual}")]
    WrongLength {
        text: String,
        expected: usize,
        actual: usize,
    },
    #[error("Combination {text:?} contains a non-digit value {value:?}")]
    InvalidDigit { text: String, value: String },
}

/// Look up the recipe for a single digit.
pub fn parameters_for_digit(digit: u8) -> Option<&'static str> {
    PARAMETER_TABLE.get(digit as usize).copied()
}

/// One candidate of the combination space: a digit per voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Combination {
    digits: [u8; COMBINATION_LENGTH],
}

impl Combination {
    pub fn from_digits(digits: [u8; COMBINATION_LENGTH]) -> Result<Self, CombinationError> {
        if let Some(bad) = digits.iter().find(|d| **d as usize >= COMBINATION_BASE) {
            return Err(CombinationError::InvalidDigit {
                text: format!("{digits:?}"),
                value: bad.to_string(),
            });
        }
        Ok(Self { digits })
    }

    /// Decode a pool index, most significant digit first.
    pub fn from_index(index: CandidateIndex) -> Result<Self, CombinationError> {
        let space = DigitCombinations::SPACE;
        if index >= space {
            return Err(CombinationError::OutOfRange { index, space });
        }
        let mut digits = [0u8; COMBINATION_LENGTH];
        let mut rest = index;
        for slot in digits.iter_mut().rev() {
            *slot = (rest % COMBINATION_BASE) as u8;
            rest /= COMBINATION_BASE;
        }
        Ok(Self { digits })
    }

    pub fn index(&self) -> CandidateIndex {
        self.digits
            .iter()
            .fold(0usize, |acc, &d| acc * COMBINATION_BASE + d as usize)
    }

    pub fn digits(&self) -> &[u8; COMBINATION_LENGTH] {
        &self.digits
    }

    /// Digits concatenated without separators, e.g. `"012345"`.
    pub fn compact(&self) -> String {
        self.digits.iter().map(|d| char::from(b'0' + d)).collect()
    }

    /// Digits joined by commas, the persisted line format.
    pub fn to_line(&self) -> String {
        self.digits
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Parse a persisted line (`"0,1,2,3,4,5"`).
    pub fn parse_line(line: &str) -> Result<Self, CombinationError> {
        let text = line.trim();
        let parts: Vec<&str> = text.split(',').map(str::trim).collect();
        if parts.len() != COMBINATION_LENGTH {
            return Err(CombinationError::WrongLength {
                text: text.to_string(),
                expected: COMBINATION_LENGTH,
                actual: parts.len(),
            });
        }
        let mut digits = [0u8; COMBINATION_LENGTH];
        for (slot, part) in digits.iter_mut().zip(parts) {
            *slot = match part.parse::<u8>() {
                Ok(d) if (d as usize) < COMBINATION_BASE => d,
                _ => {
                    return Err(CombinationError::InvalidDigit {
                        text: text.to_string(),
                        value: part.to_string(),
                    });
                }
            };
        }
        Ok(Self { digits })
    }

    /// Space-joined recipes of every digit, in voice order.
    pub fn parameters(&self) -> String {
        self.digits
            .iter()
            .map(|&d| PARAMETER_TABLE[d as usize])
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.compact())
    }
}

/// The full `10^6` combination space.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigitCombinations;

impl DigitCombinations {
    pub const SPACE: usize = COMBINATION_BASE.pow(COMBINATION_LENGTH as u32);

    pub fn combination(&self, index: CandidateIndex) -> Result<Combination, CombinationError> {
        Combination::from_index(index)
    }
}

impl CandidatePool for DigitCombinations {
    fn len(&self) -> usize {
        Self::SPACE
    }

    fn label(&self, index: CandidateIndex) -> Option<String> {
        Combination::from_index(index).ok().map(|c| c.compact())
    }
}
