//! Square binary marker dictionaries and rotation-aware matching.
//!
//! A codeword packs the `n × n` data cells row-major, most significant bit
//! first, with 1 meaning a white cell. The black one-cell border around the
//! data area is implicit.

use std::path::Path;

/// First twelve codewords of the common ArUco 4x4_50 family (ids 0–11).
const ARUCO_4X4_CODES: [u64; 12] = [
    0xB532, 0x0F9A, 0x332D, 0x9946, 0x549E, 0x79CD, 0x9E2E, 0xC4F2, 0xFEDA, 0x684F, 0xC7FD,
    0xA097,
];

pub const MIN_BITS_PER_SIDE: u32 = 3;
pub const MAX_BITS_PER_SIDE: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictionaryError {
    UnsupportedSize { bits_per_side: u32 },
    Empty,
    CodeOutOfRange { id: usize, code: u64 },
    /// Two ids share a codeword under some rotation.
    Ambiguous { first: usize, second: usize },
}

impl std::fmt::Display for DictionaryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedSize { bits_per_side } => write!(
                f,
                "unsupported marker size {}x{} (expected {}..={} bits per side)",
                bits_per_side, bits_per_side, MIN_BITS_PER_SIDE, MAX_BITS_PER_SIDE
            ),
            Self::Empty => write!(f, "dictionary has no codewords"),
            Self::CodeOutOfRange { id, code } => {
                write!(f, "codeword 0x{:X} for id {} has bits outside the grid", code, id)
            }
            Self::Ambiguous { first, second } => write!(
                f,
                "ids {} and {} are identical up to rotation",
                first, second
            ),
        }
    }
}

impl std::error::Error for DictionaryError {}

/// Serialized dictionary form (`{"bits_per_side": 4, "codes": [46386, ...]}`).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DictionarySpec {
    pub bits_per_side: u32,
    pub codes: Vec<u64>,
}

/// Best dictionary match for an observed word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DictionaryMatch {
    pub id: usize,
    /// Number of clockwise quarter turns applied to the canonical codeword
    /// to reproduce the observation.
    pub rotation: u8,
    /// Hamming distance between observation and the rotated codeword.
    pub distance: u8,
}

#[derive(Debug, Clone)]
pub struct MarkerDictionary {
    bits_per_side: u32,
    /// Per id, the codeword under 0..4 clockwise quarter turns.
    rotations: Vec<[u64; 4]>,
}

/// Rotate an `n × n` bit grid a quarter turn clockwise.
pub fn rotate_word_cw(word: u64, n: u32) -> u64 {
    let total = n * n;
    let mut out = 0u64;
    for r in 0..n {
        for c in 0..n {
            // new(r, c) = old(n - 1 - c, r)
            let src = (n - 1 - c) * n + r;
            let bit = (word >> (total - 1 - src)) & 1;
            out |= bit << (total - 1 - (r * n + c));
        }
    }
    out
}

impl MarkerDictionary {
    pub fn new(bits_per_side: u32, codes: &[u64]) -> Result<Self, DictionaryError> {
        if !(MIN_BITS_PER_SIDE..=MAX_BITS_PER_SIDE).contains(&bits_per_side) {
            return Err(DictionaryError::UnsupportedSize { bits_per_side });
        }
        if codes.is_empty() {
            return Err(DictionaryError::Empty);
        }
        let total = bits_per_side * bits_per_side;
        let mask = if total == 64 { u64::MAX } else { (1u64 << total) - 1 };

        if let Some((id, &code)) = codes.iter().enumerate().find(|(_, &c)| c & !mask != 0) {
            return Err(DictionaryError::CodeOutOfRange { id, code });
        }

        let dict = Self::from_codes_unchecked(bits_per_side, codes);
        for i in 0..dict.rotations.len() {
            for j in (i + 1)..dict.rotations.len() {
                if dict.rotations[i].contains(&dict.rotations[j][0]) {
                    return Err(DictionaryError::Ambiguous { first: i, second: j });
                }
            }
        }
        Ok(dict)
    }

    fn from_codes_unchecked(bits_per_side: u32, codes: &[u64]) -> Self {
        let rotations = codes
            .iter()
            .map(|&code| {
                let mut rot = [code; 4];
                for k in 1..4 {
                    rot[k] = rotate_word_cw(rot[k - 1], bits_per_side);
                }
                rot
            })
            .collect();
        Self {
            bits_per_side,
            rotations,
        }
    }

    /// Built-in 4x4 dictionary (ids 0–11 of ArUco 4x4_50).
    pub fn aruco_4x4() -> Self {
        Self::from_codes_unchecked(4, &ARUCO_4X4_CODES)
    }

    pub fn from_spec(spec: &DictionarySpec) -> Result<Self, DictionaryError> {
        Self::new(spec.bits_per_side, &spec.codes)
    }

    /// Load a dictionary from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        let spec: DictionarySpec = serde_json::from_str(&data)?;
        Ok(Self::from_spec(&spec)?)
    }

    pub fn to_spec(&self) -> DictionarySpec {
        DictionarySpec {
            bits_per_side: self.bits_per_side,
            codes: self.rotations.iter().map(|r| r[0]).collect(),
        }
    }

    pub fn bits_per_side(&self) -> u32 {
        self.bits_per_side
    }

    pub fn len(&self) -> usize {
        self.rotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rotations.is_empty()
    }

    /// Canonical codeword for `id`.
    pub fn codeword(&self, id: usize) -> Option<u64> {
        self.rotations.get(id).map(|r| r[0])
    }

    /// Data cells of `id` as a row-major grid, `true` = white.
    pub fn cells(&self, id: usize) -> Option<Vec<bool>> {
        let code = self.codeword(id)?;
        let total = self.bits_per_side * self.bits_per_side;
        Some((0..total).map(|i| (code >> (total - 1 - i)) & 1 == 1).collect())
    }

    /// Smallest Hamming distance between any two codewords under any
    /// rotation, including a codeword against its own non-trivial rotations.
    pub fn min_distance(&self) -> u32 {
        let mut best = u32::MAX;
        for (i, rot_i) in self.rotations.iter().enumerate() {
            for k in 1..4 {
                best = best.min((rot_i[0] ^ rot_i[k]).count_ones());
            }
            for rot_j in &self.rotations[i + 1..] {
                for word in rot_i {
                    best = best.min((word ^ rot_j[0]).count_ones());
                }
            }
        }
        best
    }

    /// Number of bit errors that can be corrected without ambiguity.
    pub fn max_correction_bits(&self) -> u32 {
        self.min_distance().saturating_sub(1) / 2
    }

    /// Closest codeword over all ids and rotations; ties keep the lowest id
    /// and rotation.
    pub fn best_match(&self, word: u64) -> DictionaryMatch {
        let mut best = DictionaryMatch {
            id: 0,
            rotation: 0,
            distance: u8::MAX,
        };
        for (id, rot) in self.rotations.iter().enumerate() {
            for (k, &candidate) in rot.iter().enumerate() {
                let d = (word ^ candidate).count_ones() as u8;
                if d < best.distance {
                    best = DictionaryMatch {
                        id,
                        rotation: k as u8,
                        distance: d,
                    };
                }
            }
        }
        best
    }

    /// Best match, accepted only within `max_distance` bit errors.
    pub fn identify(&self, word: u64, max_distance: u8) -> Option<DictionaryMatch> {
        let m = self.best_match(word);
        (m.distance <= max_distance).then_some(m)
    }
}

impl Default for MarkerDictionary {
    fn default() -> Self {
        Self::aruco_4x4()
    }
}
