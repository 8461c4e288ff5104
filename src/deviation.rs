//! Flags beats whose spacing strays from the tempo the player meant to keep.

use serde::Serialize;

/// Default tolerance on a beat gap, in seconds. Absolute rather than
/// tempo-relative, so it is stricter at fast tempos than at slow ones.
pub const DEFAULT_TOLERANCE_SECS: f32 = 0.1;

/// Ascending indices into a beat sequence. Index 0 never appears.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DeviationSet(Vec<usize>);

impl DeviationSet {
    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn contains(&self, index: usize) -> bool {
        self.0.binary_search(&index).is_ok()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Indices `i >= 1` with `|beats[i] - beats[i-1] - 60/expected_bpm| > tolerance`.
///
/// Empty when no expected tempo is set (or it is not a positive number), or
/// there are fewer than two beats.
pub fn find_deviations(beats: &[f32], expected_bpm: Option<f32>, tolerance_secs: f32) -> DeviationSet {
    let expected_gap = match expected_bpm {
        Some(bpm) if bpm.is_finite() && bpm > 0.0 => 60.0 / bpm,
        _ => return DeviationSet::default(),
    };
    if beats.len() < 2 {
        return DeviationSet::default();
    }

    let flagged = beats
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| ((pair[1] - pair[0]) - expected_gap).abs() > tolerance_secs)
        .map(|(i, _)| i + 1)
        .collect();

    DeviationSet(flagged)
}
