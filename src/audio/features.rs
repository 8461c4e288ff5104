use serde::Serialize;

/// Onset strength sampled once per analysis hop (spectral-flux output).
#[derive(Clone, Debug, PartialEq)]
pub struct OnsetEnvelope {
    /// Non-negative strength per frame
    pub strengths: Vec<f32>,
    /// Spacing between frames, in seconds
    pub hop_secs: f32,
    /// Time of frame 0 (centre of the first analysis window)
    pub offset_secs: f32,
}

impl OnsetEnvelope {
    pub fn len(&self) -> usize {
        self.strengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strengths.is_empty()
    }

    pub fn time_of(&self, frame: usize) -> f32 {
        self.offset_secs + frame as f32 * self.hop_secs
    }

    /// `(time, strength)` pairs in frame order.
    pub fn points(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.strengths
            .iter()
            .enumerate()
            .map(|(i, &s)| (self.time_of(i), s))
    }

    pub fn active_frames(&self) -> usize {
        self.strengths.iter().filter(|&&s| s > f32::EPSILON).count()
    }

    pub fn peak(&self) -> f32 {
        self.strengths.iter().copied().fold(0.0f32, f32::max)
    }
}

/// Global tempo of a clip.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TempoEstimate {
    pub bpm: f32,
    /// Normalised autocorrelation at the chosen period (0.0-1.0)
    pub confidence: f32,
}

impl TempoEstimate {
    pub fn beat_period_secs(&self) -> f32 {
        60.0 / self.bpm
    }
}

/// Beat times in seconds, strictly increasing.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BeatSequence(Vec<f32>);

impl BeatSequence {
    /// Wrap `times`, rejecting anything that is not finite, non-negative and
    /// strictly increasing.
    pub fn new(times: Vec<f32>) -> Option<Self> {
        let valid = times.iter().all(|t| t.is_finite() && *t >= 0.0)
            && times.windows(2).all(|w| w[1] > w[0]);
        valid.then_some(Self(times))
    }

    pub fn times(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `gap(i) = beats[i] - beats[i-1]` for `i >= 1`.
    pub fn gaps(&self) -> impl Iterator<Item = f32> + '_ {
        self.0.windows(2).map(|w| w[1] - w[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_times_are_uniform() {
        let env = OnsetEnvelope {
            strengths: vec![0.0, 1.0, 0.5],
            hop_secs: 0.01,
            offset_secs: 0.02,
        };
        let times: Vec<f32> = env.points().map(|(t, _)| t).collect();
        assert_eq!(times.len(), 3);
        assert!((times[0] - 0.02).abs() < 1e-6);
        assert!((times[2] - 0.04).abs() < 1e-6);
        assert_eq!(env.active_frames(), 2);
        assert_eq!(env.peak(), 1.0);
    }

    #[test]
    fn beat_sequence_rejects_unordered_times() {
        assert!(BeatSequence::new(vec![0.5, 1.0, 1.5]).is_some());
        assert!(BeatSequence::new(vec![0.5, 0.5]).is_none());
        assert!(BeatSequence::new(vec![1.0, 0.5]).is_none());
        assert!(BeatSequence::new(vec![-0.1, 0.5]).is_none());
        assert!(BeatSequence::new(vec![f32::NAN]).is_none());
    }

    #[test]
    fn gaps_follow_consecutive_beats() {
        let beats = BeatSequence::new(vec![0.0, 0.5, 1.25]).unwrap();
        let gaps: Vec<f32> = beats.gaps().collect();
        assert_eq!(gaps, vec![0.5, 0.75]);
    }
}
