use super::features::{BeatSequence, OnsetEnvelope, TempoEstimate};
use crate::config::BeatConfig;
use crate::error::AnalysisError;

/// Dynamic-programming beat tracker.
///
/// Every frame gets a cumulative score: its own onset strength plus the best
/// score of a predecessor roughly one beat period earlier, minus a quadratic
/// penalty for straying from that period. Backtracking from the best frame
/// yields beats that sit on real onsets yet keep one global tempo.
#[derive(Debug, Clone)]
pub struct BeatTracker {
    tolerance_ratio: f32,
    tightness: f32,
    min_gap_secs: f32,
    trim_threshold: f32,
}

struct ScoreTable {
    cumulative: Vec<f32>,
    backlink: Vec<Option<usize>>,
}

impl BeatTracker {
    pub fn new(config: &BeatConfig) -> Self {
        Self {
            tolerance_ratio: config.tolerance_ratio,
            tightness: config.tightness,
            min_gap_secs: config.min_beat_gap_secs,
            trim_threshold: config.trim_threshold,
        }
    }

    pub fn track(
        &self,
        envelope: &OnsetEnvelope,
        tempo: &TempoEstimate,
        duration: f32,
    ) -> Result<BeatSequence, AnalysisError> {
        let peak = envelope.peak();
        if envelope.is_empty() || peak <= 0.0 {
            return Err(AnalysisError::BeatTracking { found: 0 });
        }
        let onset: Vec<f32> = envelope.strengths.iter().map(|s| s / peak).collect();

        let period = tempo.beat_period_secs() / envelope.hop_secs;
        let slack = self.tolerance_ratio * period;
        let min_lag = ((period - slack).round() as usize).max(1);
        let max_lag = ((period + slack).round() as usize).max(min_lag);

        let table = self.score(&onset, period, min_lag, max_lag);
        let mut frames = backtrack(&table);
        trim_weak_edges(&mut frames, &onset, self.trim_threshold);

        let mut beats: Vec<(f32, f32)> = frames
            .iter()
            .map(|&f| (envelope.time_of(f), onset[f]))
            .filter(|&(t, _)| t >= 0.0 && t <= duration)
            .collect();
        enforce_min_gap(&mut beats, self.min_gap_secs);

        log::info!(
            "Beat tracking: {} beats (period {:.1} frames, lag window {}-{})",
            beats.len(),
            period,
            min_lag,
            max_lag
        );

        if beats.len() < 2 {
            return Err(AnalysisError::BeatTracking { found: beats.len() });
        }

        let times = beats.into_iter().map(|(t, _)| t).collect();
        BeatSequence::new(times).ok_or(AnalysisError::BeatTracking { found: 0 })
    }

    fn score(&self, onset: &[f32], period: f32, min_lag: usize, max_lag: usize) -> ScoreTable {
        let n = onset.len();
        let mut cumulative = vec![0.0f32; n];
        let mut backlink = vec![None; n];

        for t in 0..n {
            let mut best: Option<(usize, f32)> = None;
            for lag in min_lag..=max_lag.min(t) {
                let prev = t - lag;
                let deviation = (lag as f32 - period) / period;
                let candidate = cumulative[prev] - self.tightness * deviation * deviation;
                if best.map_or(true, |(_, s)| candidate > s) {
                    best = Some((prev, candidate));
                }
            }

            match best {
                Some((prev, s)) if s > 0.0 => {
                    cumulative[t] = onset[t] + s;
                    backlink[t] = Some(prev);
                }
                _ => cumulative[t] = onset[t],
            }
        }

        ScoreTable {
            cumulative,
            backlink,
        }
    }
}

/// Frames on the best path, oldest first.
fn backtrack(table: &ScoreTable) -> Vec<usize> {
    let mut end = None;
    let mut best = f32::NEG_INFINITY;
    for (t, &score) in table.cumulative.iter().enumerate() {
        if score > best {
            best = score;
            end = Some(t);
        }
    }

    let mut frames = Vec::new();
    let mut cursor = end;
    while let Some(t) = cursor {
        frames.push(t);
        cursor = table.backlink[t];
    }
    frames.reverse();
    frames
}

/// Drop path ends that fall on silence; the recursion happily extends a chain
/// one period past the first and last real onsets.
fn trim_weak_edges(frames: &mut Vec<usize>, onset: &[f32], threshold: f32) {
    while frames.first().is_some_and(|&f| onset[f] < threshold) {
        frames.remove(0);
    }
    while frames.last().is_some_and(|&f| onset[f] < threshold) {
        frames.pop();
    }
}

/// Of two beats closer than `min_gap`, keep the stronger.
fn enforce_min_gap(beats: &mut Vec<(f32, f32)>, min_gap: f32) {
    let mut kept: Vec<(f32, f32)> = Vec::with_capacity(beats.len());
    for &(time, strength) in beats.iter() {
        match kept.last_mut() {
            Some(last) if time - last.0 < min_gap => {
                if strength > last.1 {
                    *last = (time, strength);
                }
            }
            _ => kept.push((time, strength)),
        }
    }
    *beats = kept;
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOP: f32 = 0.01;

    fn envelope_with_onsets(frames: &[usize], n: usize) -> OnsetEnvelope {
        let mut strengths = vec![0.0f32; n];
        for &f in frames {
            strengths[f] = 1.0;
        }
        OnsetEnvelope {
            strengths,
            hop_secs: HOP,
            offset_secs: 0.0,
        }
    }

    fn tracker() -> BeatTracker {
        BeatTracker::new(&BeatConfig::default())
    }

    fn tempo(bpm: f32) -> TempoEstimate {
        TempoEstimate {
            bpm,
            confidence: 1.0,
        }
    }

    #[test]
    fn follows_regular_pulses() {
        let onsets: Vec<usize> = (0..10).map(|k| 20 + k * 50).collect();
        let env = envelope_with_onsets(&onsets, 520);
        let beats = tracker().track(&env, &tempo(120.0), 5.2).unwrap();
        let expected: Vec<f32> = onsets.iter().map(|&f| f as f32 * HOP).collect();
        assert_eq!(beats.len(), expected.len());
        for (got, want) in beats.times().iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-4, "{got} vs {want}");
        }
    }

    #[test]
    fn follows_late_onset_within_tolerance() {
        // Fourth pulse arrives 15 frames (0.3 of a period) late.
        let onsets = [10, 60, 110, 175, 225, 275];
        let env = envelope_with_onsets(&onsets, 300);
        let beats = tracker().track(&env, &tempo(120.0), 3.0).unwrap();
        let frames: Vec<usize> = beats
            .times()
            .iter()
            .map(|t| (t / HOP).round() as usize)
            .collect();
        assert_eq!(frames, onsets);
    }

    #[test]
    fn ignores_ringing_between_beats() {
        let mut env = envelope_with_onsets(&[10, 60, 110, 160, 210], 230);
        // Weak overtone bursts shortly after each strike.
        for f in [13, 63, 113, 163] {
            env.strengths[f] = 0.3;
        }
        let beats = tracker().track(&env, &tempo(120.0), 2.3).unwrap();
        assert_eq!(beats.len(), 5);
    }

    #[test]
    fn beats_are_increasing_and_spaced() {
        let onsets: Vec<usize> = (0..30).map(|k| 5 + k * 27).collect();
        let env = envelope_with_onsets(&onsets, 820);
        let beats = tracker().track(&env, &tempo(222.0), 8.2).unwrap();
        for gap in beats.gaps() {
            assert!(gap > 0.0);
            assert!(gap >= 0.1);
        }
    }

    #[test]
    fn single_onset_is_not_enough() {
        let env = envelope_with_onsets(&[40], 100);
        let err = tracker().track(&env, &tempo(120.0), 1.0).unwrap_err();
        assert!(matches!(err, AnalysisError::BeatTracking { found: 1 }));
    }

    #[test]
    fn silent_envelope_has_no_beats() {
        let env = envelope_with_onsets(&[], 100);
        assert!(matches!(
            tracker().track(&env, &tempo(120.0), 1.0),
            Err(AnalysisError::BeatTracking { found: 0 })
        ));
    }

    #[test]
    fn min_gap_keeps_stronger_beat() {
        let mut beats = vec![(0.0, 0.5), (0.05, 0.9), (0.5, 1.0), (0.55, 0.2)];
        enforce_min_gap(&mut beats, 0.1);
        assert_eq!(beats, vec![(0.05, 0.9), (0.5, 1.0)]);
    }

    #[test]
    fn trimming_removes_silent_ends() {
        let onset = [0.0, 1.0, 0.0, 1.0, 0.02];
        let mut frames = vec![0, 1, 3, 4];
        trim_weak_edges(&mut frames, &onset, 0.1);
        assert_eq!(frames, vec![1, 3]);
    }
}
