use super::features::{OnsetEnvelope, TempoEstimate};
use crate::config::TempoConfig;
use crate::error::AnalysisError;

const SMOOTHING_RADIUS: usize = 1;

/// Global tempo from the periodicity of the onset envelope.
///
/// Autocorrelation peaks at every multiple of the beat period, so raw scores
/// alone cannot tell 60 from 120 BPM. Each lag's score is weighted by a
/// log-normal prior around a typical practice tempo to break that ambiguity.
#[derive(Debug, Clone)]
pub struct TempoEstimator {
    min_bpm: f32,
    max_bpm: f32,
    prior_center_bpm: f32,
    prior_width_octaves: f32,
    tie_epsilon: f32,
    min_active_frames: usize,
}

impl TempoEstimator {
    pub fn new(config: &TempoConfig) -> Self {
        Self {
            min_bpm: config.min_bpm,
            max_bpm: config.max_bpm,
            prior_center_bpm: config.prior_center_bpm,
            prior_width_octaves: config.prior_width_octaves,
            tie_epsilon: config.tie_epsilon,
            min_active_frames: config.min_active_frames.max(2),
        }
    }

    pub fn estimate(&self, envelope: &OnsetEnvelope) -> Result<TempoEstimate, AnalysisError> {
        let active = envelope.active_frames();
        if active < self.min_active_frames {
            return Err(AnalysisError::TempoEstimation(format!(
                "only {} of {} envelope frames carry onset energy",
                active,
                envelope.len()
            )));
        }

        let hop = envelope.hop_secs;
        let n = envelope.len();
        let lag_min = ((60.0 / (self.max_bpm * hop)).ceil() as usize).max(1);
        // Keep at least a quarter of the envelope overlapping at the longest lag.
        let lag_max = ((60.0 / (self.min_bpm * hop)).floor() as usize).min(n - n / 4);
        if lag_min > lag_max {
            return Err(AnalysisError::TempoEstimation(format!(
                "envelope of {} frames cannot cover the {:.0}-{:.0} BPM range",
                n, self.min_bpm, self.max_bpm
            )));
        }

        // Spread single-frame peaks so a period that falls between two
        // integer lags still correlates at both.
        let mut smoothed = envelope.strengths.clone();
        moving_average_inplace(&mut smoothed, SMOOTHING_RADIUS);
        let acf = autocorrelation(&smoothed, lag_max);
        let zero_lag = acf[0];
        if zero_lag <= 0.0 {
            return Err(AnalysisError::TempoEstimation("onset envelope is flat".into()));
        }

        let lag_to_bpm = |lag: f32| 60.0 / (lag * hop);
        let weighted: Vec<f32> = (0..=lag_max)
            .map(|lag| {
                if lag < lag_min {
                    0.0
                } else {
                    acf[lag] * self.prior_weight(lag_to_bpm(lag as f32))
                }
            })
            .collect();

        let mut best: Option<(usize, f32)> = None;
        for (lag, &score) in weighted.iter().enumerate().skip(lag_min) {
            best = match best {
                None => Some((lag, score)),
                Some((best_lag, best_score)) => {
                    let margin = self.tie_epsilon * best_score.abs().max(score.abs());
                    if score > best_score + margin {
                        Some((lag, score))
                    } else if (score - best_score).abs() <= margin
                        && self.octave_distance(lag_to_bpm(lag as f32))
                            < self.octave_distance(lag_to_bpm(best_lag as f32))
                    {
                        log::debug!(
                            "Tempo tie between {:.1} and {:.1} BPM resolved toward the prior",
                            lag_to_bpm(best_lag as f32),
                            lag_to_bpm(lag as f32)
                        );
                        Some((lag, score))
                    } else {
                        Some((best_lag, best_score))
                    }
                }
            };
        }

        let best_lag = match best {
            Some((lag, score)) if score > 0.0 => lag,
            _ => {
                return Err(AnalysisError::TempoEstimation(
                    "no periodicity found in the admissible tempo range".into(),
                ))
            }
        };

        let refined_lag = best_lag as f32 + parabolic_offset(&weighted, best_lag, lag_min);
        let bpm = lag_to_bpm(refined_lag).clamp(self.min_bpm, self.max_bpm);
        let confidence = (acf[best_lag] / zero_lag).clamp(0.0, 1.0);

        log::info!(
            "Tempo: {:.2} BPM (lag {:.2} frames, confidence {:.2})",
            bpm,
            refined_lag,
            confidence
        );

        Ok(TempoEstimate { bpm, confidence })
    }

    fn prior_weight(&self, bpm: f32) -> f32 {
        let z = self.octave_distance(bpm) / self.prior_width_octaves;
        (-0.5 * z * z).exp()
    }

    fn octave_distance(&self, bpm: f32) -> f32 {
        (bpm / self.prior_center_bpm).log2().abs()
    }
}

/// Centred moving average over `2 * radius + 1` frames, shrinking at the edges.
fn moving_average_inplace(x: &mut [f32], radius: usize) {
    if radius == 0 || x.is_empty() {
        return;
    }
    let n = x.len();
    let mut prefix = vec![0.0f32; n + 1];
    for (i, &v) in x.iter().enumerate() {
        prefix[i + 1] = prefix[i] + v;
    }
    for (i, out) in x.iter_mut().enumerate() {
        let left = i.saturating_sub(radius);
        let right = (i + radius).min(n - 1);
        *out = (prefix[right + 1] - prefix[left]) / (right - left + 1) as f32;
    }
}

/// Mean-removed autocorrelation, normalised by the overlap length, for lags
/// `0..=max_lag`.
fn autocorrelation(signal: &[f32], max_lag: usize) -> Vec<f32> {
    let n = signal.len();
    if n == 0 {
        return vec![0.0; max_lag + 1];
    }
    let mean = signal.iter().sum::<f32>() / n as f32;
    let centered: Vec<f32> = signal.iter().map(|&s| s - mean).collect();

    (0..=max_lag)
        .map(|lag| {
            if lag >= n {
                return 0.0;
            }
            let sum: f32 = centered[..n - lag]
                .iter()
                .zip(centered[lag..].iter())
                .map(|(a, b)| a * b)
                .sum();
            sum / (n - lag) as f32
        })
        .collect()
}

/// Sub-lag offset of the peak at `peak`, from a parabola through its
/// neighbours. Zero when a neighbour is outside the admissible range.
fn parabolic_offset(scores: &[f32], peak: usize, lag_min: usize) -> f32 {
    if peak <= lag_min || peak + 1 >= scores.len() {
        return 0.0;
    }
    let (y0, y1, y2) = (scores[peak - 1], scores[peak], scores[peak + 1]);
    let denom = y0 - 2.0 * y1 + y2;
    if denom >= 0.0 {
        return 0.0;
    }
    (0.5 * (y0 - y2) / denom).clamp(-0.5, 0.5)
}
