use std::sync::Arc;

use rayon::prelude::*;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use super::decode::SampleBuffer;
use super::features::OnsetEnvelope;

/// Frames transformed per parallel batch; bounds spectrum memory on long clips.
const FRAMES_PER_BATCH: usize = 256;

/// Half-wave-rectified spectral flux over Hann-windowed frames.
pub struct OnsetExtractor {
    window_size: usize,
    hop_size: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl OnsetExtractor {
    pub fn new(window_size: usize, hop_size: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(window_size);
        Self {
            window_size,
            hop_size: hop_size.max(1),
            window: hann_window(window_size),
            fft,
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    pub fn frame_count(&self, num_samples: usize) -> usize {
        if num_samples < self.window_size {
            0
        } else {
            (num_samples - self.window_size) / self.hop_size + 1
        }
    }

    /// Compute the onset envelope. Clips shorter than one window yield an
    /// empty envelope.
    pub fn extract(&self, audio: &SampleBuffer) -> OnsetEnvelope {
        let samples = audio.samples();
        let sr = audio.sample_rate() as f32;
        let n_frames = self.frame_count(samples.len());

        let mut strengths = Vec::with_capacity(n_frames);
        let mut prev_magnitudes: Option<Vec<f32>> = None;

        let mut batch_start = 0;
        while batch_start < n_frames {
            let batch_end = (batch_start + FRAMES_PER_BATCH).min(n_frames);

            let spectra: Vec<Vec<f32>> = (batch_start..batch_end)
                .into_par_iter()
                .map(|frame| self.magnitude_spectrum(&samples[frame * self.hop_size..]))
                .collect();

            for magnitudes in spectra {
                let flux = match &prev_magnitudes {
                    // No reference frame to rise from.
                    None => 0.0,
                    Some(prev) => magnitudes
                        .iter()
                        .zip(prev.iter())
                        .map(|(cur, prev)| (cur - prev).max(0.0))
                        .sum(),
                };
                strengths.push(flux);
                prev_magnitudes = Some(magnitudes);
            }

            batch_start = batch_end;
        }

        let envelope = OnsetEnvelope {
            strengths,
            hop_secs: self.hop_size as f32 / sr,
            offset_secs: (self.window_size / 2) as f32 / sr,
        };

        log::info!(
            "Onset envelope: {} frames ({:.1} ms hop), {} active, peak {:.3}",
            envelope.len(),
            envelope.hop_secs * 1000.0,
            envelope.active_frames(),
            envelope.peak()
        );

        envelope
    }

    /// Magnitudes of the lower half of the spectrum of the window starting
    /// at `frame[0]`.
    fn magnitude_spectrum(&self, frame: &[f32]) -> Vec<f32> {
        let mut buffer: Vec<Complex<f32>> = frame[..self.window_size]
            .iter()
            .zip(self.window.iter())
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();
        self.fft.process(&mut buffer);
        buffer[..self.window_size / 2].iter().map(|c| c.norm()).collect()
    }
}

pub fn hann_window(size: usize) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}
