use std::fmt::Write as _;

use serde::Serialize;

use crate::audio::analysis::Analysis;
use crate::audio::features::TempoEstimate;
use crate::error::AnalysisError;
use crate::timeline::Timeline;

/// Outcome of analyzing one source, ready for text or JSON output.
#[derive(Debug, Serialize)]
pub struct Report {
    pub source: String,
    pub expected_tempo: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Analysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline: Option<Timeline>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Report {
    pub fn success(
        source: impl Into<String>,
        expected_tempo: Option<f32>,
        analysis: Analysis,
        playback_secs: f32,
    ) -> Self {
        let timeline = Timeline::build(
            analysis.beats.times(),
            &analysis.deviations,
            analysis.duration,
            playback_secs,
        );
        Self {
            source: source.into(),
            expected_tempo,
            analysis: Some(analysis),
            timeline,
            error: None,
        }
    }

    pub fn failure(source: impl Into<String>, expected_tempo: Option<f32>, err: &AnalysisError) -> Self {
        Self {
            source: source.into(),
            expected_tempo,
            analysis: None,
            timeline: None,
            error: Some(err.user_message()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.analysis.is_some()
    }

    pub fn to_text(&self, width: usize) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.source);

        if let Some(err) = &self.error {
            let _ = writeln!(out, "  Error: {}", err);
            return out;
        }

        let _ = writeln!(
            out,
            "  Detected tempo: {}",
            display_tempo(self.analysis.as_ref().map(|a| &a.tempo))
        );
        let _ = writeln!(
            out,
            "  Expected tempo: {}",
            self.expected_tempo
                .map_or_else(|| "N/A".to_string(), |bpm| format!("{:.1} BPM", bpm))
        );

        if let Some(analysis) = &self.analysis {
            let _ = writeln!(
                out,
                "  Beats: {} ({} off)",
                analysis.beats.len(),
                analysis.deviations.len()
            );
            for (i, time) in analysis.beats.times().iter().enumerate() {
                let flag = if analysis.deviations.contains(i) { "  off" } else { "" };
                let _ = writeln!(out, "    #{:<3} {:>8.3}s{}", i, time, flag);
            }
        }

        if let Some(timeline) = &self.timeline {
            for line in timeline.render_text(width).lines() {
                let _ = writeln!(out, "  {}", line);
            }
        }

        out
    }
}

/// "N/A" when no tempo is available.
pub fn display_tempo(tempo: Option<&TempoEstimate>) -> String {
    match tempo {
        Some(t) => format!("{:.1} BPM (confidence {:.2})", t.bpm, t.confidence),
        None => "N/A".to_string(),
    }
}

pub fn to_json(reports: &[Report]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(reports)
}
