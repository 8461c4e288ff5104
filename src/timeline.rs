use serde::Serialize;

use crate::deviation::DeviationSet;

/// Position of `time` along a clip of `duration` seconds, in [0, 1].
///
/// `None` when the duration is zero or not finite; callers skip rendering.
pub fn project(time: f32, duration: f32) -> Option<f32> {
    if !duration.is_finite() || duration <= 0.0 || !time.is_finite() {
        return None;
    }
    Some((time / duration).clamp(0.0, 1.0))
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Marker {
    pub index: usize,
    pub time: f32,
    pub position: f32,
    /// Gap before this beat strays from the expected tempo
    pub off: bool,
}

/// Beat markers and the playback cursor, projected onto one clip.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Timeline {
    pub duration: f32,
    pub markers: Vec<Marker>,
    pub cursor_time: f32,
    pub cursor: f32,
}

impl Timeline {
    pub fn build(
        beats: &[f32],
        deviations: &DeviationSet,
        duration: f32,
        playback_secs: f32,
    ) -> Option<Self> {
        let Some(cursor) = project(playback_secs, duration) else {
            log::debug!("Timeline skipped: clip duration is {}", duration);
            return None;
        };

        let markers = beats
            .iter()
            .enumerate()
            .filter_map(|(index, &time)| {
                project(time, duration).map(|position| Marker {
                    index,
                    time,
                    position,
                    off: deviations.contains(index),
                })
            })
            .collect();

        Some(Self {
            duration,
            markers,
            cursor_time: playback_secs,
            cursor,
        })
    }

    pub fn off_count(&self) -> usize {
        self.markers.iter().filter(|m| m.off).count()
    }

    /// Fixed-width text strip: `|` on-time beat, `x` off beat, `^` playback
    /// cursor on the line below, then current time and duration.
    pub fn render_text(&self, width: usize) -> String {
        let width = width.max(2);
        let column = |position: f32| ((position * (width - 1) as f32).round() as usize).min(width - 1);

        let mut strip = vec!['-'; width];
        for marker in &self.markers {
            let cell = &mut strip[column(marker.position)];
            // An off beat wins a shared cell.
            if *cell != 'x' {
                *cell = if marker.off { 'x' } else { '|' };
            }
        }

        let mut cursor_line = vec![' '; width];
        cursor_line[column(self.cursor)] = '^';

        let start = format!("{:.2}s", self.cursor_time);
        let end = format!("{:.2}s", self.duration);
        let padding = width.saturating_sub(start.len() + end.len()).max(1);

        format!(
            "[{}]\n {}\n {}{}{}",
            strip.into_iter().collect::<String>(),
            cursor_line.into_iter().collect::<String>().trim_end(),
            start,
            " ".repeat(padding),
            end
        )
    }
}
