//! Tempo and beat analysis for practice recordings.
//!
//! A clip is decoded to mono samples, reduced to a spectral-flux onset
//! envelope, and scanned for its dominant tempo. A dynamic-programming beat
//! tracker then places beats on real onsets at that tempo, and beats whose
//! spacing strays from the tempo the player intended are flagged for display
//! on a timeline.

pub mod audio;
pub mod config;
pub mod deviation;
pub mod error;
pub mod report;
pub mod session;
pub mod timeline;

pub use audio::analysis::{analyze, Analysis, Pipeline, Stage};
pub use audio::decode::{decode_bytes, decode_file, decode_with_timeout, SampleBuffer, SourceHint};
pub use audio::features::{BeatSequence, OnsetEnvelope, TempoEstimate};
pub use config::Config;
pub use deviation::{find_deviations, DeviationSet};
pub use error::{AnalysisError, ConfigError, DecodeError};
pub use session::{spawn_analysis, Generation, Session};
pub use timeline::{project, Marker, Timeline};
