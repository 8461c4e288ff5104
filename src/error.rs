use std::time::Duration;

/// Failure to turn encoded bytes into samples.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("audio payload is empty")]
    Empty,

    #[error("unsupported audio format: {0}")]
    Unsupported(String),

    #[error("corrupt or unreadable audio container: {0}")]
    Corrupt(String),

    #[error("no decodable audio found in input")]
    NoAudio,

    #[error("audio track does not declare a sample rate")]
    UnknownSampleRate,

    #[error("decoding did not finish within {0:?}")]
    TimedOut(Duration),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<symphonia::core::errors::Error> for DecodeError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        use symphonia::core::errors::Error as SymphoniaError;
        match err {
            SymphoniaError::Unsupported(what) => DecodeError::Unsupported(what.to_string()),
            SymphoniaError::IoError(e) => DecodeError::Io(e),
            other => DecodeError::Corrupt(other.to_string()),
        }
    }
}

/// Any failure of the analysis pipeline. Each stage aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("clip is too short to analyze: {duration:.2}s (need at least {required:.2}s)")]
    InsufficientAudio { duration: f32, required: f32 },

    #[error("tempo estimation failed: {0}")]
    TempoEstimation(String),

    #[error("beat tracking found {found} beat(s), need at least 2")]
    BeatTracking { found: usize },
}

impl AnalysisError {
    /// Message suitable for showing to the person who supplied the clip.
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::Decode(e) => e.to_string(),
            AnalysisError::InsufficientAudio { required, .. } => format!(
                "The recording is too short. Record or upload at least {:.1} seconds of audio.",
                required
            ),
            AnalysisError::TempoEstimation(_) | AnalysisError::BeatTracking { .. } => {
                "Could not detect a clear tempo.".to_string()
            }
        }
    }
}

/// Invalid or unreadable configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value `{name}`: {reason}")]
    Invalid { name: &'static str, reason: String },
}
