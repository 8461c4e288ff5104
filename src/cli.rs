use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "beatcheck", about = "Tempo and beat-timing feedback for practice recordings")]
pub struct Cli {
    /// Audio files to analyze (WAV, MP3, FLAC, OGG, AAC)
    pub inputs: Vec<PathBuf>,

    /// Tempo you intended to play, in BPM; beats straying from it are flagged
    #[arg(short, long)]
    pub expected_tempo: Option<f32>,

    /// Allowed deviation of a beat gap from the expected one, in seconds
    #[arg(long, default_value_t = 0.1)]
    pub tolerance: f32,

    /// Lowest tempo considered, in BPM
    #[arg(long, default_value_t = 40.0)]
    pub min_bpm: f32,

    /// Highest tempo considered, in BPM
    #[arg(long, default_value_t = 240.0)]
    pub max_bpm: f32,

    /// Tempo the estimator leans toward when a pulse also fits half or
    /// double speed, in BPM; raise it for fast material
    #[arg(long, default_value_t = 120.0)]
    pub prior_center: f32,

    /// Give up decoding a file after this many seconds
    #[arg(long, default_value_t = 30.0)]
    pub timeout: f32,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Width of the text timeline, in characters
    #[arg(long, default_value_t = 60)]
    pub width: usize,

    /// Playback position to mark on the timeline, in seconds
    #[arg(long, default_value_t = 0.0)]
    pub at: f32,

    /// Config file (default: ./beatcheck.toml or ~/.config/beatcheck/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
