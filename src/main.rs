mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use beatcheck::config::{self, Config};
use beatcheck::report::{self, Report};
use beatcheck::{AnalysisError, DecodeError, Pipeline, SourceHint};
use cli::{Cli, OutputFormat};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();

    let config = resolve_config(&cli)?;

    if cli.print_config {
        print!("{}", toml::to_string_pretty(&config).context("Failed to serialize config")?);
        return Ok(());
    }

    if cli.inputs.is_empty() {
        anyhow::bail!("At least one input audio file is required");
    }

    let pipeline = Pipeline::new(config);

    let pb = if cli.inputs.len() > 1 {
        let pb = ProgressBar::new(cli.inputs.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files {msg}")
                .context("Invalid progress bar template")?
                .progress_chars("=>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut reports = Vec::with_capacity(cli.inputs.len());
    for input in &cli.inputs {
        let source = input.display().to_string();
        pb.set_message(source.clone());
        log::info!("Analyzing {}", source);

        let result = std::fs::read(input)
            .map_err(|e| AnalysisError::from(DecodeError::from(e)))
            .and_then(|bytes| {
                pipeline.analyze(bytes, &SourceHint::from_path(input), cli.expected_tempo)
            });

        let report = match result {
            Ok(analysis) => Report::success(source, cli.expected_tempo, analysis, cli.at),
            Err(err) => {
                log::warn!("{}: {}", source, err);
                Report::failure(source, cli.expected_tempo, &err)
            }
        };
        reports.push(report);
        pb.inc(1);
    }
    pb.finish_and_clear();

    match cli.format {
        OutputFormat::Text => {
            for (i, report) in reports.iter().enumerate() {
                if i > 0 {
                    println!();
                }
                print!("{}", report.to_text(cli.width));
            }
        }
        OutputFormat::Json => {
            println!("{}", report::to_json(&reports).context("Failed to serialize reports")?);
        }
    }

    let failed = reports.iter().filter(|r| !r.is_success()).count();
    if failed == reports.len() {
        anyhow::bail!("No input could be analyzed");
    }
    if failed > 0 {
        log::warn!("{} of {} inputs could not be analyzed", failed, reports.len());
    }
    Ok(())
}

/// Load the config file (explicit or discovered) and layer CLI flags on top.
/// Flags left at their defaults do not override file values.
fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = match cli.config.clone().or_else(config::discover_config) {
        Some(path) => {
            let loaded = config::load_config(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            log::info!("Loaded config from {}", path.display());
            loaded
        }
        None => Config::default(),
    };

    if cli.tolerance != 0.1 {
        config.deviation.tolerance_secs = cli.tolerance;
    }
    if cli.min_bpm != 40.0 {
        config.tempo.min_bpm = cli.min_bpm;
    }
    if cli.max_bpm != 240.0 {
        config.tempo.max_bpm = cli.max_bpm;
    }
    if cli.prior_center != 120.0 {
        config.tempo.prior_center_bpm = cli.prior_center;
    }
    if cli.timeout != 30.0 {
        config.decode.timeout_secs = cli.timeout;
    }

    config.validate().context("Invalid settings")?;
    Ok(config)
}
