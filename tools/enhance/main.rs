use aaes::io::{read_wav, write_wav};
use aaes::spectrum::{average_spectrum, SpectrumData};
use aaes::{
    CsvReportSink, HearingProfile, Pipeline, PipelineConfig, PipelinePreset, QualityReporter,
    ReportSink, StoiEstimator, TuningGain,
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use env_logger::Env;
use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Enhance a recording for a listener's audiogram and report quality metrics.
#[derive(Debug, Parser)]
#[command(name = "aaes-enhance", version)]
struct Cli {
    /// Input WAV (mono or stereo)
    #[arg(short, long)]
    input: PathBuf,

    /// Output WAV (32-bit float stereo)
    #[arg(short, long)]
    output: PathBuf,

    /// Hearing profile as inline JSON or a path to a JSON file
    #[arg(short, long)]
    profile: Option<String>,

    /// Tuning gain in percent
    #[arg(short, long)]
    tuning_gain: Option<String>,

    /// Named stage setup (standard, gentle, clarity, loud)
    #[arg(long, conflicts_with = "config")]
    preset: Option<String>,

    /// Pipeline configuration JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the report JSON here as well as to stdout
    #[arg(long)]
    report: Option<PathBuf>,

    /// Append the report as a row to this CSV file
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Write input/output average spectra JSON for plotting
    #[arg(long)]
    spectrum: Option<PathBuf>,
}

#[derive(Serialize)]
struct SpectrumPair {
    input: SpectrumData,
    output: SpectrumData,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    let profile = load_profile(cli.profile.as_deref())?;
    let tuning = TuningGain::parse(cli.tuning_gain.as_deref())?;
    let pipeline = Pipeline::new(config)?;

    let input = read_wav(&cli.input)
        .with_context(|| format!("failed to load '{}'", cli.input.display()))?;
    let reporter = QualityReporter::new().with_stoi(Box::new(StoiEstimator::new()));
    let (output, report) = pipeline.process(input, &profile, tuning, &reporter)?;

    write_wav(&cli.output, &output.enhanced)
        .with_context(|| format!("failed to write '{}'", cli.output.display()))?;

    let json = report.to_json_pretty()?;
    println!("{}", json);

    if let Some(path) = &cli.report {
        std::fs::write(path, &json)
            .with_context(|| format!("failed to write report '{}'", path.display()))?;
    }
    if let Some(path) = &cli.csv {
        CsvReportSink::new(path)
            .append(&report)
            .with_context(|| format!("failed to append to '{}'", path.display()))?;
    }
    if let Some(path) = &cli.spectrum {
        let pair = SpectrumPair {
            input: average_spectrum(&output.original),
            output: average_spectrum(&output.enhanced),
        };
        std::fs::write(path, serde_json::to_string(&pair)?)
            .with_context(|| format!("failed to write spectrum '{}'", path.display()))?;
        info!("spectrum written to '{}'", path.display());
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    if let Some(path) = &cli.config {
        return PipelineConfig::from_json_file(path)
            .with_context(|| format!("failed to load config '{}'", path.display()));
    }
    match cli.preset.as_deref() {
        None => Ok(PipelineConfig::default()),
        Some(name) => match PipelinePreset::from_name(name) {
            Some(preset) => {
                info!("preset: {} ({})", preset.name(), preset.description());
                Ok(preset.config())
            }
            None => bail!(
                "unknown preset '{}', expected one of: {}",
                name,
                PipelinePreset::all().map(|p| p.name()).join(", ")
            ),
        },
    }
}

fn load_profile(arg: Option<&str>) -> Result<HearingProfile> {
    let Some(arg) = arg else {
        return Ok(HearingProfile::default());
    };
    let path = Path::new(arg);
    let text = if path.is_file() {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read profile '{}'", path.display()))?
    } else {
        arg.to_string()
    };
    Ok(HearingProfile::from_json(&text)?)
}
