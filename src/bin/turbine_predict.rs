//! Command-line host for the turbine power predictor.
//!
//! ```bash
//! turbine-predict --voltage 12.5 --artifact-dir ./artifacts
//! turbine-predict --voltage 40 --config pipeline.json -v
//! ```

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use turbine_inference::{global_pipeline, PipelineConfig, PowerStatus};

/// Voltage range accepted by the input form.
const MIN_VOLTAGE: f64 = 0.0;
const MAX_VOLTAGE: f64 = 100.0;

#[derive(Debug, Parser)]
#[command(name = "turbine-predict", version, about = "Gas turbine power forecasting (LSTM, window size 30)")]
struct Args {
    /// Sensor voltage in Volt
    #[arg(long, default_value_t = 10.0, value_parser = parse_voltage)]
    voltage: f64,

    /// JSON pipeline configuration
    #[arg(long, conflicts_with = "artifact_dir")]
    config: Option<PathBuf>,

    /// Directory holding model_turbine.onnx, scaler_X.json and scaler_y.json
    #[arg(long)]
    artifact_dir: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_voltage(raw: &str) -> Result<f64, String> {
    let voltage: f64 = raw.parse().map_err(|e| format!("{e}"))?;
    if !(MIN_VOLTAGE..=MAX_VOLTAGE).contains(&voltage) {
        return Err(format!(
            "voltage must be between {MIN_VOLTAGE} and {MAX_VOLTAGE}, got {voltage}"
        ));
    }
    Ok(voltage)
}

fn resolve_config(args: &Args) -> anyhow::Result<PipelineConfig> {
    match (&args.config, &args.artifact_dir) {
        (Some(path), _) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display())),
        (None, Some(dir)) => Ok(PipelineConfig::in_dir(dir)),
        (None, None) => Ok(PipelineConfig::default()),
    }
}

fn run(args: &Args, config: &PipelineConfig) -> anyhow::Result<()> {
    let pipeline = global_pipeline(config).context("loading model and scalers")?;
    let result = pipeline
        .predict(args.voltage)
        .with_context(|| format!("predicting for {} V", args.voltage))?;

    println!("Predicted Power Output: {:.2} Watt", result.power_watts);
    println!("{:.2}% stability reference", result.stability_reference());
    match result.status() {
        PowerStatus::Normal => println!("System running normally"),
        PowerStatus::LowOrNegative => println!("Warning: power very low or negative"),
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .init();

    let config = match resolve_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = run(&args, &config) {
        eprintln!("error: {e:#}");
        eprintln!("Make sure these artifacts exist:");
        for path in config.artifact_paths() {
            eprintln!("  {}", path.display());
        }
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_voltage_range() {
        assert_eq!(parse_voltage("10.0"), Ok(10.0));
        assert_eq!(parse_voltage("0"), Ok(0.0));
        assert_eq!(parse_voltage("100"), Ok(100.0));
        assert!(parse_voltage("-0.1").is_err());
        assert!(parse_voltage("100.1").is_err());
        assert!(parse_voltage("volts").is_err());
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["turbine-predict"]).unwrap();
        assert_eq!(args.voltage, 10.0);
        assert!(args.config.is_none());
        assert!(!args.verbose);
    }

    #[test]
    fn test_artifact_dir_config() {
        let args =
            Args::try_parse_from(["turbine-predict", "--artifact-dir", "/opt/turbine"]).unwrap();
        let config = resolve_config(&args).unwrap();
        assert_eq!(config, PipelineConfig::in_dir("/opt/turbine"));
    }

    #[test]
    fn test_config_and_dir_conflict() {
        let parsed = Args::try_parse_from([
            "turbine-predict",
            "--config",
            "a.json",
            "--artifact-dir",
            "b",
        ]);
        assert!(parsed.is_err());
    }
}
