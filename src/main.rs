use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use h3_payload::config::{ExportConfig, FileConfig};
use h3_payload::logging::{self, LogLevel, Stage};
use h3_payload::{ExportError, ExportSummary, run_from_config};

#[derive(Debug, Parser)]
#[command(name = "h3_payload")]
#[command(about = "Export H3 prediction probabilities as a gzipped JSON payload")]
struct Cli {
    /// TOML config file (defaults to ./h3_payload.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output file, overriding output.path
    #[arg(long)]
    output: Option<PathBuf>,

    /// Skip outlier replacement; probabilities are only clamped to [0, 1]
    #[arg(long)]
    no_outliers: bool,

    /// Debug-level logging
    #[arg(long, short)]
    verbose: bool,
}

fn load_config(cli: &Cli) -> Result<ExportConfig, ExportError> {
    let mut file = FileConfig::discover(cli.config.as_deref())?;
    if let Some(path) = &cli.output {
        file.output.path = path.clone();
    }
    if cli.no_outliers {
        file.outliers.enabled = false;
    }
    if cli.verbose {
        file.logging.level = LogLevel::Debug;
    }
    ExportConfig::from_env(file)
}

fn run(config: &ExportConfig) -> Result<ExportSummary, ExportError> {
    logging::debug(
        Stage::Config,
        None,
        &format!(
            "prediction_table={} weather={}.{} output={} outliers={:?}",
            config.prediction_table,
            config.weather_table,
            config.weather_column,
            config.output_path.display(),
            config.outliers
        ),
    );
    run_from_config(config)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            // No usable logging section; report on the console only.
            let level = if cli.verbose { LogLevel::Debug } else { LogLevel::Info };
            logging::init_logger(level, None, false);
            logging::error(Stage::Config, None, &e.to_string());
            return ExitCode::FAILURE;
        }
    };
    logging::init_logger(
        config.logging.level,
        config.logging.file.as_deref(),
        config.logging.timestamps,
    );

    match run(&config) {
        Ok(summary) => {
            println!("{}", summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            logging::error(Stage::System, None, &e.to_string());
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_config_error_is_returned_before_logging_setup() {
        let cli = Cli::try_parse_from(["h3_payload", "--config", "/nonexistent/h3_payload.toml", "-v"]).unwrap();
        assert!(cli.verbose);
        let err = load_config(&cli).unwrap_err();
        assert!(matches!(err, ExportError::Config(_)), "got {:?}", err);
    }
}
