use std::process::ExitCode;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use validate_osw::{Cli, ConfigManager, OswValidator, Output, OutputFormat, VerbosityLevel};

const EXIT_VALID: u8 = 0;
const EXIT_INVALID: u8 = 1;
const EXIT_FATAL: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    let fatal = Output::new(OutputFormat::Human, cli.verbosity())
        .with_colors(atty::is(atty::Stream::Stderr));

    if let Err(e) = cli.validate() {
        eprintln!("{}", fatal.format_fatal(&e));
        return ExitCode::from(EXIT_FATAL);
    }

    match run(&cli).await {
        Ok(true) => ExitCode::from(EXIT_VALID),
        Ok(false) => ExitCode::from(EXIT_INVALID),
        Err(e) => {
            eprintln!("{}", fatal.format_fatal(&format!("{e:#}")));
            ExitCode::from(EXIT_FATAL)
        }
    }
}

/// Returns whether the archive is a valid OSW dataset
async fn run(cli: &Cli) -> anyhow::Result<bool> {
    let config = ConfigManager::load_config(cli)
        .await
        .context("Failed to load configuration")?;
    let verbosity = VerbosityLevel::from_flags(config.output.verbose, config.output.quiet);

    init_logging(verbosity);

    let validator = OswValidator::from_config(&cli.archive, &config);
    let result = validator
        .validate()
        .await
        .context("Failed to load validation schema")?;

    let output = Output::new(config.output.format, verbosity);
    print!("{}", output.format_result(&cli.archive, &result)?);

    Ok(result.is_valid)
}

fn init_logging(verbosity: VerbosityLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
