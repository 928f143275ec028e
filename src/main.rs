#![forbid(unsafe_code)]

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use error_iter::ErrorIter as _;
use is_terminal::IsTerminal as _;
use onlyargs::CliError;
use onlyargs_derive::OnlyArgs;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::prelude::*;

use followthemoney::engine;
use followthemoney::errors::{ConfigError, CsvError};
use followthemoney::io::flows::FlowWriter;
use followthemoney::io::transactions::read_transactions;
use followthemoney::model::config::Config;
use followthemoney::model::report::Report;

#[derive(Debug, OnlyArgs)]
#[footer = "Additional environment variables:"]
#[footer = "  - TERM_COLOR accepts \"always\" to override automatic terminal sensing"]
struct Args {
    /// Read the transaction stream from this CSV file.
    #[long]
    input: PathBuf,

    /// Read the run configuration from this RON file.
    #[long]
    config: PathBuf,

    /// Write the flow stream to this CSV file.
    #[short('o')]
    output: PathBuf,
}

#[derive(Debug, Error)]
enum Error {
    #[error("Failed to parse arguments")]
    Args(#[from] CliError),

    #[error("Unable to read config file {0:?}")]
    ReadConfig(PathBuf, #[source] std::io::Error),

    #[error("Invalid configuration")]
    Config(#[from] ConfigError),

    #[error("Unable to read transaction stream {0:?}")]
    ReadTransactions(PathBuf, #[source] CsvError),

    #[error("Unable to open output flow stream {0:?}")]
    OpenOutput(PathBuf, #[source] CsvError),

    #[error("Failed to write a flow row")]
    WriteFlow(#[source] CsvError),

    #[error("Failed to flush the flow writer")]
    FlushFlows(#[source] CsvError),
}

fn main() -> ExitCode {
    // Initialize the tracing subscriber for instrumentation.
    // Uses the `RUST_LOG` environment var for configuration. E.g. `RUST_LOG=debug cargo run`
    //
    // See: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/struct.EnvFilter.html#directives
    let env_filter = EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).from_env_lossy();
    let term_color =
        env::var("TERM_COLOR").map(|color| color == "always").unwrap_or_else(|_| std::io::stdout().is_terminal());
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_ansi(term_color))
        .with(env_filter)
        .init();

    match run(onlyargs::parse()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            for source in err.sources().skip(1) {
                eprintln!("  Caused by: {source}");
            }

            ExitCode::FAILURE
        }
    }
}

fn run(args: Result<Args, CliError>) -> Result<(), Error> {
    let args = args?;

    let config_text = fs::read_to_string(&args.config).map_err(|e| Error::ReadConfig(args.config.clone(), e))?;
    let config = Config::from_ron_str(&config_text)?;

    let mut report = Report::new(args.input.display().to_string(), args.output.display().to_string());

    let transactions = read_transactions(&args.input, &config, &mut report)
        .map_err(|e| Error::ReadTransactions(args.input.clone(), e))?;

    info!("{report}");

    let mut writer = FlowWriter::create(&args.output, config.infer, config.timeformat.clone())
        .map_err(|e| Error::OpenOutput(args.output.clone(), e))?;
    let mut write_err = None;

    engine::run(config, transactions.into_iter(), &mut report, |flow| {
        if write_err.is_some() {
            return;
        }
        if let Err(e) = writer.write(&flow) {
            write_err = Some(e);
        }
    })?;

    if let Some(e) = write_err {
        return Err(Error::WriteFlow(e));
    }
    writer.flush().map_err(Error::FlushFlows)?;

    println!("{report}");
    Ok(())
}
