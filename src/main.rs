#![forbid(unsafe_code)]

use chrono::Local;
use error_iter::ErrorIter as _;
use gaincount::gains::{GainConfig, Tables};
use gaincount::imports::ledger::read_ledger;
use gaincount::market::{db::PriceDb, yahoo::YahooClient, MarketSource};
use gaincount::model::constants::{DEFAULT_TICKER_SUFFIX, DEFAULT_YAHOO_URL};
use gaincount::model::{Report, Stats};
use is_terminal::IsTerminal as _;
use onlyargs::{CliError, OnlyArgs as _};
use onlyargs_derive::OnlyArgs;
use std::path::PathBuf;
use std::{env, fs, process::ExitCode};
use thiserror::Error;
use tracing::{debug, warn};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::prelude::*;

/// Compute yearly realized and unrealized gains, dividends and cash flow from a trade ledger.
#[derive(Debug, OnlyArgs)]
#[footer = "Additional environment variables:"]
#[footer = "  - YAHOO_URL accepts a http: or https: URL for the Yahoo Finance API"]
#[footer = "      default is \"https://query1.finance.yahoo.com\""]
#[footer = "      Ignored when --price-db is given"]
#[footer = "  - TERM_COLOR accepts \"always\" to override automatic terminal sensing"]
struct Args {
    /// Read the transaction ledger CSV from a file.
    ///   Columns: Date, Ticker, Buy, Sale, Price. Buy and Sale are
    ///   counted in lots of 1000 shares.
    ///
    #[long]
    input_ledger: PathBuf,

    /// Read closing prices and dividends from a RON price DB
    ///   instead of querying Yahoo Finance.
    ///
    #[long]
    price_db: Option<PathBuf>,

    /// Write table CSVs to this output directory.
    #[short('o')]
    output_path: Option<PathBuf>,

    /// Table CSVs written to an output directory will be given
    ///   this prefix.
    #[short('p')]
    #[default("")]
    output_prefix: String,

    /// Suffix appended to tickers for Yahoo Finance lookups.
    ///   Default is ".TW".
    ///
    #[long]
    ticker_suffix: Option<String>,

    /// Keep valuing open positions through this year, even when
    ///   the ledger has no trades that late.
    ///
    #[long]
    through_year: Option<i32>,

    /// Enable verbose output.
    /// Prints tables to stdout even when they are written to files.
    verbose: bool,
}

#[derive(Debug, Error)]
enum Error {
    #[error("Argument parsing error")]
    Args(#[from] CliError),

    #[error("Unable to parse ledger: {0:?}")]
    Ledger(PathBuf, #[source] gaincount::errors::LedgerError),

    #[error("Unable to load price DB: {0:?}")]
    PriceDb(PathBuf, #[source] gaincount::errors::PriceDbError),

    #[error("Unable to compute tables")]
    Gains(#[from] gaincount::errors::GainsError),

    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

fn main() -> ExitCode {
    // Initialize the tracing subscriber for instrumentation.
    // Uses the `RUST_LOG` environment var for configuration. E.g. `RUST_LOG=debug cargo run`
    // This is useful to see the ledger row or market data response behind a bad table cell.
    //
    // See: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/struct.EnvFilter.html#directives
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    let term_color = env::var("TERM_COLOR")
        .map(|color| color == "always")
        .unwrap_or_else(|_| std::io::stdout().is_terminal());
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_ansi(term_color))
        .with(env_filter)
        .init();

    match run(onlyargs::parse()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            if matches!(err, Error::Args(_)) {
                eprintln!("{}", Args::HELP);
            }

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

    let mut stats = Stats::default();
    let mut report = Report::default();

    let ledger = read_ledger(&mut stats, &args.input_ledger)
        .map_err(|err| Error::Ledger(args.input_ledger.clone(), err))?;
    if ledger.is_empty() {
        warn!("Ledger {:?} has no transactions", args.input_ledger);
    }

    let market = match &args.price_db {
        Some(path) => {
            let db = PriceDb::new(path).map_err(|err| Error::PriceDb(path.clone(), err))?;
            MarketSource::from(db)
        }
        None => {
            let url = env::var("YAHOO_URL").unwrap_or_else(|_| DEFAULT_YAHOO_URL.to_string());
            let suffix = args.ticker_suffix.as_deref().unwrap_or(DEFAULT_TICKER_SUFFIX);
            debug!("Using Yahoo Finance API at {url} with ticker suffix {suffix:?}");

            MarketSource::from(YahooClient::new(&url, suffix))
        }
    };

    let config = GainConfig::new(Local::now().naive_local()).with_through_year(args.through_year);
    let tables = Tables::generate(&ledger, &market, &config, &mut report, &mut stats)?;

    if let Some(root) = &args.output_path {
        fs::create_dir_all(root)?;
    }

    for (sheet, table) in tables.sheets() {
        let underline = "=".repeat(sheet.len());

        if let Some(path) = args.output_path.as_ref().map(|root| {
            let filename = format!("{}{sheet}.csv", args.output_prefix);
            root.join(filename)
        }) {
            fs::write(&path, table.to_string())?;

            let path = path.display();
            let path_underline = "=".repeat(path.to_string().len());
            println!("Table {sheet} written to {path}");
            println!("===== {underline} ======= == {path_underline}");
            println!();

            if args.verbose {
                println!("{table}");
            }
        } else {
            println!("Table {sheet}");
            println!("===== {underline}");
            println!();
            println!("{table}");
        }
    }

    println!("{report}");
    stats.pretty_print();

    Ok(())
}
