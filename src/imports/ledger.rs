use crate::model::amount::{ConvertAmountError, Lots, Price};
use crate::model::constants::{BUY_COLUMN, PRICE_COLUMN, REQUIRED_COLUMNS, SALE_COLUMN};
use crate::model::ledger::{Ledger, Transaction};
use crate::model::Stats;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use std::{io, path::Path};
use thiserror::Error;
use tracing::debug;

/// Accepted `Date` column formats, tried in order.
const DATETIME_FORMATS: [&str; 2] = ["%F %T", "%F %H:%M"];
const DATE_FORMATS: [&str; 2] = ["%F", "%Y/%m/%d"];

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("CSV Error")]
    Csv(#[from] csv::Error),

    #[error("Missing column `{0}`")]
    MissingColumn(&'static str),

    #[error("Row {row}: Missing ticker")]
    MissingTicker { row: usize },

    #[error("Row {row}: Unable to parse date `{value}`")]
    Date { row: usize, value: String },

    #[error("Row {row}: Unable to parse `{column}` value `{value}`")]
    Number {
        row: usize,
        column: &'static str,
        value: String,
        #[source]
        source: ConvertAmountError,
    },

    #[error("Row {row}: `{column}` must not be negative, found {value}")]
    InvalidQuantity {
        row: usize,
        column: &'static str,
        value: Lots,
    },

    #[error("Row {row}: `Price` must be positive, found {value}")]
    InvalidPrice { row: usize, value: Price },
}

/// Raw ledger row. Any extra column (such as `Total`) is ignored.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct LedgerCSVRow {
    #[serde(rename = "Date")]
    pub(crate) date: String,
    #[serde(rename = "Ticker")]
    pub(crate) ticker: String,
    #[serde(rename = "Buy", default)]
    pub(crate) buy: String,
    #[serde(rename = "Sale", default)]
    pub(crate) sale: String,
    #[serde(rename = "Price")]
    pub(crate) price: String,
}

/// Read the transaction ledger CSV from a file.
pub fn read_ledger(s: &mut Stats, path: impl AsRef<Path>) -> Result<Ledger, LedgerError> {
    let reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_path(path)?;

    parse_rows(s, reader)
}

/// Read the transaction ledger CSV from any reader.
pub fn parse_ledger<R: io::Read>(s: &mut Stats, rdr: R) -> Result<Ledger, LedgerError> {
    let reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(rdr);

    parse_rows(s, reader)
}

fn parse_rows<R: io::Read>(
    s: &mut Stats,
    mut reader: csv::Reader<R>,
) -> Result<Ledger, LedgerError> {
    let headers = reader.headers()?;
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|header| header == column) {
            return Err(LedgerError::MissingColumn(column));
        }
    }

    let mut transactions = Vec::new();

    debug!("Parsing Ledger rows");
    for (index, result) in reader.deserialize().enumerate() {
        let record: LedgerCSVRow = result?;
        debug!("Deserialized: {record:?}");

        let tx = ledger_parse(index + 1, record)?;
        debug!("Parsed: {tx:?}");

        transactions.push(tx);
        s.inc_ledgers();
    }

    Ok(Ledger::new(transactions))
}

fn ledger_parse(row: usize, record: LedgerCSVRow) -> Result<Transaction, LedgerError> {
    if record.ticker.is_empty() {
        return Err(LedgerError::MissingTicker { row });
    }

    let date = parse_date(&record.date).ok_or_else(|| LedgerError::Date {
        row,
        value: record.date.clone(),
    })?;

    let buy = parse_quantity(row, BUY_COLUMN, &record.buy)?;
    let sale = parse_quantity(row, SALE_COLUMN, &record.sale)?;
    let price: Price = record
        .price
        .parse()
        .map_err(|source| LedgerError::Number {
            row,
            column: PRICE_COLUMN,
            value: record.price.clone(),
            source,
        })?;
    if !price.is_positive() {
        return Err(LedgerError::InvalidPrice { row, value: price });
    }

    Ok(Transaction {
        date,
        ticker: record.ticker,
        buy,
        sale,
        price,
    })
}

fn parse_date(value: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

/// Empty cells (and spreadsheet `NaN` exports) count as zero lots.
fn parse_quantity(row: usize, column: &'static str, value: &str) -> Result<Lots, LedgerError> {
    if value.is_empty() || value.eq_ignore_ascii_case("nan") {
        return Ok(Lots::ZERO);
    }

    let lots: Lots = value.parse().map_err(|source| LedgerError::Number {
        row,
        column,
        value: value.to_string(),
        source,
    })?;
    if lots.is_negative() {
        return Err(LedgerError::InvalidQuantity {
            row,
            column,
            value: lots,
        });
    }

    Ok(lots)
}
