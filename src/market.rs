//! Closing prices and dividend history for ledger tickers.

use crate::model::amount::Price;
use crate::model::constants::PRICE_WINDOW_DAYS;
use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod db;
pub mod yahoo;

#[derive(Debug, Error)]
pub enum MarketDataError {
    /// No close exists in the lookup window. The affected cell is skipped, not fatal.
    #[error("No closing price for `{ticker}` between {start} and {end}")]
    PriceUnavailable {
        ticker: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("HTTP request error for `{0}`")]
    Http(String, #[source] ureq::Error),

    #[error("Market data API error for `{0}`: {1}")]
    Api(String, String),

    #[error("Invalid number in market data for `{0}`")]
    Decimal(String, #[source] rust_decimal::Error),
}

impl MarketDataError {
    pub fn is_price_unavailable(&self) -> bool {
        matches!(self, Self::PriceUnavailable { .. })
    }
}

/// One dividend payout, per share.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DividendEvent {
    pub ex_date: NaiveDate,
    pub amount: Price,
}

/// The public interface for market data sources.
///
/// Exists as a trait so that the calculators can be tested against fixed data.
pub trait MarketData {
    /// Every known dividend for `ticker`, oldest first. An empty history is not an error.
    fn dividend_history(&self, ticker: &str) -> Result<Vec<DividendEvent>, MarketDataError>;

    /// The last close within the lookup window ending on `as_of`, see [`price_window`].
    fn closing_price(&self, ticker: &str, as_of: NaiveDateTime) -> Result<Price, MarketDataError>;
}

/// Inclusive range of trading dates searched for a close as of `as_of`.
pub fn price_window(as_of: NaiveDateTime) -> (NaiveDate, NaiveDate) {
    let end = as_of.date();
    let start = end
        .checked_sub_days(Days::new(PRICE_WINDOW_DAYS as u64 - 1))
        .unwrap_or(NaiveDate::MIN);

    (start, end)
}

/// Market data backends selectable from the command line.
pub enum MarketSource {
    Yahoo(yahoo::YahooClient),
    Db(db::PriceDb),
}

impl From<yahoo::YahooClient> for MarketSource {
    fn from(value: yahoo::YahooClient) -> Self {
        Self::Yahoo(value)
    }
}

impl From<db::PriceDb> for MarketSource {
    fn from(value: db::PriceDb) -> Self {
        Self::Db(value)
    }
}

impl MarketData for MarketSource {
    fn dividend_history(&self, ticker: &str) -> Result<Vec<DividendEvent>, MarketDataError> {
        match self {
            Self::Yahoo(yahoo) => yahoo.dividend_history(ticker),
            Self::Db(db) => db.dividend_history(ticker),
        }
    }

    fn closing_price(&self, ticker: &str, as_of: NaiveDateTime) -> Result<Price, MarketDataError> {
        match self {
            Self::Yahoo(yahoo) => yahoo.closing_price(ticker, as_of),
            Self::Db(db) => db.closing_price(ticker, as_of),
        }
    }
}
