use super::{price_window, DividendEvent, MarketData, MarketDataError};
use crate::model::amount::Price;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PriceDbError {
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("RON parsing error")]
    Parse(#[from] ron::de::SpannedError),
}

/// Recorded market data for a single ticker.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PriceHistory {
    /// Daily closes keyed by trading date.
    #[serde(default)]
    pub closes: BTreeMap<NaiveDate, Price>,

    #[serde(default)]
    pub dividends: Vec<DividendEvent>,
}

/// Offline market data loaded from a RON file.
///
/// The file is a map from ledger ticker to [`PriceHistory`]:
///
/// ```text
/// {
///     "2330": (
///         closes: { "2021-12-30": "615", "2021-12-31": "615" },
///         dividends: [ (ex_date: "2021-12-16", amount: "2.75") ],
///     ),
/// }
/// ```
#[derive(Debug, Default)]
pub struct PriceDb {
    tickers: BTreeMap<String, PriceHistory>,
}

impl PriceDb {
    /// Load a price DB from the given file path.
    pub fn new<P>(path: P) -> Result<Self, PriceDbError>
    where
        P: AsRef<Path>,
    {
        let data = fs::read_to_string(path.as_ref())?;
        let db = Self::from_ron_str(&data)?;

        if db.tickers.is_empty() {
            warn!("Price DB {:?} has no tickers", path.as_ref());
        }

        Ok(db)
    }

    pub fn from_ron_str(data: &str) -> Result<Self, PriceDbError> {
        let tickers = ron::from_str(data)?;

        Ok(Self { tickers })
    }

    pub fn insert(&mut self, ticker: impl Into<String>, history: PriceHistory) {
        self.tickers.insert(ticker.into(), history);
    }
}

impl MarketData for PriceDb {
    fn dividend_history(&self, ticker: &str) -> Result<Vec<DividendEvent>, MarketDataError> {
        let mut dividends = self
            .tickers
            .get(ticker)
            .map(|history| history.dividends.clone())
            .unwrap_or_default();
        dividends.sort_by_key(|dividend| dividend.ex_date);

        Ok(dividends)
    }

    fn closing_price(&self, ticker: &str, as_of: NaiveDateTime) -> Result<Price, MarketDataError> {
        let (start, end) = price_window(as_of);

        let close = self
            .tickers
            .get(ticker)
            .and_then(|history| history.closes.range(start..=end).next_back())
            .map(|(_date, close)| *close);
        debug!("{ticker} close between {start} and {end}: {close:?}");

        close.ok_or_else(|| MarketDataError::PriceUnavailable {
            ticker: ticker.to_string(),
            start,
            end,
        })
    }
}
