//! Yearly gain, loss and income tables computed from the ledger.

use crate::market::{MarketData, MarketDataError};
use crate::model::constants::{
    DIVIDENDS_SHEET, REALIZE_GAIN_LOSS_SHEET, SUMMARY_SHEET, UNREALIZE_GAIN_LOSS_SHEET,
};
use crate::model::ledger::Ledger;
use crate::model::table::{TableError, YearlyTable};
use crate::model::{Report, Stats};
use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::info;

pub mod dividends;
pub mod realized;
pub mod summary;
pub mod unrealized;

#[derive(Debug, Error)]
pub enum GainsError {
    #[error("Market data error")]
    MarketData(#[from] MarketDataError),

    #[error("Unable to build table")]
    Table(#[from] TableError),

    #[error("Year {0} is out of range")]
    InvalidYear(i32),
}

#[derive(Clone, Copy, Debug)]
pub struct GainConfig {
    /// Wall clock for the run. Caps period-end price lookups and dates dividend placeholders.
    pub now: NaiveDateTime,

    /// Value open positions through this year even when the ledger ends earlier.
    pub through_year: Option<i32>,
}

impl GainConfig {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now,
            through_year: None,
        }
    }

    pub fn with_through_year(mut self, year: Option<i32>) -> Self {
        self.through_year = year;
        self
    }
}

/// All output tables for one run.
#[derive(Debug, Eq, PartialEq)]
pub struct Tables {
    pub summary: YearlyTable,
    pub dividends: YearlyTable,
    pub realized: YearlyTable,
    pub unrealized: YearlyTable,
}

impl Tables {
    /// Compute every table. Each calculator replays the ledger on its own.
    ///
    /// Cells whose closing price is unavailable are flagged and recorded in `report`.
    pub fn generate<M>(
        ledger: &Ledger,
        market: &M,
        config: &GainConfig,
        report: &mut Report,
        stats: &mut Stats,
    ) -> Result<Self, GainsError>
    where
        M: MarketData + ?Sized,
    {
        let tickers = ledger.tickers();

        info!("Computing {SUMMARY_SHEET}");
        let summary = summary::summary_table(ledger)?;

        info!("Computing {DIVIDENDS_SHEET}");
        let dividends = dividends::dividends_table(ledger, market, config, stats)?;

        info!("Computing {REALIZE_GAIN_LOSS_SHEET}");
        let realized = realized::realized_table(ledger, &dividends)?;

        info!("Computing {UNREALIZE_GAIN_LOSS_SHEET}");
        let unrealized = unrealized::unrealized_table(ledger, market, config, report, stats)?;

        Ok(Self {
            summary: summary.with_tickers(tickers.iter().copied()),
            dividends: dividends.with_tickers(tickers.iter().copied()),
            realized: realized.with_tickers(tickers.iter().copied()),
            unrealized: unrealized.with_tickers(tickers.iter().copied()),
        })
    }

    /// Tables paired with their sheet names, in output order.
    pub fn sheets(&self) -> [(&'static str, &YearlyTable); 4] {
        [
            (SUMMARY_SHEET, &self.summary),
            (DIVIDENDS_SHEET, &self.dividends),
            (REALIZE_GAIN_LOSS_SHEET, &self.realized),
            (UNREALIZE_GAIN_LOSS_SHEET, &self.unrealized),
        ]
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::market::db::{PriceDb, PriceHistory};
    use crate::market::DividendEvent;
    use crate::model::amount::Amount;
    use crate::model::ledger::tests::tx;
    use crate::model::table::Cell;
    use chrono::NaiveDate;
    use similar_asserts::assert_eq;

    pub(crate) fn now() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2023-06-15 12:00:00", "%F %T").unwrap()
    }

    pub(crate) fn amount(s: &str) -> Amount {
        s.parse().unwrap()
    }

    /// Closes on the last trading day of each year, plus one dividend in 2021.
    pub(crate) fn market() -> PriceDb {
        let date = |s: &str| NaiveDate::parse_from_str(s, "%F").unwrap();

        let mut db = PriceDb::default();
        let mut history = PriceHistory::default();
        history.closes.insert(date("2020-12-31"), "120".parse().unwrap());
        history.closes.insert(date("2021-12-30"), "130".parse().unwrap());
        history.closes.insert(date("2023-06-14"), "150".parse().unwrap());
        history.dividends.push(DividendEvent {
            ex_date: date("2021-07-01"),
            amount: "2".parse().unwrap(),
        });
        db.insert("2330", history);

        let mut history = PriceHistory::default();
        history.closes.insert(date("2021-12-31"), "95".parse().unwrap());
        db.insert("0050", history);

        db
    }

    pub(crate) fn ledger() -> Ledger {
        Ledger::from_iter([
            tx("2020-03-02", "2330", "10", "0", "100"),
            tx("2021-05-03", "2330", "0", "4", "125"),
            tx("2021-08-02", "0050", "1", "0", "90"),
            tx("2022-04-01", "2454", "0", "0", "700"),
        ])
    }

    fn generate(config: &GainConfig) -> (Tables, Report) {
        let mut report = Report::default();
        let mut stats = Stats::default();
        let tables =
            Tables::generate(&ledger(), &market(), config, &mut report, &mut stats).unwrap();

        (tables, report)
    }

    #[test]
    fn test_every_ticker_once() {
        let (tables, _) = generate(&GainConfig::new(now()));

        for (sheet, table) in tables.sheets() {
            let tickers: Vec<_> = table.tickers().collect();
            assert_eq!(tickers, ["0050", "2330", "2454"], "{sheet}");
        }
    }

    #[test]
    fn test_total_is_sum_of_years() {
        let (tables, _) = generate(&GainConfig::new(now()));

        for (sheet, table) in tables.sheets() {
            for ticker in table.tickers() {
                let sum: Amount = table
                    .years()
                    .into_iter()
                    .filter_map(|year| table.cell(ticker, year).and_then(Cell::value))
                    .sum();
                assert_eq!(table.total(ticker), Some(sum.trunc()), "{sheet} {ticker}");
            }
        }
    }

    #[test]
    fn test_realized_includes_dividends() {
        let (tables, _) = generate(&GainConfig::new(now()));

        // (125 - 100) * 4 * 1000 sold, plus 6 lots held on the 2021 ex-date at 2 per share
        assert_eq!(
            tables.realized.cell("2330", 2021),
            Some(Cell::Value(amount("112000")))
        );
        assert_eq!(tables.realized.total("2330"), Some(amount("112000")));
        assert_eq!(tables.realized.total("0050"), Some(Amount::ZERO));
    }

    #[test]
    fn test_idempotent() {
        let config = GainConfig::new(now()).with_through_year(Some(2023));

        let (first, first_report) = generate(&config);
        let (second, second_report) = generate(&config);

        assert_eq!(first, second);
        assert_eq!(
            first_report.iter().collect::<Vec<_>>(),
            second_report.iter().collect::<Vec<_>>()
        );
    }
}
