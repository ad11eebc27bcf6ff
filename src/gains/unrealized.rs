//! Mark-to-market valuation of open positions at each year end.
//!
//! The ledger is replayed into one snapshot per position change. Only the last snapshot of each
//! `(ticker, year)` is kept, and years without trading are filled in with a January 1 snapshot
//! carrying the previous position forward. Each snapshot is then valued against the closing price
//! at the end of its year.

use super::{GainConfig, GainsError};
use crate::market::MarketData;
use crate::model::constants::UNREALIZE_GAIN_LOSS_SHEET;
use crate::model::ledger::Ledger;
use crate::model::table::{aggregate, Cell, LongRow, YearlyTable};
use crate::model::{Report, Stats};
use crate::position::{Position, PositionEvent, PositionTracker};
use crate::util::year_ext::{year_end, year_start, GetYear, YearSpanExt as _};
use chrono::{Datelike as _, NaiveDateTime};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Position state for a ticker as of a date.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PositionSnapshot {
    pub date: NaiveDateTime,
    pub ticker: String,
    pub position: Position,
}

impl GetYear for PositionSnapshot {
    fn get_year(&self) -> i32 {
        self.date.year()
    }
}

/// One snapshot per buy or sale, in ledger order.
pub fn position_snapshots(ledger: &Ledger) -> Vec<PositionSnapshot> {
    let mut snapshots = Vec::new();
    PositionTracker::replay(ledger, &mut |event: PositionEvent<'_>| {
        let tx = event.transaction();
        snapshots.push(PositionSnapshot {
            date: tx.date,
            ticker: tx.ticker.clone(),
            position: event.position(),
        });
    });

    snapshots
}

/// Keep the final snapshot of every `(ticker, year)`.
///
/// Input must be in ledger order; the last snapshot seen for a key wins.
pub fn retain_last<I>(snapshots: I) -> BTreeMap<(String, i32), PositionSnapshot>
where
    I: IntoIterator<Item = PositionSnapshot>,
{
    let mut last = BTreeMap::new();
    for snapshot in snapshots {
        last.insert((snapshot.ticker.clone(), snapshot.get_year()), snapshot);
    }

    last
}

/// Give every ticker one snapshot per year across the span of all snapshots.
///
/// The span runs from the earliest to the latest year of any ticker, extended to `through_year`
/// when that is later. A missing year gets a snapshot dated January 1 that carries the previous
/// year's position, or an empty position before the ticker's first trade.
///
/// Output is sorted by ticker, then year.
pub fn fill_missing_years(
    mut last: BTreeMap<(String, i32), PositionSnapshot>,
    through_year: Option<i32>,
    stats: &mut Stats,
) -> Result<Vec<PositionSnapshot>, GainsError> {
    let Some(span) = last.values().year_span() else {
        return Ok(Vec::new());
    };
    let (first, last_year) = span.into_inner();
    let last_year = through_year.map_or(last_year, |year| year.max(last_year));

    let tickers: BTreeSet<String> = last.keys().map(|(ticker, _)| ticker.clone()).collect();
    let mut filled = Vec::new();

    for ticker in tickers {
        let mut carry = Position::default();

        for year in first..=last_year {
            let snapshot = match last.remove(&(ticker.clone(), year)) {
                Some(snapshot) => snapshot,
                None => {
                    let date = year_start(year).ok_or(GainsError::InvalidYear(year))?;
                    debug!("{ticker}: carrying {carry:?} into {year}");
                    stats.inc_synthesized_snapshots();

                    PositionSnapshot {
                        date,
                        ticker: ticker.clone(),
                        position: carry,
                    }
                }
            };

            carry = snapshot.position;
            filled.push(snapshot);
        }
    }

    Ok(filled)
}

/// Unrealized gains and losses per ticker and year.
pub fn unrealized_table<M>(
    ledger: &Ledger,
    market: &M,
    config: &GainConfig,
    report: &mut Report,
    stats: &mut Stats,
) -> Result<YearlyTable, GainsError>
where
    M: MarketData + ?Sized,
{
    let snapshots = position_snapshots(ledger);
    let snapshots = fill_missing_years(retain_last(snapshots), config.through_year, stats)?;

    let mut rows = Vec::with_capacity(snapshots.len());
    for snapshot in snapshots {
        let year = snapshot.get_year();
        let cell = value_snapshot(&snapshot, market, config, report, stats)?;

        rows.push(LongRow {
            ticker: snapshot.ticker,
            year,
            cell,
        });
    }

    Ok(YearlyTable::pivot(aggregate(rows))?)
}

/// `(close - average) * quantity * LOT_SIZE` at the end of the snapshot's year, capped at `now`.
fn value_snapshot<M>(
    snapshot: &PositionSnapshot,
    market: &M,
    config: &GainConfig,
    report: &mut Report,
    stats: &mut Stats,
) -> Result<Cell, GainsError>
where
    M: MarketData + ?Sized,
{
    let PositionSnapshot {
        ticker, position, ..
    } = snapshot;
    let year = snapshot.get_year();

    // Nothing held, nothing to value
    if position.quantity.is_zero() {
        return Ok(Cell::ZERO);
    }

    let as_of = year_end(year)
        .ok_or(GainsError::InvalidYear(year))?
        .min(config.now);

    stats.inc_price_lookups();
    match market.closing_price(ticker, as_of) {
        Ok(close) => {
            let reward = (close - position.average_buy_price).value_of(position.quantity);
            debug!("{ticker} {year}: {position:?} closed @ {close}: {reward}");

            Ok(Cell::Value(reward))
        }
        Err(err) if err.is_price_unavailable() => {
            warn!("{ticker} {year}: {err}");
            report.skip(UNREALIZE_GAIN_LOSS_SHEET, ticker, year, &err);
            stats.inc_skipped_cells();

            Ok(Cell::Flagged)
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gains::tests::{amount, ledger, market, now};
    use crate::market::db::PriceDb;
    use crate::market::{DividendEvent, MarketDataError};
    use crate::model::amount::Price;
    use crate::model::ledger::tests::tx;
    use similar_asserts::assert_eq;
    use tracing_test::traced_test;

    fn position(quantity: &str, average_buy_price: &str) -> Position {
        Position {
            quantity: quantity.parse().unwrap(),
            average_buy_price: average_buy_price.parse().unwrap(),
        }
    }

    fn summarize(snapshots: &[PositionSnapshot]) -> Vec<(String, Position)> {
        snapshots
            .iter()
            .map(|snapshot| (snapshot.date.to_string(), snapshot.position))
            .collect()
    }

    #[test]
    fn test_retain_last() {
        let ledger = Ledger::from_iter([
            tx("2020-01-02", "2330", "10", "0", "100"),
            tx("2020-02-03", "2330", "10", "0", "200"),
            tx("2020-11-02", "2330", "0", "5", "300"),
            tx("2021-03-02", "2330", "1", "0", "150"),
        ]);
        let last = retain_last(position_snapshots(&ledger));

        assert_eq!(last.len(), 2);
        assert_eq!(last[&("2330".to_string(), 2020)].position, position("15", "150"));
        assert_eq!(last[&("2330".to_string(), 2021)].position, position("16", "150"));
    }

    #[test]
    fn test_fill_missing_years_carries_forward() {
        let ledger = Ledger::from_iter([
            tx("2020-01-02", "2330", "10", "0", "100"),
            tx("2020-06-02", "2330", "0", "4", "120"),
            tx("2023-03-02", "2330", "0", "6", "150"),
        ]);
        let mut stats = Stats::default();
        let filled =
            fill_missing_years(retain_last(position_snapshots(&ledger)), None, &mut stats).unwrap();

        assert_eq!(
            summarize(&filled),
            [
                ("2020-06-02 00:00:00".to_string(), position("6", "100")),
                ("2021-01-01 00:00:00".to_string(), position("6", "100")),
                ("2022-01-01 00:00:00".to_string(), position("6", "100")),
                ("2023-03-02 00:00:00".to_string(), position("0", "100")),
            ]
        );
    }

    #[test]
    fn test_fill_missing_years_before_first_trade() {
        let ledger = Ledger::from_iter([
            tx("2020-01-02", "2330", "1", "0", "100"),
            tx("2022-01-03", "0050", "2", "0", "90"),
        ]);
        let mut stats = Stats::default();
        let filled =
            fill_missing_years(retain_last(position_snapshots(&ledger)), Some(2023), &mut stats)
                .unwrap();

        let years: Vec<_> = filled
            .iter()
            .map(|snapshot| (snapshot.ticker.as_str(), snapshot.get_year(), snapshot.position))
            .collect();
        assert_eq!(
            years,
            [
                ("0050", 2020, Position::default()),
                ("0050", 2021, Position::default()),
                ("0050", 2022, position("2", "90")),
                ("0050", 2023, position("2", "90")),
                ("2330", 2020, position("1", "100")),
                ("2330", 2021, position("1", "100")),
                ("2330", 2022, position("1", "100")),
                ("2330", 2023, position("1", "100")),
            ]
        );
    }

    #[test]
    fn test_fill_missing_years_empty() {
        let filled =
            fill_missing_years(BTreeMap::new(), Some(2023), &mut Stats::default()).unwrap();

        assert!(filled.is_empty());
    }

    #[test]
    #[traced_test]
    fn test_unrealized_table() {
        let mut report = Report::default();
        let mut stats = Stats::default();
        let config = GainConfig::new(now()).with_through_year(Some(2023));
        let table =
            unrealized_table(&ledger(), &market(), &config, &mut report, &mut stats).unwrap();

        // 10 lots @ 100, closed at 120
        assert_eq!(table.cell("2330", 2020), Some(Cell::Value(amount("200000"))));
        // 6 lots @ 100, closed at 130
        assert_eq!(table.cell("2330", 2021), Some(Cell::Value(amount("180000"))));
        // 2330 has no close in the last week of 2022
        assert_eq!(table.cell("2330", 2022), Some(Cell::Flagged));
        // Valued at `now`, 2023-06-15
        assert_eq!(table.cell("2330", 2023), Some(Cell::Value(amount("300000"))));
        assert_eq!(table.total("2330"), Some(amount("680000")));

        // 1 lot @ 90, closed at 95; nothing recorded for 0050 in 2022 or 2023
        assert_eq!(table.cell("0050", 2020), Some(Cell::ZERO));
        assert_eq!(table.cell("0050", 2021), Some(Cell::Value(amount("5000"))));
        assert_eq!(table.cell("0050", 2022), Some(Cell::Flagged));
        assert_eq!(table.cell("0050", 2023), Some(Cell::Flagged));

        // Rows without quantities never create snapshots
        assert_eq!(table.cell("2454", 2022), None);

        let skipped: Vec<_> = report
            .iter()
            .map(|cell| (cell.ticker.as_str(), cell.year))
            .collect();
        assert_eq!(skipped, [("0050", 2022), ("0050", 2023), ("2330", 2022)]);
        assert!(logs_contain("No closing price for `2330`"));
    }

    struct Offline;

    impl MarketData for Offline {
        fn dividend_history(&self, _ticker: &str) -> Result<Vec<DividendEvent>, MarketDataError> {
            Ok(Vec::new())
        }

        fn closing_price(
            &self,
            ticker: &str,
            _as_of: NaiveDateTime,
        ) -> Result<Price, MarketDataError> {
            Err(MarketDataError::Api(
                ticker.to_string(),
                "Service Unavailable".to_string(),
            ))
        }
    }

    #[test]
    fn test_transport_errors_are_fatal() {
        let ledger = Ledger::from_iter([tx("2020-01-02", "2330", "1", "0", "100")]);
        let result = unrealized_table(
            &ledger,
            &Offline,
            &GainConfig::new(now()),
            &mut Report::default(),
            &mut Stats::default(),
        );

        assert!(matches!(
            result,
            Err(GainsError::MarketData(MarketDataError::Api(..)))
        ));
    }

    #[test]
    fn test_zero_quantity_skips_lookup() {
        // An empty price DB would flag every lookup
        let ledger = Ledger::from_iter([
            tx("2020-01-02", "2330", "1", "0", "100"),
            tx("2020-02-03", "2330", "0", "1", "110"),
        ]);
        let mut report = Report::default();
        let mut stats = Stats::default();
        let table = unrealized_table(
            &ledger,
            &PriceDb::default(),
            &GainConfig::new(now()),
            &mut report,
            &mut stats,
        )
        .unwrap();

        assert_eq!(table.cell("2330", 2020), Some(Cell::ZERO));
        assert!(report.is_empty());
        assert_eq!(stats.price_lookups(), 0);
    }
}
