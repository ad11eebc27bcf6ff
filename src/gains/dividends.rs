use super::{GainConfig, GainsError};
use crate::market::MarketData;
use crate::model::amount::Amount;
use crate::model::ledger::Ledger;
use crate::model::table::{aggregate, RewardEvent, YearlyTable};
use crate::model::Stats;
use chrono::NaiveTime;
use tracing::debug;

/// Dividend income per ticker and year.
///
/// Income is counted on lots held strictly before each ex-date. Tickers that never received a
/// dividend get a zero entry dated `config.now` so they still show up in the table.
pub fn dividends_table<M>(
    ledger: &Ledger,
    market: &M,
    config: &GainConfig,
    stats: &mut Stats,
) -> Result<YearlyTable, GainsError>
where
    M: MarketData + ?Sized,
{
    let mut events = Vec::new();

    for ticker in ledger.tickers() {
        let count = events.len();

        for dividend in market.dividend_history(ticker)? {
            let ex_date = dividend.ex_date.and_time(NaiveTime::MIN);
            let Some(holdings) = ledger.holdings_before(ticker, ex_date) else {
                debug!("{ticker}: no holdings before ex-date {}", dividend.ex_date);
                continue;
            };

            let income = dividend.amount.value_of(holdings);
            debug!("{ticker}: {holdings} lots @ {} on {ex_date}: {income}", dividend.amount);

            events.push(RewardEvent {
                date: ex_date,
                ticker: ticker.to_string(),
                reward: income,
            });
            stats.inc_dividend_events();
        }

        if events.len() == count {
            events.push(RewardEvent {
                date: config.now,
                ticker: ticker.to_string(),
                reward: Amount::ZERO,
            });
        }
    }

    Ok(YearlyTable::pivot(aggregate(events))?)
}
