use crate::model::ledger::Ledger;
use crate::model::table::{aggregate, RewardEvent, TableError, YearlyTable};
use crate::position::{PositionEvent, PositionTracker};

/// Realized gains and losses per ticker and year, with dividend income added in.
pub fn realized_table(ledger: &Ledger, dividends: &YearlyTable) -> Result<YearlyTable, TableError> {
    let mut events = Vec::new();
    PositionTracker::replay(ledger, &mut |event: PositionEvent<'_>| {
        if let PositionEvent::Sale { tx, reward, .. } = event {
            events.push(RewardEvent {
                date: tx.date,
                ticker: tx.ticker.clone(),
                reward,
            });
        }
    });

    Ok(YearlyTable::pivot(aggregate(events))?.merge(dividends))
}
