use crate::model::ledger::Ledger;
use crate::model::table::{aggregate, RewardEvent, TableError, YearlyTable};

/// Net cash flow per ticker and year: sales count positive, purchases negative.
pub fn summary_table(ledger: &Ledger) -> Result<YearlyTable, TableError> {
    let events = ledger.iter().map(|tx| RewardEvent {
        date: tx.date,
        ticker: tx.ticker.clone(),
        reward: tx.total(),
    });

    YearlyTable::pivot(aggregate(events))
}
