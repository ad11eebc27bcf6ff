use crate::model::amount::{Amount, Lots, Price};
use crate::util::year_ext::GetYear;
use chrono::{Datelike as _, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One row of the transaction ledger.
///
/// A row may record a buy, a sale, both or neither. Quantities are in lots.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Transaction {
    pub date: NaiveDateTime,
    pub ticker: String,
    pub buy: Lots,
    pub sale: Lots,
    pub price: Price,
}

impl Transaction {
    /// Net cash flow of this row: sales are positive, purchases negative.
    pub fn total(&self) -> Amount {
        self.price.value_of(self.sale - self.buy)
    }
}

impl GetYear for Transaction {
    fn get_year(&self) -> i32 {
        self.date.year()
    }
}

/// All transactions for a run, in ascending date order.
///
/// Rows sharing a date keep the order they were recorded in.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Ledger {
    transactions: Vec<Transaction>,
}

impl Ledger {
    pub fn new(mut transactions: Vec<Transaction>) -> Self {
        transactions.sort_by_key(|tx| tx.date);

        Self { transactions }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transaction> {
        self.transactions.iter()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Every distinct ticker, sorted.
    pub fn tickers(&self) -> BTreeSet<&str> {
        self.transactions
            .iter()
            .map(|tx| tx.ticker.as_str())
            .collect()
    }

    /// Net lots held for `ticker` counting only rows dated strictly before `before`.
    ///
    /// Returns `None` when the ledger has no such rows at all.
    pub fn holdings_before(&self, ticker: &str, before: NaiveDateTime) -> Option<Lots> {
        self.transactions
            .iter()
            .filter(|tx| tx.ticker == ticker && tx.date < before)
            .fold(None, |acc, tx| {
                Some(acc.unwrap_or_default() + tx.buy - tx.sale)
            })
    }
}

impl FromIterator<Transaction> for Ledger {
    fn from_iter<T: IntoIterator<Item = Transaction>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Ledger {
    type Item = &'a Transaction;
    type IntoIter = std::slice::Iter<'a, Transaction>;

    fn into_iter(self) -> Self::IntoIter {
        self.transactions.iter()
    }
}
