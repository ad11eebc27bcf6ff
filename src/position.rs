//! Weighted-average cost basis tracking.
//!
//! The ledger is replayed in date order, one [`Position`] per ticker. Every buy blends the new lots
//! into the average buy price; every sale realizes `(price - average) * lots * LOT_SIZE` and leaves
//! the average untouched. Callers observe the replay through a [`PositionObserver`].

use crate::model::amount::{Amount, Lots, Price};
use crate::model::ledger::{Ledger, Transaction};
use std::collections::BTreeMap;
use tracing::{trace, warn};

/// Running state for a single ticker.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Position {
    pub quantity: Lots,
    pub average_buy_price: Price,
}

impl Position {
    /// Blend `lots` bought at `price` into the position.
    pub fn buy(&mut self, lots: Lots, price: Price) {
        if lots.is_zero() {
            return;
        }

        let total_cost = self.quantity.to_decimal() * self.average_buy_price.to_decimal()
            + lots.to_decimal() * price.to_decimal();
        self.quantity += lots;

        // The quantity can only land on zero when buying back an oversold position.
        self.average_buy_price = total_cost
            .checked_div(self.quantity.to_decimal())
            .map(Price::from)
            .unwrap_or_default();
    }

    /// Remove `lots` sold at `price`, returning the realized gain or loss.
    pub fn sell(&mut self, lots: Lots, price: Price) -> Amount {
        let reward = (price - self.average_buy_price).value_of(lots);
        self.quantity -= lots;

        reward
    }
}

/// A single position change produced while replaying the ledger.
///
/// `position` is the state of the ticker after the change was applied.
#[derive(Copy, Clone, Debug)]
pub enum PositionEvent<'a> {
    Buy {
        tx: &'a Transaction,
        position: Position,
    },
    Sale {
        tx: &'a Transaction,
        position: Position,
        reward: Amount,
    },
}

impl<'a> PositionEvent<'a> {
    pub fn transaction(&self) -> &'a Transaction {
        match self {
            Self::Buy { tx, .. } | Self::Sale { tx, .. } => tx,
        }
    }

    pub fn position(&self) -> Position {
        match self {
            Self::Buy { position, .. } | Self::Sale { position, .. } => *position,
        }
    }
}

/// Receives every position change in replay order.
pub trait PositionObserver {
    fn observe(&mut self, event: PositionEvent<'_>);
}

impl<F> PositionObserver for F
where
    F: FnMut(PositionEvent<'_>),
{
    fn observe(&mut self, event: PositionEvent<'_>) {
        self(event)
    }
}

/// Per-ticker position state for one replay of the ledger.
#[derive(Debug, Default)]
pub struct PositionTracker {
    positions: BTreeMap<String, Position>,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay the whole ledger into a fresh tracker.
    pub fn replay<O>(ledger: &Ledger, observer: &mut O) -> Self
    where
        O: PositionObserver + ?Sized,
    {
        let mut tracker = Self::new();
        for tx in ledger {
            tracker.apply(tx, observer);
        }

        tracker
    }

    /// Apply one transaction. A row carrying both a buy and a sale applies the buy first.
    pub fn apply<O>(&mut self, tx: &Transaction, observer: &mut O)
    where
        O: PositionObserver + ?Sized,
    {
        let position = self.positions.entry(tx.ticker.clone()).or_default();

        if tx.buy.is_positive() {
            position.buy(tx.buy, tx.price);
            trace!("{} bought {} @ {}: {position:?}", tx.ticker, tx.buy, tx.price);

            observer.observe(PositionEvent::Buy {
                tx,
                position: *position,
            });
        }

        if tx.sale.is_positive() {
            let reward = position.sell(tx.sale, tx.price);
            trace!("{} sold {} @ {}: {position:?}", tx.ticker, tx.sale, tx.price);

            if position.quantity.is_negative() {
                warn!(
                    "{date} {ticker}: sold more than held, quantity is now {quantity}",
                    date = tx.date,
                    ticker = tx.ticker,
                    quantity = position.quantity,
                );
            }

            observer.observe(PositionEvent::Sale {
                tx,
                position: *position,
                reward,
            });
        }
    }

    pub fn position(&self, ticker: &str) -> Option<&Position> {
        self.positions.get(ticker)
    }

    pub fn positions(&self) -> impl Iterator<Item = (&str, &Position)> {
        self.positions
            .iter()
            .map(|(ticker, position)| (ticker.as_str(), position))
    }
}
