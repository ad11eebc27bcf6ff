use crate::model::amount::Amount;
use crate::model::constants::{TICKER_COLUMN, TOTAL_COLUMN};
use crate::util::year_ext::GetYear;
use chrono::{Datelike as _, NaiveDateTime};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display};
use std::ops::Add;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("Duplicate pivot key: ticker `{0}`, year {1}")]
    DuplicateKey(String, i32),
}

/// A dated gain, loss or income attributed to a ticker.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RewardEvent {
    pub date: NaiveDateTime,
    pub ticker: String,
    pub reward: Amount,
}

impl GetYear for RewardEvent {
    fn get_year(&self) -> i32 {
        self.date.year()
    }
}

/// One table cell.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Cell {
    Value(Amount),

    /// The value could not be computed. Rendered blank, counted as zero in totals.
    Flagged,
}

impl Cell {
    pub const ZERO: Self = Self::Value(Amount::ZERO);

    pub fn value(self) -> Option<Amount> {
        match self {
            Self::Value(amount) => Some(amount),
            Self::Flagged => None,
        }
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Add for Cell {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Self::Value(lhs), Self::Value(rhs)) => Self::Value(lhs + rhs),
            (Self::Flagged, _) | (_, Self::Flagged) => Self::Flagged,
        }
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(amount) => write!(f, "{amount}"),
            Self::Flagged => Ok(()),
        }
    }
}

/// Long-format row: one value per `(ticker, year)`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LongRow {
    pub ticker: String,
    pub year: i32,
    pub cell: Cell,
}

impl From<RewardEvent> for LongRow {
    fn from(event: RewardEvent) -> Self {
        Self {
            year: event.get_year(),
            ticker: event.ticker,
            cell: Cell::Value(event.reward),
        }
    }
}

/// Group rows by `(ticker, year)` and sum their cells.
///
/// Output rows are sorted by ticker, then year.
pub fn aggregate<I, T>(rows: I) -> Vec<LongRow>
where
    I: IntoIterator<Item = T>,
    T: Into<LongRow>,
{
    let mut groups = BTreeMap::<(String, i32), Cell>::new();
    for row in rows {
        let row: LongRow = row.into();
        let entry = groups.entry((row.ticker, row.year)).or_default();
        *entry = *entry + row.cell;
    }

    groups
        .into_iter()
        .map(|((ticker, year), cell)| LongRow { ticker, year, cell })
        .collect()
}

/// Wide table: one row per ticker, one column per year, plus a derived total.
///
/// Year cells that were never set read as zero.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct YearlyTable {
    rows: BTreeMap<String, BTreeMap<i32, Cell>>,
}

impl YearlyTable {
    /// Turn long rows into a wide table. Each `(ticker, year)` may appear only once.
    pub fn pivot<I>(rows: I) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = LongRow>,
    {
        let mut table = Self::default();
        for row in rows {
            let years = table.rows.entry(row.ticker.clone()).or_default();
            if years.insert(row.year, row.cell).is_some() {
                return Err(TableError::DuplicateKey(row.ticker, row.year));
            }
        }

        Ok(table)
    }

    /// Make sure every ticker has a row, adding empty rows where needed.
    pub fn with_tickers<'a, I>(mut self, tickers: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        for ticker in tickers {
            if !self.rows.contains_key(ticker) {
                self.rows.insert(ticker.to_string(), BTreeMap::new());
            }
        }

        self
    }

    /// Outer union of tickers and years; overlapping cells are summed, missing cells are zero.
    pub fn merge(mut self, other: &Self) -> Self {
        for (ticker, years) in &other.rows {
            let row = self.rows.entry(ticker.clone()).or_default();
            for (year, cell) in years {
                let entry = row.entry(*year).or_default();
                *entry = *entry + *cell;
            }
        }

        self
    }

    /// All year columns, ascending.
    pub fn years(&self) -> BTreeSet<i32> {
        self.rows
            .values()
            .flat_map(|years| years.keys().copied())
            .collect()
    }

    /// All row tickers, sorted.
    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Zero-filled cell lookup. Returns `None` only for unknown tickers.
    pub fn cell(&self, ticker: &str, year: i32) -> Option<Cell> {
        self.rows
            .get(ticker)
            .map(|years| years.get(&year).copied().unwrap_or_default())
    }

    /// Sum of the row's year cells, flagged cells counted as zero, truncated to a whole amount.
    pub fn total(&self, ticker: &str) -> Option<Amount> {
        self.rows.get(ticker).map(|years| {
            years
                .values()
                .filter_map(|cell| cell.value())
                .sum::<Amount>()
                .trunc()
        })
    }
}

/// Renders the table as CSV: `"Ticker",<years ascending>,"Total"`.
impl Display for YearlyTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let years = self.years();

        // Write the CSV header
        write!(f, r#""{TICKER_COLUMN}""#)?;
        for year in &years {
            write!(f, r#","{year}""#)?;
        }
        writeln!(f, r#","{TOTAL_COLUMN}""#)?;

        // Write CSV rows
        for ticker in self.tickers() {
            write!(f, r#""{ticker}""#)?;
            for year in &years {
                let cell = self.cell(ticker, *year).unwrap_or_default();
                write!(f, r#","{cell}""#)?;
            }

            let total = self.total(ticker).unwrap_or_default().to_decimal();
            writeln!(f, r#","{total}""#)?;
        }

        Ok(())
    }
}
