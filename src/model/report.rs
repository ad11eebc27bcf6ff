use std::fmt::{self, Display};

/// A table cell that was left blank because its value could not be computed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SkippedCell {
    pub sheet: &'static str,
    pub ticker: String,
    pub year: i32,
    pub reason: String,
}

impl Display for SkippedCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "`{}` {} {}: {}",
            self.sheet, self.ticker, self.year, self.reason,
        )
    }
}

/// Cells skipped during a run, printed once all tables are written.
#[derive(Debug, Default)]
pub struct Report {
    skipped: Vec<SkippedCell>,
}

impl Report {
    pub fn skip(&mut self, sheet: &'static str, ticker: &str, year: i32, reason: impl Display) {
        self.skipped.push(SkippedCell {
            sheet,
            ticker: ticker.to_string(),
            year,
            reason: reason.to_string(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.skipped.is_empty()
    }

    pub fn len(&self) -> usize {
        self.skipped.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SkippedCell> {
        self.skipped.iter()
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Skipped Cells")?;
        writeln!(f, "======= =====")?;
        writeln!(f)?;

        if self.is_empty() {
            writeln!(f, "No issues detected! 🎉")?;
        } else {
            for cell in &self.skipped {
                writeln!(f, "❌ {cell}")?;
            }
        }

        Ok(())
    }
}
