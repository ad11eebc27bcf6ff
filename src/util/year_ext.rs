use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::ops::RangeInclusive;

pub trait GetYear {
    fn get_year(&self) -> i32;
}

pub trait YearSpanExt {
    /// The inclusive range of years covered by every item, or `None` when empty.
    fn year_span(self) -> Option<RangeInclusive<i32>>;
}

/// Blanket implementation for every iterator whose items implement `GetYear`.
impl<I, T> YearSpanExt for I
where
    I: IntoIterator<Item = T>,
    T: GetYear,
{
    fn year_span(self) -> Option<RangeInclusive<i32>> {
        self.into_iter()
            .map(|item| item.get_year())
            .fold(None, |span, year| match span {
                None => Some((year, year)),
                Some((min, max)) => Some((min.min(year), max.max(year))),
            })
            .map(|(min, max)| min..=max)
    }
}

impl<T: GetYear> GetYear for &T {
    fn get_year(&self) -> i32 {
        (*self).get_year()
    }
}

/// Midnight on January 1 of `year`.
pub fn year_start(year: i32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, 1, 1).map(|date| date.and_time(NaiveTime::MIN))
}

/// The last second of December 31 of `year`.
pub fn year_end(year: i32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, 12, 31).and_then(|date| date.and_hms_opt(23, 59, 59))
}
