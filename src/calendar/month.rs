use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Day of month, 1..=31
pub type Day = u8;

/// A calendar month of a specific year
///
/// Every layout pass works on exactly one `YearMonth`; it decides how many
/// days the slot table holds and which ISO dates belong to the pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    /// Creates a year-month, returning `None` when the month is outside 1..=12
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| YearMonth { year, month })
    }

    /// Year-month containing the given date
    pub fn of(date: NaiveDate) -> Self {
        YearMonth {
            year: date.year(),
            month: date.month(),
        }
    }

    /// First day of the month
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Number of days in the month (28..=31)
    pub fn days_in_month(&self) -> u8 {
        let (next_year, next_month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(next_year, next_month, 1)
            .and_then(|d| d.pred_opt())
            .map(|d| d.day() as u8)
            .unwrap_or(31)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// Day-of-month of `date` when it falls inside this month
    pub fn day_of(&self, date: NaiveDate) -> Option<Day> {
        self.contains(date).then(|| date.day() as Day)
    }

    /// Date of the given day in this month
    pub fn date(&self, day: Day) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, day as u32)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseYearMonthError(pub String);

impl fmt::Display for ParseYearMonthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid year-month '{}', expected YYYY-MM", self.0)
    }
}

impl std::error::Error for ParseYearMonthError {}

impl FromStr for YearMonth {
    type Err = ParseYearMonthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseYearMonthError(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(err)?;
        let year: i32 = year.parse().map_err(|_| err())?;
        let month: u32 = month.parse().map_err(|_| err())?;
        YearMonth::new(year, month).ok_or_else(err)
    }
}

/// Parses an ISO `YYYY-MM-DD` date string, tolerating a trailing time part
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Keeps the ISO dates that fall inside `month` and returns their day numbers
///
/// Strings that are not valid dates are skipped. The result is sorted and
/// free of duplicates.
pub fn days_in<'a, I>(month: YearMonth, dates: I) -> Vec<Day>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut days: Vec<Day> = dates
        .into_iter()
        .filter_map(parse_iso_date)
        .filter_map(|date| month.day_of(date))
        .collect();
    days.sort_unstable();
    days.dedup();
    days
}
