//! Calendar periods used by ledgers, reports and identifiers

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// A calendar month, rendered as `YYYY-MM` (or `YYYYMM` inside identifiers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        ((1..=12).contains(&month) && (1..=9999).contains(&year)).then_some(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self { year: date.year(), month: date.month() }
    }

    pub const fn year(self) -> i32 {
        self.year
    }

    pub const fn month(self) -> u32 {
        self.month
    }

    /// `YYYYMM`, as embedded in date-sequence identifiers.
    pub fn compact(self) -> String {
        format!("{:04}{:02}", self.year, self.month)
    }

    pub fn first_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn last_day(self) -> Option<NaiveDate> {
        self.next().first_day()?.pred_opt()
    }

    pub const fn next(self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    /// Accepts `2025-03` and `202503`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (year, month) = match s.split_once('-') {
            Some((y, m)) => (y, m),
            None if s.len() == 6 && s.is_char_boundary(4) => s.split_at(4),
            None => return Err(format!("Invalid year-month: {s}")),
        };
        let year = year.parse::<i32>().map_err(|_| format!("Invalid year-month: {s}"))?;
        let month = month.parse::<u32>().map_err(|_| format!("Invalid year-month: {s}"))?;
        Self::new(year, month).ok_or_else(|| format!("Invalid year-month: {s}"))
    }
}

impl TryFrom<String> for YearMonth {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

/// Reporting period. Bounds are inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Period {
    Month { month: YearMonth },
    Quarter { year: i32, quarter: u32 },
    Year { year: i32 },
    Range { from: NaiveDate, to: NaiveDate },
}

impl Period {
    pub const fn month(month: YearMonth) -> Self {
        Self::Month { month }
    }

    /// First and last day of the period.
    pub fn bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        match *self {
            Self::Month { month } => Some((month.first_day()?, month.last_day()?)),
            Self::Quarter { year, quarter } => {
                if !(1..=4).contains(&quarter) {
                    return None;
                }
                let first = YearMonth::new(year, (quarter - 1) * 3 + 1)?;
                let last = YearMonth::new(year, quarter * 3)?;
                Some((first.first_day()?, last.last_day()?))
            }
            Self::Year { year } => {
                Some((NaiveDate::from_ymd_opt(year, 1, 1)?, NaiveDate::from_ymd_opt(year, 12, 31)?))
            }
            Self::Range { from, to } => (from <= to).then_some((from, to)),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.bounds().is_some_and(|(from, to)| from <= date && date <= to)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Month { month } => write!(f, "{month}"),
            Self::Quarter { year, quarter } => write!(f, "{year}-Q{quarter}"),
            Self::Year { year } => write!(f, "{year}"),
            Self::Range { from, to } => write!(f, "{from}..{to}"),
        }
    }
}

impl FromStr for Period {
    type Err = String;

    /// Accepts `2025-03`, `2025-Q1`, `2025` and `2025-03-01..2025-03-31`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((from, to)) = s.split_once("..") {
            let from = NaiveDate::from_str(from).map_err(|e| format!("Invalid period start: {e}"))?;
            let to = NaiveDate::from_str(to).map_err(|e| format!("Invalid period end: {e}"))?;
            let period = Self::Range { from, to };
            return period.bounds().map(|_| period).ok_or_else(|| format!("Invalid period: {s}"));
        }
        if let Some((year, quarter)) = s.split_once("-Q").or_else(|| s.split_once("-q")) {
            let year = year.parse::<i32>().map_err(|_| format!("Invalid period: {s}"))?;
            let quarter = quarter.parse::<u32>().map_err(|_| format!("Invalid period: {s}"))?;
            let period = Self::Quarter { year, quarter };
            return period.bounds().map(|_| period).ok_or_else(|| format!("Invalid period: {s}"));
        }
        if s.len() == 4 {
            let year = s.parse::<i32>().map_err(|_| format!("Invalid period: {s}"))?;
            return Ok(Self::Year { year });
        }
        s.parse::<YearMonth>().map(Self::month)
    }
}
