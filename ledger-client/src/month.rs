use std::fmt;
use std::str::FromStr;

use time::{Date, Month};

/// A calendar month key. Replaces the "YYYY-MM" string keys the rest of the
/// system exchanges on the wire with a value type that has real arithmetic,
/// so year boundaries never go through string parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthYear {
    year: i32,
    month: Month,
}

#[derive(thiserror::Error, Debug)]
#[error("invalid month key '{0}', expected YYYY-MM")]
pub struct ParseMonthYearError(String);

impl MonthYear {
    pub fn new(year: i32, month: Month) -> Self {
        Self { year, month }
    }

    /// The month containing the given calendar date.
    pub fn containing(date: Date) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> Month {
        self.month
    }

    pub fn previous(&self) -> Self {
        match self.month {
            Month::January => Self {
                year: self.year - 1,
                month: Month::December,
            },
            m => Self {
                year: self.year,
                month: m.previous(),
            },
        }
    }

    pub fn next(&self) -> Self {
        match self.month {
            Month::December => Self {
                year: self.year + 1,
                month: Month::January,
            },
            m => Self {
                year: self.year,
                month: m.next(),
            },
        }
    }

    /// First calendar day of the month.
    pub fn first_day(&self) -> Date {
        // Day 1 is valid for every (year, month) the wire format can express.
        Date::from_calendar_date(self.year, self.month, 1)
            .unwrap_or(Date::MIN)
    }

    /// Last calendar day of the month.
    pub fn last_day(&self) -> Date {
        let len = self.month.length(self.year);
        Date::from_calendar_date(self.year, self.month, len)
            .unwrap_or(Date::MAX)
    }

    /// Whether the given date falls inside this month.
    pub fn contains(&self, date: Date) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// Number of days from `today` (inclusive of neither bound) to the end of
    /// the month. Zero on or after the last day.
    pub fn days_remaining_after(&self, today: Date) -> i64 {
        let last = self.last_day();
        if today >= last {
            0
        } else {
            (last - today).whole_days()
        }
    }
}

impl fmt::Display for MonthYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month as u8)
    }
}

impl serde::Serialize for MonthYear {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for MonthYear {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = <String as serde::Deserialize>::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl FromStr for MonthYear {
    type Err = ParseMonthYearError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseMonthYearError(s.to_string());

        let (y, m) = s.split_once('-').ok_or_else(err)?;
        let year: i32 = y.parse().map_err(|_| err())?;
        let month_num: u8 = m.parse().map_err(|_| err())?;
        let month = Month::try_from(month_num).map_err(|_| err())?;

        Ok(Self { year, month })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn parses_and_formats_month_keys() {
        let m: MonthYear = "2025-03".parse().unwrap();
        assert_eq!(m.year(), 2025);
        assert_eq!(m.month(), Month::March);
        assert_eq!(m.to_string(), "2025-03");
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!("2025".parse::<MonthYear>().is_err());
        assert!("2025-13".parse::<MonthYear>().is_err());
        assert!("2025-00".parse::<MonthYear>().is_err());
        assert!("march-2025".parse::<MonthYear>().is_err());
    }

    #[test]
    fn previous_crosses_year_boundary() {
        let jan: MonthYear = "2026-01".parse().unwrap();
        assert_eq!(jan.previous().to_string(), "2025-12");
        assert_eq!(jan.previous().next(), jan);
    }

    #[test]
    fn calendar_bounds() {
        let feb: MonthYear = "2024-02".parse().unwrap();
        assert_eq!(feb.first_day(), date!(2024 - 02 - 01));
        assert_eq!(feb.last_day(), date!(2024 - 02 - 29));
        assert!(feb.contains(date!(2024 - 02 - 15)));
        assert!(!feb.contains(date!(2024 - 03 - 01)));
    }

    #[test]
    fn days_remaining() {
        let m: MonthYear = "2025-06".parse().unwrap();
        assert_eq!(m.days_remaining_after(date!(2025 - 06 - 28)), 2);
        assert_eq!(m.days_remaining_after(date!(2025 - 06 - 30)), 0);
    }
}
